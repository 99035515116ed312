//! Route definitions for the content API stub.
//!
//! Response bodies have the shapes `HttpContentApi` deserializes: file
//! objects with line-wrapped base64 content, arrays of directory entries,
//! and `{ "content": { "sha": … } }` for writes. Write refusals reuse the
//! status the in-memory backend reports, so conflicts surface to clients
//! exactly as the hosted API would signal them.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use sitehost_content_client::types::file_name;
use sitehost_content_client::{
    ContentApi, ContentStoreError, ContentToken, DeleteOutcome, MemoryContentApi, RawContent,
};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Width of the base64 lines in file responses.
const BASE64_LINE: usize = 60;

/// Build the stub router over `api`.
pub fn router(api: MemoryContentApi) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/repos/:owner/:repo", get(repo_info))
        .route(
            "/repos/:owner/:repo/contents/*path",
            get(get_contents).put(put_contents).delete(delete_contents),
        )
        .route("/raw/*path", get(raw))
        .fallback(not_implemented)
        .layer(TraceLayer::new_for_http())
        .with_state(api)
}

#[derive(Debug, Deserialize)]
struct WriteRequest {
    message: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    sha: Option<String>,
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn repo_info(
    State(api): State<MemoryContentApi>,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    if let Err(e) = api.ping().await {
        return error_response(&e);
    }
    Json(json!({
        "name": repo,
        "full_name": format!("{owner}/{repo}"),
        "private": true,
        "default_branch": "main"
    }))
    .into_response()
}

async fn get_contents(
    State(api): State<MemoryContentApi>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
) -> Response {
    match api.get(&path).await {
        Ok(RawContent::File(obj)) => Json(json!({
            "type": "file",
            "name": file_name(&obj.path),
            "path": obj.path,
            "sha": obj.token.as_str(),
            "size": obj.bytes.len(),
            "encoding": "base64",
            "content": wrap_base64(&obj.bytes),
        }))
        .into_response(),
        Ok(RawContent::Directory(entries)) => Json(entries).into_response(),
        Ok(RawContent::NotFound) => not_found(),
        Err(e) => error_response(&e),
    }
}

async fn put_contents(
    State(api): State<MemoryContentApi>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Json(req): Json<WriteRequest>,
) -> Response {
    let Some(content) = req.content else {
        return unprocessable("content is required");
    };
    let compact: String = content.split_whitespace().collect();
    let Ok(bytes) = BASE64.decode(compact) else {
        return unprocessable("content is not valid base64");
    };
    let token = req.sha.map(ContentToken::new);
    let status = if token.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    match api.put(&path, &bytes, &req.message, token.as_ref()).await {
        Ok(sha) => (
            status,
            Json(json!({
                "content": {
                    "type": "file",
                    "name": file_name(&path),
                    "path": path,
                    "sha": sha.as_str(),
                    "size": bytes.len(),
                },
                "commit": { "message": req.message }
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn delete_contents(
    State(api): State<MemoryContentApi>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Json(req): Json<WriteRequest>,
) -> Response {
    let Some(sha) = req.sha else {
        return unprocessable("\"sha\" wasn't supplied.");
    };
    match api.delete(&path, &req.message, &ContentToken::new(sha)).await {
        Ok(DeleteOutcome::Deleted) => Json(json!({
            "content": Value::Null,
            "commit": { "message": req.message }
        }))
        .into_response(),
        Ok(DeleteOutcome::AlreadyAbsent) => not_found(),
        Err(e) => error_response(&e),
    }
}

async fn raw(State(api): State<MemoryContentApi>, Path(path): Path<String>) -> Response {
    match api.object(&path) {
        Some(bytes) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            Bytes::from(bytes),
        )
            .into_response(),
        None => not_found(),
    }
}

async fn not_implemented() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))).into_response()
}

fn unprocessable(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "message": message })),
    )
        .into_response()
}

fn error_response(err: &ContentStoreError) -> Response {
    let status = match err {
        ContentStoreError::Conflict { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::CONFLICT)
        }
        ContentStoreError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ContentStoreError::NotAFile { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(%status, error = %err, "request refused");
    (status, Json(json!({ "message": err.to_string() }))).into_response()
}

fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = BASE64.encode(bytes);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE + 1);
    for (i, c) in encoded.chars().enumerate() {
        if i > 0 && i % BASE64_LINE == 0 {
            out.push('\n');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use sitehost_content_client::memory::content_token;
    use tower::ServiceExt;

    const CONTENTS: &str = "/repos/acme/site-storage/contents";

    fn request(method: &str, uri: &str, body: Option<Value>) -> axum::http::Request<Body> {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn put_body(content: &[u8], sha: Option<&str>) -> Value {
        let mut body = json!({ "message": "test", "content": BASE64.encode(content) });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }
        body
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let app = router(MemoryContentApi::new());
        let resp = app
            .oneshot(request("GET", &format!("{CONTENTS}/database/users.json"), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_then_fetch() {
        let api = MemoryContentApi::new();
        let app = router(api.clone());
        let uri = format!("{CONTENTS}/hosting/blog/index.html");

        let resp = app
            .clone()
            .oneshot(request("PUT", &uri, Some(put_body(b"<h1>hi</h1>", None))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        assert_eq!(
            created["content"]["sha"],
            content_token(b"<h1>hi</h1>").as_str()
        );

        let resp = app.oneshot(request("GET", &uri, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let file = body_json(resp).await;
        assert_eq!(file["type"], "file");
        assert_eq!(file["name"], "index.html");
        assert_eq!(file["sha"], created["content"]["sha"]);
        let decoded = BASE64.decode(file["content"].as_str().unwrap()).unwrap();
        assert_eq!(decoded, b"<h1>hi</h1>");
        assert_eq!(api.text("hosting/blog/index.html").unwrap(), "<h1>hi</h1>");
    }

    #[tokio::test]
    async fn long_content_is_line_wrapped() {
        let api = MemoryContentApi::new();
        api.seed("big.txt", vec![b'a'; 200]);
        let resp = router(api)
            .oneshot(request("GET", &format!("{CONTENTS}/big.txt"), None))
            .await
            .unwrap();
        let file = body_json(resp).await;
        let content = file["content"].as_str().unwrap();
        assert!(content.contains('\n'));
        assert!(content.lines().all(|l| l.len() <= BASE64_LINE));
    }

    #[tokio::test]
    async fn stale_sha_is_409() {
        let api = MemoryContentApi::new();
        api.seed("database/users.json", "[]");
        let resp = router(api)
            .oneshot(request(
                "PUT",
                &format!("{CONTENTS}/database/users.json"),
                Some(put_body(b"[1]", Some("not-the-sha"))),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_over_existing_is_422() {
        let api = MemoryContentApi::new();
        api.seed("database/users.json", "[]");
        let resp = router(api.clone())
            .oneshot(request(
                "PUT",
                &format!("{CONTENTS}/database/users.json"),
                Some(put_body(b"[1]", None)),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.text("database/users.json").unwrap(), "[]");
    }

    #[tokio::test]
    async fn directory_listing_has_download_urls() {
        let api = MemoryContentApi::new();
        api.set_download_base("http://stub.test");
        api.seed("hosting/blog/index.html", "x");
        api.seed("hosting/blog/css/site.css", "y");
        let resp = router(api)
            .oneshot(request("GET", &format!("{CONTENTS}/hosting/blog"), None))
            .await
            .unwrap();
        let entries = body_json(resp).await;
        assert_eq!(entries.as_array().unwrap().len(), 2);
        assert_eq!(entries[0]["type"], "dir");
        assert_eq!(entries[1]["type"], "file");
        assert_eq!(
            entries[1]["download_url"],
            "http://stub.test/raw/hosting/blog/index.html"
        );
    }

    #[tokio::test]
    async fn delete_lifecycle() {
        let api = MemoryContentApi::new();
        api.seed("404.html", "gone");
        let sha = api.token_of("404.html").unwrap();
        let app = router(api.clone());
        let uri = format!("{CONTENTS}/404.html");

        let resp = app
            .clone()
            .oneshot(request("DELETE", &uri, Some(json!({ "message": "rm" }))))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json!({ "message": "rm", "sha": sha.as_str() });
        let resp = app
            .clone()
            .oneshot(request("DELETE", &uri, Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(api.object("404.html").is_none());

        let resp = app.oneshot(request("DELETE", &uri, Some(body))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn raw_serves_bytes() {
        let api = MemoryContentApi::new();
        api.seed("hosting/blog/logo.png", vec![0x89, 0x50]);
        let app = router(api);
        let resp = app
            .clone()
            .oneshot(request("GET", "/raw/hosting/blog/logo.png", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], &[0x89, 0x50]);

        let resp = app
            .oneshot(request("GET", "/raw/hosting/blog/none.png", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn repo_ping_and_outage() {
        let api = MemoryContentApi::new();
        let app = router(api.clone());
        let resp = app
            .clone()
            .oneshot(request("GET", "/repos/acme/site-storage", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["full_name"], "acme/site-storage");

        api.set_unavailable(true);
        let resp = app
            .oneshot(request("GET", "/repos/acme/site-storage", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_route_is_501() {
        let resp = router(MemoryContentApi::new())
            .oneshot(request("GET", "/graphql", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    }
}
