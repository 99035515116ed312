//! HTTP implementation of [`ContentApi`] for GitHub-compatible contents
//! endpoints.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/repos/{owner}/{repo}/contents/{path}[?ref=branch]` | File (base64 + sha) or directory listing |
//! | PUT    | `/repos/{owner}/{repo}/contents/{path}` | Create or update, `{message, content, sha?, branch?}` |
//! | DELETE | `/repos/{owner}/{repo}/contents/{path}` | Delete, `{message, sha, branch?}` |
//! | GET    | `/repos/{owner}/{repo}` | Connection check |
//!
//! Storage paths are split on `/` and each segment is percent-encoded on its
//! own, so names with spaces or `#` reach the right object.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::ContentApi;
use crate::config::{ConfigError, ContentApiConfig};
use crate::error::ContentStoreError;
use crate::retry::{retry_send, RetryOn, RetryPolicy};
use crate::types::{ContentToken, DeleteOutcome, DirEntry, EntryKind, RawContent, StoredObject};

const ACCEPT_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Clone)]
pub struct HttpContentApi {
    http: reqwest::Client,
    api_url: Url,
    owner: String,
    repo: String,
    branch: Option<String>,
    retry: RetryPolicy,
}

/// File object returned by `GET contents/{path}`.
#[derive(Debug, Deserialize)]
struct FileBody {
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: EntryKind,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

impl HttpContentApi {
    /// Build a client with bearer authentication and the configured timeout.
    pub fn new(config: &ContentApiConfig) -> Result<Self, ContentStoreError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.as_str()))
            .map_err(|_| ConfigError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("sitehost/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| ContentStoreError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    /// Override the backoff schedule (tests use millisecond delays).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn repo_url(&self, extra: &[&str], path: &str) -> Result<Url, ContentStoreError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ConfigError::InvalidUrl(self.api_url.to_string(), "cannot be a base URL".into())
            })?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(extra)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn contents_url(&self, path: &str) -> Result<Url, ContentStoreError> {
        self.repo_url(&["contents"], path)
    }

    async fn fetch_url(&self, endpoint: &str, url: &Url) -> Result<reqwest::Response, ContentStoreError> {
        retry_send(self.retry, RetryOn::Transient, endpoint, || {
            self.http.get(url.clone()).send()
        })
        .await
        .map_err(|e| ContentStoreError::Http {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }

    async fn decode_file(&self, endpoint: &str, file: FileBody) -> Result<StoredObject, ContentStoreError> {
        if file.kind != EntryKind::File {
            return Err(ContentStoreError::NotAFile { path: file.path });
        }
        // Large files come back without inline content; follow the raw link.
        let bytes = match (&file.encoding, &file.download_url) {
            (Some(enc), Some(link)) if enc == "none" && file.size > 0 => {
                let url = Url::parse(link).map_err(|e| ContentStoreError::Deserialization {
                    endpoint: endpoint.to_string(),
                    reason: format!("invalid download_url: {e}"),
                })?;
                self.download_url(endpoint, &url).await?
            }
            _ => decode_base64(&file.path, &file.content)?,
        };
        Ok(StoredObject {
            path: file.path,
            bytes,
            token: ContentToken::new(file.sha),
        })
    }

    async fn download_url(&self, endpoint: &str, url: &Url) -> Result<Vec<u8>, ContentStoreError> {
        let resp = self.fetch_url(endpoint, url).await?;
        if !resp.status().is_success() {
            return Err(status_error(endpoint.to_string(), "", resp, false).await);
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ContentStoreError::Http {
                endpoint: endpoint.to_string(),
                source: e,
            })
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn get(&self, path: &str) -> Result<RawContent, ContentStoreError> {
        let endpoint = format!("GET contents/{path}");
        let mut url = self.contents_url(path)?;
        if let Some(branch) = &self.branch {
            url.query_pairs_mut().append_pair("ref", branch);
        }

        let resp = self.fetch_url(&endpoint, &url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(RawContent::NotFound);
        }
        if !resp.status().is_success() {
            return Err(status_error(endpoint, path, resp, false).await);
        }

        let body: serde_json::Value =
            resp.json()
                .await
                .map_err(|e| ContentStoreError::Deserialization {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?;
        if body.is_array() {
            let entries = serde_json::from_value(body).map_err(|e| {
                ContentStoreError::Deserialization {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                }
            })?;
            return Ok(RawContent::Directory(entries));
        }
        let file: FileBody =
            serde_json::from_value(body).map_err(|e| ContentStoreError::Deserialization {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;
        self.decode_file(&endpoint, file).await.map(RawContent::File)
    }

    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        message: &str,
        token: Option<&ContentToken>,
    ) -> Result<ContentToken, ContentStoreError> {
        let endpoint = format!("PUT contents/{path}");
        let url = self.contents_url(path)?;
        let body = WriteBody {
            message,
            content: Some(BASE64.encode(bytes)),
            sha: token.map(ContentToken::as_str),
            branch: self.branch.as_deref(),
        };

        let resp = retry_send(self.retry, RetryOn::ConnectFailure, &endpoint, || {
            self.http.put(url.clone()).json(&body).send()
        })
        .await
        .map_err(|e| ContentStoreError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        if !resp.status().is_success() {
            return Err(status_error(endpoint, path, resp, token.is_none()).await);
        }

        let created: PutResponse =
            resp.json()
                .await
                .map_err(|e| ContentStoreError::Deserialization {
                    endpoint,
                    reason: e.to_string(),
                })?;
        Ok(ContentToken::new(created.content.sha))
    }

    async fn delete(
        &self,
        path: &str,
        message: &str,
        token: &ContentToken,
    ) -> Result<DeleteOutcome, ContentStoreError> {
        let endpoint = format!("DELETE contents/{path}");
        let url = self.contents_url(path)?;
        let body = WriteBody {
            message,
            content: None,
            sha: Some(token.as_str()),
            branch: self.branch.as_deref(),
        };

        let resp = retry_send(self.retry, RetryOn::ConnectFailure, &endpoint, || {
            self.http.delete(url.clone()).json(&body).send()
        })
        .await
        .map_err(|e| ContentStoreError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(DeleteOutcome::AlreadyAbsent);
        }
        if !resp.status().is_success() {
            return Err(status_error(endpoint, path, resp, false).await);
        }
        Ok(DeleteOutcome::Deleted)
    }

    async fn download(&self, entry: &DirEntry) -> Result<Vec<u8>, ContentStoreError> {
        let endpoint = format!("GET raw/{}", entry.path);
        if let Some(link) = &entry.download_url {
            let url = Url::parse(link).map_err(|e| ContentStoreError::Deserialization {
                endpoint: endpoint.clone(),
                reason: format!("invalid download_url: {e}"),
            })?;
            return self.download_url(&endpoint, &url).await;
        }
        match self.get(&entry.path).await? {
            RawContent::File(obj) => Ok(obj.bytes),
            RawContent::Directory(_) => Err(ContentStoreError::NotAFile {
                path: entry.path.clone(),
            }),
            RawContent::NotFound => Err(ContentStoreError::Api {
                endpoint,
                status: 404,
                body: String::new(),
            }),
        }
    }

    async fn ping(&self) -> Result<(), ContentStoreError> {
        let endpoint = format!("GET repos/{}/{}", self.owner, self.repo);
        let url = self.repo_url(&[], "")?;
        let resp = self.fetch_url(&endpoint, &url).await?;
        if !resp.status().is_success() {
            return Err(status_error(endpoint, "", resp, false).await);
        }
        Ok(())
    }
}

/// Map a non-2xx reply to an error. `creating` is true for a PUT sent
/// without a token, where 422 means the path already exists.
async fn status_error(
    endpoint: String,
    path: &str,
    resp: reqwest::Response,
    creating: bool,
) -> ContentStoreError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    match status {
        409 | 412 => ContentStoreError::Conflict {
            path: path.to_string(),
            status,
        },
        422 if creating => ContentStoreError::Conflict {
            path: path.to_string(),
            status,
        },
        _ => ContentStoreError::Api {
            endpoint,
            status,
            body,
        },
    }
}

/// Decode the remote's base64 transport encoding, which wraps lines.
fn decode_base64(path: &str, content: &str) -> Result<Vec<u8>, ContentStoreError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64
        .decode(compact)
        .map_err(|e| ContentStoreError::Encoding {
            path: path.to_string(),
            reason: e.to_string(),
        })
}
