//! The store driven over real HTTP against the stub server.

use chrono::{TimeZone, Utc};
use sitehost_content_client::{ContentApiConfig, HttpContentApi, MemoryContentApi};
use sitehost_core::watermark::count_markers;
use sitehost_core::{ManualClock, PlanTier, ProjectStatus};
use sitehost_store::{ProjectAction, Store, StoreConfig, StoreError};

async fn spawn_stub() -> (String, MemoryContentApi) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let api = MemoryContentApi::new();
    api.set_download_base(base.clone());
    let app = sitehost_stub::router(api.clone());
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    (base, api)
}

async fn http_store() -> (Store<HttpContentApi, ManualClock>, MemoryContentApi) {
    let (base, backend) = spawn_stub().await;
    let config = ContentApiConfig::local(&base, "stub-token").unwrap();
    let http = HttpContentApi::new(&config).unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap());
    (Store::new(http, clock, StoreConfig::default()), backend)
}

#[tokio::test]
async fn ping_reaches_the_stub() {
    let (store, _backend) = http_store().await;
    store.content().ping().await.unwrap();
}

#[tokio::test]
async fn hosting_lifecycle_over_http() {
    let (store, backend) = http_store().await;
    let page = "<html><body><p>hello</p></body></html>";

    store.register_user("ola", "ola@example.com", "pw").await.unwrap();
    store
        .deploy_file("ola", "site", "index.html", page.as_bytes())
        .await
        .unwrap();
    store
        .deploy_file("ola", "site", "app.js", b"console.log(1)")
        .await
        .unwrap();
    assert_eq!(
        count_markers(&backend.text("hosting/site/index.html").unwrap()),
        1
    );

    let details = store.project_details("site").await.unwrap();
    assert_eq!(details.files.len(), 2);

    let status = store
        .project_action("ola", "site", ProjectAction::Archive)
        .await
        .unwrap();
    assert_eq!(status, ProjectStatus::Archived);
    store
        .project_action("ola", "site", ProjectAction::Unarchive)
        .await
        .unwrap();

    store
        .assign_plan("ola", PlanTier::Vip, Some("2026-04-01"))
        .await
        .unwrap();
    let exported = store.export_project("ola", "site").await.unwrap();
    let names: Vec<_> = exported.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["app.js", "index.html"]);

    let report = store.delete_project("ola", "site").await.unwrap();
    assert!(report.is_complete());
    assert!(backend.object("hosting/site/index.html").is_none());
    assert!(store.list_projects("ola").await.unwrap().is_empty());
}

#[tokio::test]
async fn lost_update_is_retried_over_http() {
    let (store, backend) = http_store().await;
    store.register_user("ola", "ola@example.com", "pw").await.unwrap();
    backend.interleave_write(
        "database/users.json",
        serde_json::json!([
            {"id": 1, "username": "ola", "email": "ola@example.com", "password": "pw", "plan": "free", "role": "user", "expiryDate": null},
            {"id": 2, "username": "pia", "email": "pia@example.com", "password": "pw", "plan": "free", "role": "user", "expiryDate": null}
        ])
        .to_string(),
    );

    store.register_user("quinn", "q@example.com", "pw").await.unwrap();
    let users = backend.json("database/users.json").unwrap();
    assert_eq!(users.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn duplicate_registration_is_refused_over_http() {
    let (store, _backend) = http_store().await;
    store.register_user("ola", "ola@example.com", "pw").await.unwrap();
    let err = store
        .register_user("ola", "other@example.com", "pw")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
}
