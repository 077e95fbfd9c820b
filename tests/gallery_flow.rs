mod common;

use common::{MockServer, Reply};
use cross_label_lib::commands::AppState;
use cross_label_lib::{
    AppConfig, CacheStore, Db, GallerySynchronizer, HttpRemoteClient, ScanError, SyncState,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const LISTING: &str = r#"[
    {"_id": "a", "image": "https://cdn.example.com/a.jpg"},
    {"_id": {"$oid": "b"}, "image": "data:image/png;base64,iVBORw0KGgo="}
]"#;

fn synchronizer(server: &MockServer, db_path: &Path) -> GallerySynchronizer {
    let client = HttpRemoteClient::new(server.endpoints(), Duration::from_secs(5)).unwrap();
    let db = Db::new(db_path.to_path_buf()).unwrap();
    GallerySynchronizer::new(Arc::new(client), Arc::new(db))
}

#[tokio::test]
async fn refreshed_gallery_survives_restart_and_failed_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cache.db");

    let online = MockServer::start(|_, _| Reply::Json(200, LISTING.to_string())).await;
    let first = synchronizer(&online, &db_path);
    first.activate().await;
    let view = first.settled().await;
    assert_eq!(view.state, SyncState::Refreshed);
    assert_eq!(view.snapshot.ids(), vec!["a", "b"]);
    assert!(view.snapshot.records[0].payload.is_none());
    assert!(view.snapshot.records[1].payload.is_some());
    first.shutdown();
    drop(first);

    let offline =
        MockServer::start(|_, _| Reply::Json(503, "unavailable".to_string())).await;
    let second = synchronizer(&offline, &db_path);
    second.activate().await;
    assert_eq!(second.view().snapshot.ids(), vec!["a", "b"]);

    let view = second.settled().await;
    assert_eq!(view.state, SyncState::RefreshFailed);
    assert_eq!(view.snapshot.ids(), vec!["a", "b"]);
    let notice = view.notice.expect("failed refresh carries a notice");
    assert_eq!(notice.kind, "transport");
    assert!(notice.retryable);
    assert_eq!(offline.count("/get_images"), 1);
}

#[tokio::test]
async fn upload_is_acknowledged_and_cached() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cache.db");
    let server = MockServer::start(|method, path| match (method, path) {
        ("POST", "/upload_image") => Reply::Json(200, r#"{"insertedId":"up-9"}"#.to_string()),
        _ => Reply::Json(200, "[]".to_string()),
    })
    .await;
    let sync = synchronizer(&server, &db_path);
    let payload = "data:image/png;base64,iVBORw0KGgo=";

    let record = sync.upload(payload).await.unwrap();

    assert_eq!(record.id, "up-9");
    assert_eq!(sync.view().snapshot.ids(), vec!["up-9"]);
    assert_eq!(sync.view().state, SyncState::ServingCache);
    let body: Value = serde_json::from_str(&server.requests()[0].body).unwrap();
    assert_eq!(body["base64"], payload);

    let stored = Db::new(db_path.clone()).unwrap().read_all().unwrap().unwrap();
    assert_eq!(stored.ids(), vec!["up-9"]);
}

#[tokio::test]
async fn gallery_and_clear_cache_commands() {
    let server = MockServer::start(|_, _| Reply::Json(200, LISTING.to_string())).await;
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_path_buf();
    let gallery_url = server.endpoints().gallery;
    let config = AppConfig::from_lookup(|key: &str| match key {
        "CROSS_LABEL_GALLERY_URL" => Some(gallery_url.clone()),
        "CROSS_LABEL_DATA_DIR" => Some(data_dir.display().to_string()),
        _ => None,
    })
    .unwrap();
    let state = AppState::new(config).unwrap();

    let mut cached_listings = 0;
    let listing = state.show_gallery(|_| cached_listings += 1).await.unwrap();
    assert_eq!(cached_listings, 0);
    assert_eq!(listing.state, "refreshed");
    assert_eq!(listing.images.len(), 2);
    assert!(!listing.images[0].inline);
    assert!(listing.images[1].inline);

    state.clear_cache().await.unwrap();
    assert!(state.gallery.view().snapshot.is_empty());
    assert_eq!(state.db.read_all().unwrap(), None);
}

#[tokio::test]
async fn silent_gallery_server_times_out_listing_and_upload() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start(|_, _| Reply::Silent).await;
    let client = HttpRemoteClient::new(server.endpoints(), Duration::from_secs(1)).unwrap();
    let db = Db::new(dir.path().join("cache.db")).unwrap();
    let sync = GallerySynchronizer::new(Arc::new(client), Arc::new(db));

    sync.activate().await;
    let view = sync.settled().await;
    assert_eq!(view.state, SyncState::RefreshFailed);
    assert!(view.snapshot.is_empty());
    let notice = view.notice.expect("timeout notice");
    assert_eq!(notice.kind, "timeout");
    assert!(notice.retryable);

    let upload = sync.upload("data:image/png;base64,iVBORw0KGgo=").await;
    assert_eq!(upload, Err(ScanError::Timeout(Duration::from_secs(1))));
    assert!(sync.view().snapshot.is_empty());
    assert_eq!(server.count("/upload_image"), 1);
}
