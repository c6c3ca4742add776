//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock fetch and submit endpoints and test
//! the scan, import and store cycle end-to-end.

use async_trait::async_trait;
use catalog_harvest::config::{Config, DispatchConfig, OutputConfig, RemoteConfig, ScanConfig};
use catalog_harvest::crawler::{
    persist_new_markers, scan_catalog, CatalogView, Dispatcher, ScanSettings, StoreSelection,
    ViewError,
};
use catalog_harvest::output::{load_snapshot, save_snapshot};
use catalog_harvest::storage::{RunKind, SqliteStorage, Storage};
use catalog_harvest::{DispatchStatus, HierarchyTracker, Identity, NodeHandle, StaleHandle};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration against the given mock server
fn create_test_config(base_url: &str, db_path: &Path, snapshot_path: &Path) -> Config {
    Config {
        scan: ScanConfig {
            max_iterations: 5,
            retry_pause_ms: 0,
        },
        dispatch: DispatchConfig {
            batch_size: 2,
            max_attempts: 2,
            stagger_ms: 0,
            batch_pause_ms: 0,
            warm_up_requests: 1,
        },
        remote: RemoteConfig {
            fetch_url_template: format!("{}/products/{{id}}/", base_url),
            submit_url: format!("{}/submit", base_url),
            timeout_secs: 5,
            rotate_command: None,
        },
        output: OutputConfig {
            database_path: db_path.display().to_string(),
            snapshot_path: snapshot_path.display().to_string(),
        },
    }
}

/// Acknowledges a submit by echoing the submitted product id
struct EchoAck;

impl Respond for EchoAck {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        ResponseTemplate::new(200).set_body_json(json!({ "productId": body["id"] }))
    }
}

async fn mount_detail(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/products/{}/", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": id })))
        .mount(server)
        .await;
}

/// A catalog node that never goes stale
#[derive(Debug, Clone)]
struct StaticHandle(String);

impl NodeHandle for StaticHandle {
    fn resolve_text(&self) -> Result<String, StaleHandle> {
        Ok(self.0.clone())
    }
}

/// Two categories with three items between them
struct StaticCatalog;

#[async_trait]
impl CatalogView for StaticCatalog {
    type Handle = StaticHandle;

    async fn load_categories(&mut self) -> Result<Vec<StaticHandle>, ViewError> {
        Ok(vec![
            StaticHandle("Fruit".to_string()),
            StaticHandle("Bakery".to_string()),
        ])
    }

    async fn open_category(&mut self, category: &StaticHandle) -> Result<Vec<StaticHandle>, ViewError> {
        let subcategory = match category.0.as_str() {
            "Fruit" => "Citrus",
            _ => "Bread",
        };
        Ok(vec![StaticHandle(subcategory.to_string())])
    }

    async fn open_subcategory(
        &mut self,
        subcategory: &StaticHandle,
    ) -> Result<Vec<StaticHandle>, ViewError> {
        let items: &[&str] = match subcategory.0.as_str() {
            "Citrus" => &["Lemons", "Oranges"],
            _ => &["Baguette"],
        };
        Ok(items.iter().map(|i| StaticHandle(i.to_string())).collect())
    }

    async fn open_item(&mut self, item: &StaticHandle) -> Result<Identity, ViewError> {
        let raw = match item.0.as_str() {
            "Lemons" => "1.000",
            "Oranges" => "2",
            _ => "3.50",
        };
        Identity::parse(raw).map_err(|e| ViewError::Navigation(e.to_string()))
    }
}

#[tokio::test]
async fn test_scan_import_and_store() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Details for two of the three products; the third keeps failing
    mount_detail(&mock_server, "1").await;
    mount_detail(&mock_server, "2").await;
    Mock::given(method("GET"))
        .and(path("/products/3.5/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    // Warm-up GET against the submit endpoint
    Mock::given(method("GET"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(EchoAck)
        .expect(2)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("harvest.db");
    let snapshot_path = dir.path().join("scanned.json");
    let config = create_test_config(&base_url, &db_path, &snapshot_path);

    // Scan the catalog and snapshot the result
    let mut tracker = HierarchyTracker::new();
    let mut view = StaticCatalog;
    let passes = scan_catalog(&mut tracker, &mut view, &ScanSettings::from(&config.scan))
        .await
        .expect("Scan failed");
    assert_eq!(passes, 1);
    save_snapshot(&snapshot_path, &tracker.get_scanned_products()).expect("Failed to save");

    // Import the snapshot
    {
        let mut storage = SqliteStorage::new(&db_path).expect("Failed to open DB");
        let run_id = storage
            .create_run(RunKind::Import, "test_hash")
            .expect("Failed to create run");
        let markers = load_snapshot(&snapshot_path).expect("Failed to load snapshot");
        let inserted =
            persist_new_markers(&mut storage, &markers, run_id).expect("Failed to import");
        assert_eq!(inserted, 3);
    }

    // Store everything
    let mut dispatcher =
        Dispatcher::new(&config, "test_hash".to_string()).expect("Failed to create dispatcher");
    let summary = dispatcher
        .run(&StoreSelection::default())
        .await
        .expect("Store failed");

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.success.len(), 2);
    assert_eq!(summary.failed, vec![Identity::parse("3.5").unwrap()]);

    // Verify persisted outcomes
    let storage = SqliteStorage::new(&db_path).expect("Failed to open DB");
    assert_eq!(
        storage
            .count_dispatch_by_status(DispatchStatus::Success)
            .expect("Failed to count"),
        2
    );
    assert_eq!(
        storage
            .count_dispatch_by_status(DispatchStatus::Failed)
            .expect("Failed to count"),
        1
    );
    let remaining = storage
        .list_undispatched_identities()
        .expect("Failed to list");
    assert_eq!(remaining, vec![Identity::parse("3.5").unwrap()]);
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("harvest.db");
    let snapshot_path = dir.path().join("scanned.json");

    let mut tracker = HierarchyTracker::new();
    let settings = ScanSettings {
        max_iterations: 3,
        retry_pause: Duration::ZERO,
    };
    scan_catalog(&mut tracker, &mut StaticCatalog, &settings)
        .await
        .expect("Scan failed");
    save_snapshot(&snapshot_path, &tracker.get_scanned_products()).expect("Failed to save");

    let mut storage = SqliteStorage::new(&db_path).expect("Failed to open DB");
    let markers = load_snapshot(&snapshot_path).expect("Failed to load snapshot");

    let first_run = storage.create_run(RunKind::Import, "test_hash").unwrap();
    assert_eq!(persist_new_markers(&mut storage, &markers, first_run).unwrap(), 3);

    let second_run = storage.create_run(RunKind::Import, "test_hash").unwrap();
    assert_eq!(persist_new_markers(&mut storage, &markers, second_run).unwrap(), 0);
    assert_eq!(storage.count_scanned().unwrap(), 3);
}

#[tokio::test]
async fn test_only_new_store_after_partial_failure() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_detail(&mock_server, "1").await;
    Mock::given(method("GET"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    // The store acknowledges nothing
    Mock::given(method("POST"))
        .and(path("/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "busy" })))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("harvest.db");
    let config = create_test_config(&base_url, &db_path, &dir.path().join("scanned.json"));

    {
        let mut storage = SqliteStorage::new(&db_path).expect("Failed to open DB");
        let run_id = storage.create_run(RunKind::Scan, "test_hash").unwrap();
        let mut tracker = HierarchyTracker::new();
        scan_catalog(&mut tracker, &mut StaticCatalog, &ScanSettings::from(&config.scan))
            .await
            .unwrap();
        persist_new_markers(&mut storage, &tracker.get_scanned_products(), run_id).unwrap();
    }

    let mut dispatcher = Dispatcher::new(&config, "test_hash".to_string()).unwrap();
    let summary = dispatcher.run(&StoreSelection::default()).await.unwrap();
    assert!(summary.success.is_empty());
    assert_eq!(summary.failed.len(), 3);

    // Every product is still a candidate for the next only-new run
    let selection = StoreSelection {
        only_new: true,
        partial: None,
    };
    assert_eq!(dispatcher.select_identities(&selection).unwrap().len(), 3);
}
