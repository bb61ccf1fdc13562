//! End-to-end tests for the backup engine against a temp directory and an
//! in-memory collection source.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use roster_service::config::BackupConfig;
use roster_service::models::{SnapshotOrigin, SnapshotStatus};
use roster_service::services::{CollectionSource, SnapshotEngine};
use service_core::error::AppError;

/// Fixed set of collections served from memory.
#[derive(Clone)]
struct MemorySource {
    collections: BTreeMap<String, Vec<Value>>,
}

impl MemorySource {
    fn staffing_fixture() -> Self {
        let mut collections = BTreeMap::new();
        collections.insert(
            "employees".to_string(),
            vec![
                json!({ "_id": "e1", "name": "Ann", "role": "hr" }),
                json!({ "_id": "e2", "name": "Bo", "role": "employee" }),
            ],
        );
        collections.insert(
            "assignments".to_string(),
            vec![json!({ "_id": "a1", "employee": "e1", "client": "c9" })],
        );
        Self { collections }
    }
}

#[async_trait]
impl CollectionSource for MemorySource {
    async fn list_collections(&self) -> Result<Vec<String>, AppError> {
        Ok(self.collections.keys().cloned().collect())
    }

    async fn count_documents(&self, name: &str) -> Result<u64, AppError> {
        Ok(self.collections.get(name).map_or(0, |c| c.len() as u64))
    }

    async fn read_all(&self, name: &str) -> Result<Vec<Value>, AppError> {
        Ok(self.collections.get(name).cloned().unwrap_or_default())
    }
}

/// Blocks in `list_collections` until the gate opens, to hold a run
/// in-progress from the outside.
struct SlowSource {
    inner: MemorySource,
    gate: Arc<tokio::sync::Semaphore>,
}

#[async_trait]
impl CollectionSource for SlowSource {
    async fn list_collections(&self) -> Result<Vec<String>, AppError> {
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        self.inner.list_collections().await
    }

    async fn count_documents(&self, name: &str) -> Result<u64, AppError> {
        self.inner.count_documents(name).await
    }

    async fn read_all(&self, name: &str) -> Result<Vec<Value>, AppError> {
        self.inner.read_all(name).await
    }
}

/// Store whose reads always fail.
struct FailingSource;

#[async_trait]
impl CollectionSource for FailingSource {
    async fn list_collections(&self) -> Result<Vec<String>, AppError> {
        Ok(vec!["employees".to_string()])
    }

    async fn count_documents(&self, _name: &str) -> Result<u64, AppError> {
        Ok(1)
    }

    async fn read_all(&self, _name: &str) -> Result<Vec<Value>, AppError> {
        Err(AppError::DatabaseError(anyhow::anyhow!(
            "connection reset by peer"
        )))
    }
}

fn config_for(dir: &std::path::Path, max_count: Option<u64>) -> BackupConfig {
    BackupConfig {
        enabled: false,
        interval_minutes: 60,
        storage_dir: dir.to_string_lossy().into_owned(),
        max_count,
        max_age_days: None,
    }
}

#[tokio::test]
async fn manual_trigger_writes_one_artifact_with_all_collections() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SnapshotEngine::new(
        config_for(dir.path(), None),
        Arc::new(MemorySource::staffing_fixture()),
    );

    let record = engine.trigger().await.unwrap();
    assert_eq!(record.origin, SnapshotOrigin::Manual);
    assert_eq!(record.status, SnapshotStatus::Success);
    assert!(record.size_bytes > 0);

    let artifact_path = engine.catalog().artifact_path(&record.id);
    let artifact: Value =
        serde_json::from_slice(&std::fs::read(&artifact_path).unwrap()).unwrap();

    assert_eq!(artifact["id"], json!(record.id));
    assert_eq!(artifact["origin"], json!("manual"));
    assert_eq!(artifact["counts"]["employees"], json!(2));
    assert_eq!(artifact["counts"]["assignments"], json!(1));
    assert_eq!(
        artifact["collections"]["employees"].as_array().unwrap().len(),
        2
    );

    let listed = engine.catalog().list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
    assert_eq!(listed[0].origin, SnapshotOrigin::Manual);
}

#[tokio::test]
async fn trigger_while_run_in_progress_is_rejected_without_second_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let engine = SnapshotEngine::new(
        config_for(dir.path(), None),
        Arc::new(SlowSource {
            inner: MemorySource::staffing_fixture(),
            gate: gate.clone(),
        }),
    );

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.trigger().await })
    };

    // Let the first run park inside the store read.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.status().in_progress);

    let err = engine.trigger().await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    gate.add_permits(1);
    let record = first.await.unwrap().unwrap();

    let listed = engine.catalog().list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, record.id);
    assert!(!engine.status().in_progress);
}

#[tokio::test]
async fn retention_keeps_only_the_newest_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SnapshotEngine::new(
        config_for(dir.path(), Some(2)),
        Arc::new(MemorySource::staffing_fixture()),
    );

    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(engine.trigger().await.unwrap().id);
        // Artifact ids have millisecond resolution.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let listed = engine.catalog().list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, ids[3]);
    assert_eq!(listed[1].id, ids[2]);

    assert!(!engine.catalog().artifact_path(&ids[0]).exists());
    assert!(!engine.catalog().artifact_path(&ids[1]).exists());
    assert!(engine.catalog().artifact_path(&ids[3]).exists());
}

#[tokio::test]
async fn failed_run_catalogs_nothing_and_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SnapshotEngine::new(config_for(dir.path(), None), Arc::new(FailingSource));

    let err = engine.trigger().await.unwrap_err();
    assert!(matches!(err, AppError::DatabaseError(_)));

    assert!(engine.catalog().list().await.unwrap().is_empty());
    let partial_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert!(partial_files.is_empty(), "no files should remain: {:?}", partial_files);

    let status = engine.status();
    let last = status.last_run.expect("failure should be recorded");
    assert_eq!(last.status, SnapshotStatus::Failed);
    assert!(last.error.is_some());
    assert!(!status.in_progress);

    // The schedule survives a failed pass: the next trigger works again.
    let err = engine.trigger().await.unwrap_err();
    assert!(matches!(err, AppError::DatabaseError(_)));
}

#[tokio::test]
async fn start_is_idempotent_and_stop_halts_the_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SnapshotEngine::new(
        config_for(dir.path(), None),
        Arc::new(MemorySource::staffing_fixture()),
    );

    let status = engine.start();
    assert!(status.running);

    let again = engine.start();
    assert!(again.running);

    engine.shutdown().await;
    assert!(!engine.status().running);

    // Nothing ran: the first interval tick was still an hour away.
    assert!(engine.catalog().list().await.unwrap().is_empty());
}
