//! On-demand enumeration and deletion of backup artifacts.
//!
//! The catalog never creates artifacts; the engine is the sole writer.

use std::io::ErrorKind;
use std::path::PathBuf;

use service_core::error::AppError;
use tokio::fs;

use crate::models::SnapshotRecord;

pub const META_SUFFIX: &str = ".meta.json";

#[derive(Clone)]
pub struct SnapshotCatalog {
    dir: PathBuf,
}

impl SnapshotCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn storage_dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn artifact_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn sidecar_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", id, META_SUFFIX))
    }

    /// All cataloged artifacts, newest first. A missing or empty storage
    /// directory is an empty catalog, not an error.
    pub async fn list(&self) -> Result<Vec<SnapshotRecord>, AppError> {
        let mut records = Vec::new();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(META_SUFFIX) {
                continue;
            }
            let parsed = fs::read(entry.path())
                .await
                .ok()
                .and_then(|bytes| serde_json::from_slice::<SnapshotRecord>(&bytes).ok());
            match parsed {
                Some(record) => records.push(record),
                None => tracing::warn!(file = %name, "Skipping unreadable backup metadata"),
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Remove an artifact and its sidecar. A missing artifact is reported as
    /// not-found, never a silent success.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        validate_id(id)?;

        match fs::remove_file(self.artifact_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "Backup {} not found",
                    id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = fs::remove_file(self.sidecar_path(id)).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(id = %id, error = %e, "Failed to remove backup sidecar");
            }
        }

        tracing::info!(id = %id, "Backup artifact deleted");
        Ok(())
    }
}

fn validate_id(id: &str) -> Result<(), AppError> {
    let well_formed = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !well_formed {
        return Err(AppError::BadRequest(anyhow::anyhow!("Invalid backup id")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SnapshotOrigin, SnapshotStatus};
    use chrono::{Duration, Utc};

    async fn write_fixture(catalog: &SnapshotCatalog, id: &str, age_minutes: i64) {
        let record = SnapshotRecord {
            id: id.to_string(),
            created_at: Utc::now() - Duration::minutes(age_minutes),
            origin: SnapshotOrigin::Scheduled,
            size_bytes: 2,
            status: SnapshotStatus::Success,
        };
        fs::write(catalog.artifact_path(id), b"{}").await.unwrap();
        fs::write(
            catalog.sidecar_path(id),
            serde_json::to_vec(&record).unwrap(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn list_on_empty_directory_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SnapshotCatalog::new(dir.path());
        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_on_missing_directory_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SnapshotCatalog::new(dir.path().join("nope"));
        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SnapshotCatalog::new(dir.path());
        write_fixture(&catalog, "20250101T000000000Z", 30).await;
        write_fixture(&catalog, "20250101T000100000Z", 20).await;
        write_fixture(&catalog, "20250101T000200000Z", 10).await;

        let records = catalog.list().await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "20250101T000200000Z",
                "20250101T000100000Z",
                "20250101T000000000Z"
            ]
        );
    }

    #[tokio::test]
    async fn delete_missing_artifact_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SnapshotCatalog::new(dir.path());

        let err = catalog.delete("20250101T000000000Z").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_exactly_the_named_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SnapshotCatalog::new(dir.path());
        write_fixture(&catalog, "20250101T000000000Z", 20).await;
        write_fixture(&catalog, "20250101T000100000Z", 10).await;

        catalog.delete("20250101T000000000Z").await.unwrap();

        let remaining = catalog.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "20250101T000100000Z");
        assert!(!catalog.artifact_path("20250101T000000000Z").exists());
        assert!(catalog.artifact_path("20250101T000100000Z").exists());
    }

    #[tokio::test]
    async fn delete_rejects_path_traversal_ids() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SnapshotCatalog::new(dir.path());

        let err = catalog.delete("../escape").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
