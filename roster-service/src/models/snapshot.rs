//! Backup artifact metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a backup run was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOrigin {
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Success,
    Failed,
}

/// Catalog metadata persisted as a sidecar next to each artifact
/// (`<id>.meta.json`). The id is derived from the creation timestamp, so
/// lexicographic order is creation order. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
    pub size_bytes: u64,
    pub status: SnapshotStatus,
}
