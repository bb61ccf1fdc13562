//! Scheduled backup engine.
//!
//! Serializes every exportable collection into one timestamped artifact and
//! enforces the retention policy after each successful run. One pass runs at
//! a time; the busy flag is the sole overlap guard.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use service_core::error::AppError;
use tokio::fs;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{CollectionSource, SnapshotCatalog};
use crate::config::BackupConfig;
use crate::models::{SnapshotOrigin, SnapshotRecord, SnapshotStatus};

/// Scheduler state reported to operators.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub in_progress: bool,
    pub interval_minutes: u64,
    pub last_run: Option<LastRun>,
}

/// Outcome of the most recent pass, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub id: Option<String>,
    pub finished_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
    pub status: SnapshotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct SnapshotEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: BackupConfig,
    source: Arc<dyn CollectionSource>,
    catalog: SnapshotCatalog,
    running: AtomicBool,
    busy: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
    last_run: Mutex<Option<LastRun>>,
}

impl SnapshotEngine {
    pub fn new(config: BackupConfig, source: Arc<dyn CollectionSource>) -> Self {
        let catalog = SnapshotCatalog::new(config.storage_dir.clone());
        Self {
            inner: Arc::new(EngineInner {
                config,
                source,
                catalog,
                running: AtomicBool::new(false),
                busy: AtomicBool::new(false),
                cancel: Mutex::new(None),
                task: Mutex::new(None),
                last_run: Mutex::new(None),
            }),
        }
    }

    pub fn catalog(&self) -> &SnapshotCatalog {
        &self.inner.catalog
    }

    /// Start the recurring schedule. Idempotent: a second call while the
    /// timer is live returns the current status without spawning another.
    pub fn start(&self) -> SchedulerStatus {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::info!("Backup scheduler already running");
            return self.status();
        }

        let token = CancellationToken::new();
        *self.inner.cancel.lock().unwrap() = Some(token.clone());

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            engine.run_schedule(token).await;
        });
        *self.inner.task.lock().unwrap() = Some(handle);

        tracing::info!(
            interval_minutes = self.inner.config.interval_minutes,
            storage_dir = %self.inner.config.storage_dir,
            "Backup scheduler started"
        );
        self.status()
    }

    async fn run_schedule(&self, token: CancellationToken) {
        let period = StdDuration::from_secs(self.inner.config.interval_minutes * 60);
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the schedule starts one full
        // interval after start().
        timer.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = timer.tick() => {
                    if !self.acquire() {
                        tracing::warn!("Skipping scheduled backup: a run is already in progress");
                        continue;
                    }
                    let outcome = self.run_snapshot(SnapshotOrigin::Scheduled).await;
                    self.release();
                    if let Err(e) = outcome {
                        tracing::error!(error = %e, "Scheduled backup failed; awaiting next tick");
                    }
                }
            }
        }

        self.inner.running.store(false, Ordering::SeqCst);
        tracing::info!("Backup scheduler stopped");
    }

    /// Run one pass outside the timer cadence. Rejected, not queued, while
    /// another pass is in progress.
    pub async fn trigger(&self) -> Result<SnapshotRecord, AppError> {
        if !self.acquire() {
            return Err(AppError::Conflict(anyhow::anyhow!("Backup already running")));
        }
        let result = self.run_snapshot(SnapshotOrigin::Manual).await;
        self.release();
        result
    }

    /// Cancel future ticks. An in-flight pass is allowed to finish; the
    /// scheduler task observes cancellation only between passes.
    pub fn stop(&self) {
        if let Some(token) = self.inner.cancel.lock().unwrap().take() {
            token.cancel();
        }
    }

    /// Stop and wait for the scheduler task and any in-flight pass to
    /// finish. Used on process shutdown so no artifact is left half-written.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.inner.task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        while self.inner.busy.load(Ordering::SeqCst) {
            tokio::time::sleep(StdDuration::from_millis(50)).await;
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.inner.running.load(Ordering::SeqCst),
            in_progress: self.inner.busy.load(Ordering::SeqCst),
            interval_minutes: self.inner.config.interval_minutes,
            last_run: self.inner.last_run.lock().unwrap().clone(),
        }
    }

    fn acquire(&self) -> bool {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn release(&self) {
        self.inner.busy.store(false, Ordering::SeqCst);
    }

    async fn run_snapshot(&self, origin: SnapshotOrigin) -> Result<SnapshotRecord, AppError> {
        let started = Utc::now();
        let id = started.format("%Y%m%dT%H%M%S%3fZ").to_string();
        metrics::counter!("backup_runs_total").increment(1);
        tracing::info!(id = %id, origin = ?origin, "Backup run started");

        let result = self.write_artifact(&id, origin, started).await;

        match &result {
            Ok(record) => {
                self.record_last_run(LastRun {
                    id: Some(record.id.clone()),
                    finished_at: Utc::now(),
                    origin,
                    status: SnapshotStatus::Success,
                    error: None,
                });
                // Retention runs only after the replacement artifact exists.
                if let Err(e) = self.apply_retention().await {
                    tracing::error!(error = %e, "Retention pass failed");
                }
            }
            Err(e) => {
                metrics::counter!("backup_runs_failed").increment(1);
                self.record_last_run(LastRun {
                    id: None,
                    finished_at: Utc::now(),
                    origin,
                    status: SnapshotStatus::Failed,
                    error: Some(e.to_string()),
                });
                tracing::error!(id = %id, error = %e, "Backup run failed");
            }
        }

        result
    }

    async fn write_artifact(
        &self,
        id: &str,
        origin: SnapshotOrigin,
        started: DateTime<Utc>,
    ) -> Result<SnapshotRecord, AppError> {
        let catalog = &self.inner.catalog;
        fs::create_dir_all(catalog.storage_dir()).await?;

        let names = self.inner.source.list_collections().await?;
        let mut collections = Map::new();
        let mut counts = Map::new();
        for name in &names {
            let expected = self.inner.source.count_documents(name).await?;
            let records = self.inner.source.read_all(name).await?;
            tracing::debug!(
                collection = %name,
                expected,
                exported = records.len(),
                "Collection exported"
            );
            counts.insert(name.clone(), json!(records.len()));
            collections.insert(name.clone(), Value::Array(records));
        }

        let artifact = json!({
            "id": id,
            "created_at": started,
            "origin": origin,
            "counts": counts,
            "collections": collections,
        });
        let bytes = serde_json::to_vec_pretty(&artifact).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to serialize backup artifact: {}", e))
        })?;

        // Write through a partial name and rename, so a crash mid-write never
        // leaves a file the catalog would mistake for a finished artifact.
        let partial = catalog
            .storage_dir()
            .join(format!("{}.json.partial", id));
        let final_path = catalog.artifact_path(id);

        if let Err(e) = fs::write(&partial, &bytes).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&partial, &final_path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        let record = SnapshotRecord {
            id: id.to_string(),
            created_at: started,
            origin,
            size_bytes: bytes.len() as u64,
            status: SnapshotStatus::Success,
        };
        let sidecar_bytes = serde_json::to_vec_pretty(&record).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to serialize backup metadata: {}", e))
        })?;
        if let Err(e) = fs::write(catalog.sidecar_path(id), &sidecar_bytes).await {
            // Without its sidecar the artifact would be invisible to the
            // catalog; discard it rather than leak an orphan.
            let _ = fs::remove_file(&final_path).await;
            return Err(e.into());
        }

        tracing::info!(
            id = %id,
            collections = names.len(),
            size_bytes = record.size_bytes,
            origin = ?origin,
            "Backup artifact written"
        );
        Ok(record)
    }

    /// Delete artifacts beyond the configured bounds, oldest first. Called
    /// only after a successful run.
    async fn apply_retention(&self) -> Result<(), AppError> {
        let config = &self.inner.config;
        if config.max_count.is_none() && config.max_age_days.is_none() {
            return Ok(());
        }

        let records = self.inner.catalog.list().await?;
        let mut doomed: HashSet<&str> = HashSet::new();

        if let Some(max) = config.max_count {
            doomed.extend(records.iter().skip(max as usize).map(|r| r.id.as_str()));
        }
        if let Some(days) = config.max_age_days {
            let cutoff = Utc::now() - Duration::days(days);
            doomed.extend(
                records
                    .iter()
                    .filter(|r| r.created_at < cutoff)
                    .map(|r| r.id.as_str()),
            );
        }

        // `records` is newest-first, so walk it in reverse to delete oldest
        // first.
        for record in records.iter().rev() {
            if !doomed.contains(record.id.as_str()) {
                continue;
            }
            match self.inner.catalog.delete(&record.id).await {
                Ok(()) => {
                    metrics::counter!("backup_artifacts_deleted").increment(1);
                    tracing::info!(id = %record.id, "Retention removed backup artifact");
                }
                Err(AppError::NotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "Retention failed to remove artifact")
                }
            }
        }
        Ok(())
    }

    fn record_last_run(&self, run: LastRun) {
        *self.inner.last_run.lock().unwrap() = Some(run);
    }
}
