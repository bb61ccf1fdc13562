//! Append-only audit trail recorder.
//!
//! Writes are fire-and-forget: audit is observability, not a transactional
//! participant. The `log_*` entry points are infallible by signature — a
//! failed insert is logged and counted, and the business operation that
//! triggered it proceeds unaffected.

use serde_json::{Map, Value};
use service_core::error::AppError;

use super::MongoDb;
use crate::middleware::RequestMeta;
use crate::models::{AuditAction, AuditRecord};

/// Field names matching any of these (case-insensitive substring) are
/// stripped from stored before/after snapshots.
const SECRET_PATTERNS: [&str; 4] = ["password", "token", "hash", "secret"];

#[derive(Clone)]
pub struct AuditRecorder {
    db: MongoDb,
}

impl AuditRecorder {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    /// Append a record and surface the write result. The `log_*` entry
    /// points spawn this and swallow failures.
    pub async fn record(&self, record: AuditRecord) -> Result<(), AppError> {
        self.db
            .audit_logs()
            .insert_one(&record, None)
            .await
            .map_err(AppError::from)?;
        metrics::counter!("audit_records_total").increment(1);
        Ok(())
    }

    fn spawn_write(&self, record: AuditRecord) {
        let recorder = self.clone();
        tokio::spawn(async move {
            let action = record.action;
            let resource_type = record.resource_type.clone();
            if let Err(e) = recorder.record(record).await {
                metrics::counter!("audit_write_failures").increment(1);
                tracing::error!(
                    error = %e,
                    action = ?action,
                    resource_type = %resource_type,
                    "Failed to write audit record"
                );
            }
        });
    }

    pub fn log_create(
        &self,
        actor_id: &str,
        resource_type: &str,
        resource_id: &str,
        state: &Value,
        meta: &RequestMeta,
    ) {
        let record = AuditRecord::new(
            actor_id,
            AuditAction::Create,
            resource_type,
            &meta.address,
            &meta.agent,
        )
        .with_resource_id(resource_id)
        .with_changes(None, Some(sanitize(state)));
        self.spawn_write(record);
    }

    /// Stores full sanitized before/after snapshots; the changed field paths
    /// (top-level and one level of nesting) are recorded in `details`.
    pub fn log_update(
        &self,
        actor_id: &str,
        resource_type: &str,
        resource_id: &str,
        before: &Value,
        after: &Value,
        meta: &RequestMeta,
    ) {
        let changed = changed_paths(before, after);
        let mut record = AuditRecord::new(
            actor_id,
            AuditAction::Update,
            resource_type,
            &meta.address,
            &meta.agent,
        )
        .with_resource_id(resource_id)
        .with_changes(Some(sanitize(before)), Some(sanitize(after)));
        if !changed.is_empty() {
            record = record.with_details(format!("changed: {}", changed.join(", ")));
        }
        self.spawn_write(record);
    }

    pub fn log_delete(
        &self,
        actor_id: &str,
        resource_type: &str,
        resource_id: &str,
        state: Option<&Value>,
        meta: &RequestMeta,
    ) {
        let record = AuditRecord::new(
            actor_id,
            AuditAction::Delete,
            resource_type,
            &meta.address,
            &meta.agent,
        )
        .with_resource_id(resource_id)
        .with_changes(state.map(sanitize), None);
        self.spawn_write(record);
    }

    pub fn log_login(&self, actor_id: &str, meta: &RequestMeta) {
        self.spawn_write(AuditRecord::new(
            actor_id,
            AuditAction::Login,
            "session",
            &meta.address,
            &meta.agent,
        ));
    }

    pub fn log_logout(&self, actor_id: &str, meta: &RequestMeta) {
        self.spawn_write(AuditRecord::new(
            actor_id,
            AuditAction::Logout,
            "session",
            &meta.address,
            &meta.agent,
        ));
    }

    /// 403 telemetry emitted by the role guard.
    pub fn log_access_denied(
        &self,
        actor_id: &str,
        resource_type: &str,
        details: impl Into<String>,
        meta: &RequestMeta,
    ) {
        self.spawn_write(
            AuditRecord::new(
                actor_id,
                AuditAction::AccessDenied,
                resource_type,
                &meta.address,
                &meta.agent,
            )
            .with_details(details),
        );
    }

    pub fn log_system_action(
        &self,
        actor_id: &str,
        resource_type: &str,
        resource_id: Option<&str>,
        details: impl Into<String>,
        meta: &RequestMeta,
    ) {
        let mut record = AuditRecord::new(
            actor_id,
            AuditAction::SystemAction,
            resource_type,
            &meta.address,
            &meta.agent,
        )
        .with_details(details);
        if let Some(id) = resource_id {
            record = record.with_resource_id(id);
        }
        self.spawn_write(record);
    }
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_lowercase();
    SECRET_PATTERNS.iter().any(|p| key.contains(p))
}

/// Strip secret-like fields recursively, including inside arrays of objects.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut clean = Map::new();
            for (key, val) in map {
                if is_secret_key(key) {
                    continue;
                }
                clean.insert(key.clone(), sanitize(val));
            }
            Value::Object(clean)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        other => other.clone(),
    }
}

/// Field paths (top-level and one level of nesting, `a` or `a.b`) whose
/// values differ between the two object snapshots.
pub fn changed_paths(before: &Value, after: &Value) -> Vec<String> {
    let (Value::Object(before_map), Value::Object(after_map)) = (before, after) else {
        return Vec::new();
    };

    let mut paths = Vec::new();
    let mut keys: Vec<&String> = before_map.keys().chain(after_map.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let old = before_map.get(key.as_str());
        let new = after_map.get(key.as_str());
        if old == new {
            continue;
        }
        match (old, new) {
            (Some(Value::Object(old_nested)), Some(Value::Object(new_nested))) => {
                let mut nested: Vec<&String> =
                    old_nested.keys().chain(new_nested.keys()).collect();
                nested.sort();
                nested.dedup();
                for sub in nested {
                    if old_nested.get(sub.as_str()) != new_nested.get(sub.as_str()) {
                        paths.push(format!("{}.{}", key, sub));
                    }
                }
            }
            _ => paths.push(key.to_string()),
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_strips_secret_fields_at_top_level() {
        let value = json!({
            "email": "a@example.com",
            "password": "hunter2",
            "api_token": "abc",
            "password_hash": "$argon2...",
            "client_secret": "shh",
        });

        let clean = sanitize(&value);
        assert_eq!(clean, json!({ "email": "a@example.com" }));
    }

    #[test]
    fn sanitize_recurses_into_nested_objects_and_arrays() {
        let value = json!({
            "profile": { "name": "Ann", "reset_token": "t" },
            "identities": [
                { "provider": "password", "ident_hash": "h" },
                { "provider": "google" }
            ]
        });

        let clean = sanitize(&value);
        assert_eq!(
            clean,
            json!({
                "profile": { "name": "Ann" },
                "identities": [ { "provider": "password" }, { "provider": "google" } ]
            })
        );
    }

    #[test]
    fn sanitize_is_case_insensitive() {
        let value = json!({ "Password": "x", "ApiToken": "y", "name": "ok" });
        assert_eq!(sanitize(&value), json!({ "name": "ok" }));
    }

    #[test]
    fn changed_paths_reports_top_level_and_nested_changes() {
        let before = json!({
            "name": "Ann",
            "hours": 40,
            "address": { "city": "Oslo", "zip": "0150" }
        });
        let after = json!({
            "name": "Ann",
            "hours": 32,
            "address": { "city": "Bergen", "zip": "0150" }
        });

        assert_eq!(changed_paths(&before, &after), vec!["address.city", "hours"]);
    }

    #[test]
    fn changed_paths_reports_added_and_removed_fields() {
        let before = json!({ "a": 1, "b": 2 });
        let after = json!({ "b": 2, "c": 3 });

        assert_eq!(changed_paths(&before, &after), vec!["a", "c"]);
    }

    #[test]
    fn changed_paths_is_empty_for_identical_snapshots() {
        let state = json!({ "a": 1, "nested": { "x": true } });
        assert!(changed_paths(&state, &state).is_empty());
    }
}
