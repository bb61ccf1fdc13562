//! Immutable audit trail records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kinds of actions captured by the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    Register,
    PasswordReset,
    AccessDenied,
    SystemAction,
}

/// Full sanitized before/after snapshots attached to a record.
///
/// Updates store both sides wholesale rather than a minimal patch; the list
/// of changed field paths goes into `details`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

/// Append-only audit record: who did what to which resource, and when.
/// Never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub actor_id: String,
    pub action: AuditAction,
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "ChangeSet::is_empty")]
    pub changes: ChangeSet,
    pub client_address: String,
    pub client_agent: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditRecord {
    pub fn new(
        actor_id: impl Into<String>,
        action: AuditAction,
        resource_type: impl Into<String>,
        client_address: impl Into<String>,
        client_agent: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor_id: actor_id.into(),
            action,
            resource_type: resource_type.into(),
            resource_id: None,
            changes: ChangeSet::default(),
            client_address: client_address.into(),
            client_agent: client_agent.into(),
            timestamp: Utc::now(),
            details: None,
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_changes(mut self, before: Option<Value>, after: Option<Value>) -> Self {
        self.changes = ChangeSet { before, after };
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
