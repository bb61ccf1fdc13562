use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Account record backing the login path. Emails are stored lowercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub tenant_id: Option<String>,
    pub active: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_lowercase(),
            display_name: None,
            password_hash,
            role,
            tenant_id: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
