use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

use crate::models::{AuditRecord, User};

pub const USERS_COLLECTION: &str = "users";
pub const AUDIT_LOGS_COLLECTION: &str = "audit_logs";

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    /// Single-point collection registry: every index this service relies on
    /// is created here at startup, nowhere else.
    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for roster-service");

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("email_lookup".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        self.users().create_index(email_index, None).await.map_err(|e| {
            tracing::error!("Failed to create email index on users collection: {}", e);
            AppError::from(e)
        })?;
        tracing::info!("Created unique index on users.email");

        let actor_time_index = IndexModel::builder()
            .keys(doc! { "actor_id": 1, "timestamp": -1 })
            .options(
                IndexOptions::builder()
                    .name("actor_timeline".to_string())
                    .build(),
            )
            .build();

        self.audit_logs()
            .create_index(actor_time_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create actor_timeline index on audit_logs collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created index on audit_logs.(actor_id, timestamp)");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection(USERS_COLLECTION)
    }

    pub fn audit_logs(&self) -> Collection<AuditRecord> {
        self.db.collection(AUDIT_LOGS_COLLECTION)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.users()
            .find_one(doc! { "email": email.to_lowercase() }, None)
            .await
            .map_err(AppError::from)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
