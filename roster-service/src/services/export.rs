//! Read-side contract the backup engine consumes from the persistent store.

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::Document;
use serde_json::Value;
use service_core::error::AppError;

use super::MongoDb;

/// Enumeration and bulk-read operations over named collections.
///
/// Reads may run concurrently with live writes; the export is consistent per
/// collection scan, not a global transaction.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>, AppError>;
    async fn count_documents(&self, name: &str) -> Result<u64, AppError>;
    async fn read_all(&self, name: &str) -> Result<Vec<Value>, AppError>;
}

#[async_trait]
impl CollectionSource for MongoDb {
    async fn list_collections(&self) -> Result<Vec<String>, AppError> {
        let mut names = self
            .database()
            .list_collection_names(None)
            .await
            .map_err(AppError::from)?;
        names.sort();
        Ok(names)
    }

    async fn count_documents(&self, name: &str) -> Result<u64, AppError> {
        self.database()
            .collection::<Document>(name)
            .count_documents(None, None)
            .await
            .map_err(AppError::from)
    }

    async fn read_all(&self, name: &str) -> Result<Vec<Value>, AppError> {
        let mut cursor = self
            .database()
            .collection::<Document>(name)
            .find(None, None)
            .await
            .map_err(AppError::from)?;

        let mut records = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(AppError::from)? {
            let value = serde_json::to_value(&doc).map_err(|e| {
                AppError::InternalError(anyhow::anyhow!(
                    "Failed to serialize document from {}: {}",
                    name,
                    e
                ))
            })?;
            records.push(value);
        }
        Ok(records)
    }
}
