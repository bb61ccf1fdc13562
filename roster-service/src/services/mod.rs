pub mod audit;
pub mod backup;
pub mod catalog;
pub mod database;
pub mod export;
pub mod jwt;
pub mod metrics;

pub use audit::AuditRecorder;
pub use backup::{SchedulerStatus, SnapshotEngine};
pub use catalog::SnapshotCatalog;
pub use database::MongoDb;
pub use export::CollectionSource;
pub use jwt::{JwtService, SessionClaims};
pub use metrics::{get_metrics, init_metrics};
