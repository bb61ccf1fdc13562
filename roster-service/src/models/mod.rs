mod audit_log;
mod role;
mod snapshot;
mod user;

pub use audit_log::{AuditAction, AuditRecord, ChangeSet};
pub use role::Role;
pub use snapshot::{SnapshotOrigin, SnapshotRecord, SnapshotStatus};
pub use user::User;
