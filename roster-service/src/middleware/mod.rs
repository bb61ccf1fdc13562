pub mod auth;
pub mod request_meta;

pub use auth::{admin_middleware, auth_middleware, authorize, AuthSession, Identity};
pub use request_meta::RequestMeta;
