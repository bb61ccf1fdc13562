//! Session credential signing and verification.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::models::{Role, User};

/// Claims carried by a session credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signs and verifies session credentials with an HMAC secret (HS256).
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl_hours: i64,
}

impl JwtService {
    pub fn new(secret: &str, session_ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_ttl_hours,
        }
    }

    /// Issue a time-bounded credential for a user.
    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.session_ttl_hours);

        let claims = SessionClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            tenant_id: user.tenant_id.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to encode session credential: {}", e))
        })
    }

    /// Verify signature and expiry.
    ///
    /// Expired credentials are logged distinguishably from malformed ones but
    /// surface as the same caller-facing error.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // No clock-skew allowance: `now >= exp` is expired.
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                if matches!(e.kind(), ErrorKind::ExpiredSignature) {
                    tracing::warn!(reason = "expired", "Rejected session credential");
                } else {
                    tracing::warn!(reason = "invalid", error = %e, "Rejected session credential");
                }
                AppError::AuthError(anyhow::anyhow!("Invalid or expired credential"))
            })
    }

    /// Credential lifetime in seconds (for client info).
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_hours * 3600
    }
}
