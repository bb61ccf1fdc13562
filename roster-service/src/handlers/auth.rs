//! Session endpoints: issue, revoke, introspect.

use axum::{
    extract::{Json, State},
    http::HeaderMap,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};

use crate::middleware::{authorize, AuthSession, RequestMeta};
use crate::models::Role;
use crate::startup::AppState;
use service_core::error::AppError;

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Authentication response with the issued credential.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Caller information in auth responses.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

/// Message response for simple operations.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Issue a signed, time-bounded session credential.
///
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    meta: RequestMeta,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    // One generic rejection for unknown email, bad password, and disabled
    // accounts alike.
    let invalid = || AppError::AuthError(anyhow::anyhow!("Invalid credentials"));

    let user = state
        .db
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active() {
        return Err(invalid());
    }

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(invalid());
    }

    let token = state.jwt.issue(&user)?;
    state.audit.log_login(&user.id, &meta);

    let cookie = Cookie::build((state.config.auth.session_cookie.clone(), token.clone()))
        .path("/")
        .http_only(true)
        .build();

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: state.jwt.session_ttl_seconds(),
            user: UserResponse {
                user_id: user.id,
                email: user.email,
                role: user.role,
                tenant_id: user.tenant_id,
            },
        }),
    ))
}

/// Revoke the session by clearing the cookie. Tolerates absent or invalid
/// credentials; a resolvable caller gets a LOGOUT audit record.
///
/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    meta: RequestMeta,
) -> (CookieJar, Json<MessageResponse>) {
    let cookie_name = state.config.auth.session_cookie.clone();

    if let Ok(identity) = authorize(&state.jwt, &cookie_name, &jar, &headers, &[]) {
        state.audit.log_logout(&identity.user_id, &meta);
    }

    let removal = Cookie::build((cookie_name, "")).path("/").build();
    (
        jar.remove(removal),
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// Resolve the current identity from the presented credential.
///
/// GET /auth/me
pub async fn whoami(AuthSession(identity): AuthSession) -> Json<UserResponse> {
    Json(UserResponse {
        user_id: identity.user_id,
        email: identity.email,
        role: identity.role,
        tenant_id: identity.tenant_id,
    })
}

/// Verify a password against its argon2 hash.
fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a password with argon2. Used by account provisioning.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Password hashing failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }
}
