//! Access gate: credential verification and role enforcement.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::models::Role;
use crate::services::JwtService;
use crate::startup::AppState;

use super::RequestMeta;

const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Caller identity resolved by the access gate.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub tenant_id: Option<String>,
}

/// Verify the presented credential and enforce the role allow-list.
///
/// The session cookie is checked first, with the bearer header as fallback.
/// An empty allow-list admits any authenticated caller. No I/O happens here;
/// ACCESS_DENIED telemetry is the caller's concern.
pub fn authorize(
    jwt: &JwtService,
    cookie_name: &str,
    jar: &CookieJar,
    headers: &HeaderMap,
    allowed: &[Role],
) -> Result<Identity, AppError> {
    let token = jar
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .or_else(|| bearer_token(headers))
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

    let claims = jwt.verify(&token)?;

    if !claims.role.permitted(allowed) {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Role {} is not permitted",
            claims.role
        )));
    }

    Ok(Identity {
        user_id: claims.sub,
        email: claims.email,
        role: claims.role,
        tenant_id: claims.tenant_id,
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Require an authenticated caller; attaches `Identity` to the request.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authorize(
        &state.jwt,
        &state.config.auth.session_cookie,
        &jar,
        req.headers(),
        &[],
    )?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Admin-only gate for operator routes. Denials by role are audited as
/// ACCESS_DENIED before the 403 is returned.
pub async fn admin_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = authorize(
        &state.jwt,
        &state.config.auth.session_cookie,
        &jar,
        req.headers(),
        &[],
    )?;

    if !identity.role.permitted(ADMIN_ONLY) {
        let meta = RequestMeta::from_headers(req.headers());
        state.audit.log_access_denied(
            &identity.user_id,
            req.uri().path(),
            format!("role {} is not permitted", identity.role),
            &meta,
        );
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Administrator role required"
        )));
    }

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Extractor for the identity attached by the gate.
pub struct AuthSession(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<Identity>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Identity missing from request extensions"))
        })?;
        Ok(AuthSession(identity.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    const SECRET: &str = "test-signing-secret-at-least-32-bytes!!";
    const COOKIE: &str = "roster_session";

    fn jwt() -> JwtService {
        JwtService::new(SECRET, 24)
    }

    fn credential_for(role: Role) -> String {
        let user = User::new("gate@example.com".to_string(), "hash".to_string(), role);
        jwt().issue(&user).unwrap()
    }

    fn jar_with(token: &str) -> CookieJar {
        CookieJar::new().add(Cookie::new(COOKIE, token.to_string()))
    }

    #[test]
    fn rejects_missing_credential() {
        let err = authorize(&jwt(), COOKIE, &CookieJar::new(), &HeaderMap::new(), &[]).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn rejects_garbage_bearer_credential() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer not-a-credential"),
        );
        let err = authorize(&jwt(), COOKIE, &CookieJar::new(), &headers, &[]).unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[test]
    fn accepts_credential_from_cookie() {
        let token = credential_for(Role::Employee);
        let identity =
            authorize(&jwt(), COOKIE, &jar_with(&token), &HeaderMap::new(), &[]).unwrap();
        assert_eq!(identity.role, Role::Employee);
        assert_eq!(identity.email, "gate@example.com");
    }

    #[test]
    fn accepts_credential_from_bearer_header() {
        let token = credential_for(Role::Hr);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        let identity = authorize(&jwt(), COOKIE, &CookieJar::new(), &headers, &[]).unwrap();
        assert_eq!(identity.role, Role::Hr);
    }

    #[test]
    fn cookie_takes_precedence_over_header() {
        let cookie_token = credential_for(Role::Admin);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer stale-garbage"),
        );
        let identity =
            authorize(&jwt(), COOKIE, &jar_with(&cookie_token), &headers, &[]).unwrap();
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn enforces_role_allow_list() {
        let token = credential_for(Role::Client);
        let err = authorize(
            &jwt(),
            COOKIE,
            &jar_with(&token),
            &HeaderMap::new(),
            &[Role::Admin, Role::Hr],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn allow_listed_role_passes() {
        let token = credential_for(Role::Hr);
        let identity = authorize(
            &jwt(),
            COOKIE,
            &jar_with(&token),
            &HeaderMap::new(),
            &[Role::Admin, Role::Hr],
        )
        .unwrap();
        assert_eq!(identity.role, Role::Hr);
    }
}
