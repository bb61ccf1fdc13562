use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

/// Client address and user agent captured for audit records.
///
/// The address comes from `x-forwarded-for` (first hop) or `x-real-ip`;
/// behind no proxy both are absent and the value is "unknown".
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub address: String,
    pub agent: String,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let address = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Self { address, agent }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestMeta::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.1, 172.16.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.0.1"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));

        let meta = RequestMeta::from_headers(&headers);
        assert_eq!(meta.address, "10.0.0.1");
        assert_eq!(meta.agent, "curl/8.0");
    }

    #[test]
    fn falls_back_to_unknown() {
        let meta = RequestMeta::from_headers(&HeaderMap::new());
        assert_eq!(meta.address, "unknown");
        assert_eq!(meta.agent, "unknown");
    }
}
