//! Client address extraction for throttle keys.

use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::request::Parts};

/// Best-effort client address: first entry of `X-Forwarded-For` when running
/// behind a proxy, else the socket peer address.
///
/// Used only to scope rate-limit cooldowns, so "unknown" groups clients that
/// present neither rather than rejecting them.
pub fn extract_client_ip(parts: &Parts) -> String {
    if let Some(forwarded) = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extractor form of [`extract_client_ip`] for handlers that also consume
/// the request body.
pub struct ClientIp(pub String);

impl<S> axum::extract::FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(extract_client_ip(parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_header(value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header("x-forwarded-for", value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let parts = parts_with_header("203.0.113.7, 10.0.0.1");
        assert_eq!(extract_client_ip(&parts), "203.0.113.7");
    }

    #[test]
    fn test_no_source_is_unknown() {
        let (parts, _) = Request::builder().body(()).unwrap().into_parts();
        assert_eq!(extract_client_ip(&parts), "unknown");
    }
}
