//! Cookie parsing and formatting for the three auth cookies.

use axum::http::header;

/// Cookie name for the access token (httpOnly, 15 minutes).
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh token (httpOnly, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Cookie name for the CSRF token. Not httpOnly: the client must be able to
/// read it to echo it back in the `x-csrf-token` header.
pub const CSRF_COOKIE_NAME: &str = "csrfToken";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Format a Set-Cookie value. All auth cookies are SameSite=None (the SPA
/// lives on another origin); Secure is set per deployment config.
pub fn build_cookie(
    name: &str,
    value: &str,
    max_age_secs: u64,
    http_only: bool,
    secure: bool,
) -> String {
    format!(
        "{}={}; SameSite=None; Path=/; Max-Age={}{}{}",
        name,
        value,
        max_age_secs,
        if http_only { "; HttpOnly" } else { "" },
        if secure { "; Secure" } else { "" },
    )
}

/// Format a Set-Cookie value that clears the named cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    format!(
        "{}=; SameSite=None; Path=/; Max-Age=0{}",
        name,
        if secure { "; Secure" } else { "" },
    )
}

/// Set-Cookie values clearing all three auth cookies, for forced logout.
pub fn clear_all_cookies(secure: bool) -> [String; 3] {
    [
        clear_cookie(ACCESS_COOKIE_NAME, secure),
        clear_cookie(REFRESH_COOKIE_NAME, secure),
        clear_cookie(CSRF_COOKIE_NAME, secure),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("accessToken=abc123"));

        assert_eq!(get_cookie(&headers, "accessToken"), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; accessToken=abc123; refreshToken=xyz789"),
        );

        assert_eq!(get_cookie(&headers, "accessToken"), Some("abc123"));
        assert_eq!(get_cookie(&headers, "refreshToken"), Some("xyz789"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, "accessToken"), None);
    }

    #[test]
    fn test_get_cookie_no_header() {
        let headers = axum::http::HeaderMap::new();
        assert_eq!(get_cookie(&headers, "accessToken"), None);
    }

    #[test]
    fn test_get_cookie_with_spaces() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  accessToken = abc123  ; foo=bar"),
        );

        assert_eq!(get_cookie(&headers, "accessToken"), Some("abc123"));
    }

    #[test]
    fn test_build_cookie_flags() {
        let cookie = build_cookie("accessToken", "tok", 900, true, true);
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("Max-Age=900"));

        let csrf = build_cookie("csrfToken", "tok", 3600, false, false);
        assert!(!csrf.contains("HttpOnly"));
        assert!(!csrf.contains("Secure"));
    }

    #[test]
    fn test_clear_cookie() {
        let cookie = clear_cookie("refreshToken", false);
        assert!(cookie.starts_with("refreshToken=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}
