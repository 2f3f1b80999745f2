//! Credential and source address extraction.

use axum::extract::ConnectInfo;
use http::{HeaderMap, Extensions, header};
use std::net::SocketAddr;

use crate::auth::token::is_api_token;

/// Cookies checked, in order, when no Authorization header is present.
const CREDENTIAL_COOKIES: [&str; 2] = ["auth_token", "access_token"];

/// Find the caller's credential.
///
/// Order: `Authorization: Bearer <token>`, a bare `gf_` token in the
/// Authorization header, then the `auth_token` and `access_token` cookies.
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
    {
        if let Some((scheme, token)) = value.split_once(' ')
            && scheme.eq_ignore_ascii_case("bearer")
        {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        } else if is_api_token(value) {
            return Some(value.to_string());
        }
    }

    CREDENTIAL_COOKIES
        .iter()
        .find_map(|name| cookie(headers, name))
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The caller's address: first `X-Forwarded-For` hop when trusted, else the
/// socket peer.
pub fn source_address(
    headers: &HeaderMap,
    extensions: &Extensions,
    trust_forwarded_for: bool,
) -> Option<String> {
    if trust_forwarded_for
        && let Some(forwarded) = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    {
        return Some(forwarded.to_string());
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_wins() {
        let h = headers(&[
            ("authorization", "Bearer gf_abcd1234_ff"),
            ("cookie", "auth_token=other"),
        ]);
        assert_eq!(extract_credential(&h).as_deref(), Some("gf_abcd1234_ff"));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let h = headers(&[("authorization", "bearer eyJ.a.b")]);
        assert_eq!(extract_credential(&h).as_deref(), Some("eyJ.a.b"));
    }

    #[test]
    fn bare_api_token() {
        let h = headers(&[("authorization", "gf_abcd1234_ff")]);
        assert_eq!(extract_credential(&h).as_deref(), Some("gf_abcd1234_ff"));
    }

    #[test]
    fn bare_non_token_is_ignored() {
        let h = headers(&[("authorization", "Basic dXNlcjpwYXNz")]);
        assert_eq!(extract_credential(&h), None);
    }

    #[test]
    fn cookie_fallback_order() {
        let h = headers(&[("cookie", "theme=dark; access_token=second; auth_token=first")]);
        assert_eq!(extract_credential(&h).as_deref(), Some("first"));
        let h = headers(&[("cookie", "access_token=second")]);
        assert_eq!(extract_credential(&h).as_deref(), Some("second"));
        let h = headers(&[("cookie", "auth_token=")]);
        assert_eq!(extract_credential(&h), None);
    }

    #[test]
    fn empty_bearer_falls_through_to_cookie() {
        let h = headers(&[("authorization", "Bearer  "), ("cookie", "auth_token=c")]);
        assert_eq!(extract_credential(&h).as_deref(), Some("c"));
    }

    #[test]
    fn forwarded_for_only_when_trusted() {
        let h = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        let mut ext = Extensions::new();
        ext.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(source_address(&h, &ext, true).as_deref(), Some("203.0.113.9"));
        assert_eq!(source_address(&h, &ext, false).as_deref(), Some("127.0.0.1"));
        assert_eq!(source_address(&h, &Extensions::new(), false), None);
    }
}
