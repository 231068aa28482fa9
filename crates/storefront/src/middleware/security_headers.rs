//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Adds restrictive security headers to all responses. Start locked down and
//! loosen only when specific functionality requires it.

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

use super::CspNonce;
use crate::state::AppState;

/// Origin htmx is loaded from.
pub const SCRIPT_CDN: &str = "https://unpkg.com";

/// Build the Content-Security-Policy value.
///
/// Product and category images are served by the backend, so its origin is
/// allowed in `img-src`. The per-request nonce is the only way an inline
/// script runs. Checkout posts end in a redirect to the payment processor,
/// so `form-action` allows any https target.
#[must_use]
pub fn content_security_policy(api_origin: &str, nonce: Option<&str>, secure: bool) -> String {
    let script_src = nonce.filter(|n| !n.is_empty()).map_or_else(
        || format!("script-src 'self' {SCRIPT_CDN}"),
        |n| format!("script-src 'self' {SCRIPT_CDN} 'nonce-{n}'"),
    );

    let mut policy = format!(
        "default-src 'none'; \
         {script_src}; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' data: {api_origin}; \
         connect-src 'self'; \
         frame-src 'none'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self' https:; \
         frame-ancestors 'none'"
    );
    if secure {
        policy.push_str("; upgrade-insecure-requests");
    }
    policy
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: strict-origin-when-cross-origin` (the payment
///   processor's hosted page needs our origin on redirect back)
/// - `Content-Security-Policy` (see [`content_security_policy`])
/// - `Permissions-Policy` denying sensitive features (payment included;
///   payment happens off-site)
/// - `Cache-Control: no-store, max-age=0` unless the route set its own
/// - `Cross-Origin-Opener-Policy: same-origin`
/// - `Cross-Origin-Resource-Policy: same-origin`
/// - `Cross-Origin-Embedder-Policy: credentialless` (backend images carry
///   no CORP header)
/// - `X-DNS-Prefetch-Control: off`
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let nonce = request.extensions().get::<CspNonce>().cloned();
    let mut response = next.run(request).await;

    let csp = content_security_policy(
        &state.config().api.origin(),
        nonce.as_ref().map(CspNonce::value),
        state.config().is_secure(),
    );
    apply_security_headers(response.headers_mut(), &csp);

    response
}

fn apply_security_headers(headers: &mut HeaderMap, csp: &str) {
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    match HeaderValue::from_str(csp) {
        Ok(value) => {
            headers.insert(CONTENT_SECURITY_POLICY, value);
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid CSP header value, falling back to default-src 'self'");
            headers.insert(
                CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("default-src 'self'"),
            );
        }
    }

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             autoplay=(), \
             browsing-topics=(), \
             camera=(), \
             display-capture=(), \
             geolocation=(), \
             gyroscope=(), \
             hid=(), \
             interest-cohort=(), \
             magnetometer=(), \
             microphone=(), \
             midi=(), \
             payment=(), \
             publickey-credentials-get=(), \
             serial=(), \
             usb=(), \
             xr-spatial-tracking=()",
        ),
    );

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );
    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_includes_api_origin_and_nonce() {
        let csp = content_security_policy("https://api.horeca.test", Some("abc123=="), true);
        assert!(csp.contains("img-src 'self' data: https://api.horeca.test;"));
        assert!(csp.contains("script-src 'self' https://unpkg.com 'nonce-abc123=='"));
        assert!(csp.ends_with("upgrade-insecure-requests"));
    }

    #[test]
    fn test_csp_without_nonce_or_tls() {
        let csp = content_security_policy("http://localhost:4000", None, false);
        assert!(csp.contains("script-src 'self' https://unpkg.com;"));
        assert!(!csp.contains("upgrade-insecure-requests"));
    }

    #[test]
    fn test_route_cache_control_is_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        );
        apply_security_headers(&mut headers, "default-src 'none'");
        assert_eq!(
            headers.get(CACHE_CONTROL).unwrap(),
            "public, max-age=31536000, immutable"
        );
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");
    }
}
