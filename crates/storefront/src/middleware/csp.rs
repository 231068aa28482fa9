//! Per-request CSP nonce.
//!
//! The storefront has one inline script: the htmx error handler at the end of
//! `base.html`, which copies the `data-error-message` text of a failed
//! fragment response into the `#flash` banner. Everything else is loaded from
//! `/static` or the htmx CDN. The nonce authorises that script alone.
//!
//! [`csp_nonce_middleware`] draws the nonce, [`crate::routes::layout::PageContext`]
//! hands it to templates as `page.nonce`, and
//! [`super::security_headers_middleware`] names it in `script-src`.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

/// Nonce for the layout's inline script: 128 random bits, base64url without
/// padding so it renders into the `nonce` attribute unescaped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CspNonce(pub String);

impl CspNonce {
    /// Draw a fresh nonce.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Store a fresh [`CspNonce`] in the request extensions.
///
/// Layered outside `security_headers_middleware`, which reads it back when
/// building the policy.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            // Without the middleware the inline script is simply blocked
            tracing::warn!("CSP nonce missing from request extensions");
            Self(String::new())
        }))
    }
}
