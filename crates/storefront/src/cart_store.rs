//! Cookie persistence for the cart and favorites.
//!
//! Both live client-side in signed cookies keyed from the session secret, so
//! the storefront keeps no per-shopper state on the server. Values are JSON,
//! base64url-encoded without padding.
//!
//! A missing cookie, one whose signature does not verify, or one that no
//! longer decodes all load as empty.

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use horeca_core::{Cart, Favorites};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Cart cookie name.
pub const CART_COOKIE: &str = "hs_cart";

/// Favorites cookie name.
pub const FAVORITES_COOKIE: &str = "hs_favorites";

/// Cookie lifetime in days.
const COOKIE_MAX_AGE_DAYS: i64 = 30;

/// Largest encoded value written. Signing adds ~45 bytes and the browser
/// limit is 4096 for name, value and attributes together.
pub const MAX_ENCODED_LEN: usize = 3800;

/// Errors from persisting client-side state.
#[derive(Debug, thiserror::Error)]
pub enum CartStoreError {
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{name} is too large to store ({len} bytes)")]
    TooLarge { name: &'static str, len: usize },
}

/// State kept in a signed cookie.
pub trait CookieState: Serialize + DeserializeOwned + Default {
    /// Cookie name.
    const COOKIE: &'static str;

    /// Whether the state is empty (its cookie is then removed).
    fn is_empty(&self) -> bool;

    /// Shrink the state when its encoding is too large for a cookie.
    fn compact(&mut self);
}

impl CookieState for Cart {
    const COOKIE: &'static str = CART_COOKIE;

    fn is_empty(&self) -> bool {
        Self::is_empty(self)
    }

    fn compact(&mut self) {
        self.drop_images();
    }
}

impl CookieState for Favorites {
    const COOKIE: &'static str = FAVORITES_COOKIE;

    fn is_empty(&self) -> bool {
        Self::is_empty(self)
    }

    fn compact(&mut self) {
        self.drop_images();
    }
}

/// Encode a value for a cookie: JSON, then base64url without padding.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a cookie value produced by [`encode`].
#[must_use]
pub fn decode<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(raw.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Load state from the jar, falling back to empty.
#[must_use]
pub fn load<T: CookieState>(jar: &SignedCookieJar) -> T {
    let Some(cookie) = jar.get(T::COOKIE) else {
        return T::default();
    };

    decode(cookie.value()).unwrap_or_else(|| {
        tracing::warn!(cookie = T::COOKIE, "Discarding undecodable cookie");
        T::default()
    })
}

/// Write state to the jar. Empty state removes the cookie.
///
/// # Errors
///
/// Returns `CartStoreError::TooLarge` if the state does not fit in a cookie
/// even without image snapshots.
pub fn save<T: CookieState + Clone>(
    jar: SignedCookieJar,
    state: &T,
    secure: bool,
) -> Result<SignedCookieJar, CartStoreError> {
    if state.is_empty() {
        return Ok(jar.remove(Cookie::build(T::COOKIE).path("/")));
    }

    let mut encoded = encode(state)?;
    if encoded.len() > MAX_ENCODED_LEN {
        let mut compacted = state.clone();
        compacted.compact();
        encoded = encode(&compacted)?;
        tracing::debug!(cookie = T::COOKIE, len = encoded.len(), "Compacted cookie state");
    }
    if encoded.len() > MAX_ENCODED_LEN {
        return Err(CartStoreError::TooLarge {
            name: T::COOKIE,
            len: encoded.len(),
        });
    }

    let cookie = Cookie::build((T::COOKIE, encoded))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::days(COOKIE_MAX_AGE_DAYS));

    Ok(jar.add(cookie))
}
