//! Shared page chrome and request helpers for route handlers.
//!
//! Every full-page template carries a [`PageContext`] with what the base
//! layout renders: the CSP nonce, the signed-in user's name, cart and
//! favorites badges and the footer page links.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::cookie::SignedCookieJar;
use horeca_core::{Cart, CurrencyCode, Favorites, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tower_sessions::Session;

use crate::cart_store;
use crate::content::PageLink;
use crate::middleware::CspNonce;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Data the base layout needs on every page.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub nonce: String,
    pub user_name: Option<String>,
    pub cart_count: u32,
    pub favorites_count: usize,
    pub nav_pages: Vec<PageLink>,
    pub path: String,
}

impl PageContext {
    /// Whether someone is logged in.
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.user_name.is_some()
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let nonce = parts
            .extensions
            .get::<CspNonce>()
            .map(|n| n.value().to_string())
            .unwrap_or_default();

        let user_name = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .ok()
                .flatten()
                .map(|user| user.display_name().to_string()),
            None => None,
        };

        let jar = SignedCookieJar::from_headers(&parts.headers, state.cookie_key().clone());
        let cart: Cart = cart_store::load(&jar);
        let favorites: Favorites = cart_store::load(&jar);

        Ok(Self {
            nonce,
            user_name,
            cart_count: cart.item_count(),
            favorites_count: favorites.len(),
            nav_pages: state.content().nav_links().to_vec(),
            path: parts.uri.path().to_string(),
        })
    }
}

/// Whether the request was made by HTMX and expects a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HxRequest(pub bool);

impl HxRequest {
    /// Read the `HX-Request` header.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self(
            headers
                .get("hx-request")
                .is_some_and(|v| v.as_bytes() == b"true"),
        )
    }
}

impl<S> FromRequestParts<S> for HxRequest
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Format an amount in the store currency.
#[must_use]
pub fn format_money(amount: Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).display()
}

/// Treat blank form/query values as absent.
#[must_use]
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Deserialize an optional number that a browser may post as an empty field.
///
/// Use with `#[serde(default, deserialize_with = "blank_as_none")]`.
///
/// # Errors
///
/// Fails if a non-blank value does not parse.
pub fn blank_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}
