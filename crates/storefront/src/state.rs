//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use secrecy::ExposeSecret;

use crate::api::{ApiClient, ApiError};
use crate::config::StorefrontConfig;
use crate::content::{ContentError, ContentStore};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend API client: {0}")]
    Api(#[from] ApiError),
    #[error("content: {0}")]
    Content(#[from] ContentError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; provides access to configuration, the
/// backend API client, loaded content pages and the cookie signing key.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: ApiClient,
    content: ContentStore,
    cookie_key: Key,
}

impl AppState {
    /// Create a new application state, loading content pages from the
    /// configured content directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built or the content
    /// directory cannot be read.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let content = ContentStore::load(&config.content_dir)?;
        Self::with_content(config, content)
    }

    /// Create a new application state with already loaded content.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub fn with_content(config: StorefrontConfig, content: ContentStore) -> Result<Self, StateError> {
        let api = ApiClient::new(&config.api)?;
        // The session secret is validated to be at least 32 bytes; key
        // expansion derives the 64-byte signing key from it.
        let cookie_key = Key::derive_from(config.session_secret.expose_secret().as_bytes());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                api,
                content,
                cookie_key,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the content store.
    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }

    /// Get the cookie signing key.
    #[must_use]
    pub fn cookie_key(&self) -> &Key {
        &self.inner.cookie_key
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.inner.cookie_key.clone()
    }
}
