//! Integration tests for the Horeca Supply storefront.
//!
//! [`TestContext::start`] runs a [`FakeBackend`] and the real storefront
//! router on ephemeral ports, then hands out a cookie-keeping HTTP client
//! that does not follow redirects.
//!
//! ```bash
//! cargo test -p horeca-integration-tests
//! ```

pub mod backend;

use std::net::SocketAddr;
use std::path::PathBuf;

use horeca_core::CurrencyCode;
use horeca_storefront::config::{BackendApiConfig, SentryConfig, StorefrontConfig};
use horeca_storefront::state::AppState;
use reqwest::{Client, Response, redirect::Policy};
use secrecy::SecretString;
use tokio::net::TcpListener;

pub use backend::FakeBackend;

/// Webhook secret the test storefront is configured with.
pub const REVALIDATE_SECRET: &str = "integration-revalidate-secret-0123456789";

/// A running storefront wired to a fake backend.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub backend: FakeBackend,
}

impl TestContext {
    /// Start the fake backend and the storefront.
    ///
    /// # Panics
    ///
    /// Panics if either server cannot bind or the storefront fails to start.
    #[allow(clippy::expect_used)]
    pub async fn start() -> Self {
        let backend = FakeBackend::start().await;

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind storefront listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let base_url = format!("http://{addr}");

        let storefront_dir =
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../storefront");
        let config = StorefrontConfig {
            host: addr.ip(),
            port: addr.port(),
            base_url: base_url.clone(),
            session_secret: SecretString::from("integration-session-secret-0123456789abcdef"),
            api: BackendApiConfig::with_base_url(&backend.base_url)
                .expect("Fake backend URL is valid"),
            revalidate_secret: SecretString::from(REVALIDATE_SECRET),
            currency: CurrencyCode::USD,
            content_dir: storefront_dir.join("content"),
            static_dir: storefront_dir.join("static"),
            sentry: SentryConfig::default(),
        };

        let state = AppState::new(config).expect("Failed to build storefront state");
        let app = horeca_storefront::app(state);
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Storefront server error");
        });

        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            backend,
        }
    }

    /// Absolute storefront URL for a path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET a storefront path.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// GET a storefront path and return the body.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not text.
    #[allow(clippy::expect_used)]
    pub async fn get_text(&self, path: &str) -> String {
        self.get(path)
            .await
            .text()
            .await
            .expect("Failed to read response body")
    }

    /// POST a urlencoded form to a storefront path.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// POST a form the way HTMX does, expecting a fragment back.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    #[allow(clippy::expect_used)]
    pub async fn post_htmx(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(path))
            .header("HX-Request", "true")
            .form(form)
            .send()
            .await
            .expect("HTMX request failed")
    }
}

/// The `Location` header of a redirect response.
///
/// # Panics
///
/// Panics if the response has no valid `Location` header.
#[must_use]
#[allow(clippy::expect_used)]
pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("Response has no Location header")
        .to_str()
        .expect("Location header is not ASCII")
        .to_string()
}
