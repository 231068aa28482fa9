//! Horeca Supply Storefront library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused. [`app`] builds the complete router
//! with its middleware stack; the binary only adds configuration, logging
//! and the listener.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart_store;
pub mod config;
pub mod content;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::{HeaderValue, Request, header::CACHE_CONTROL},
    middleware::{from_fn, from_fn_with_state},
};
use tower::ServiceBuilder;
use tower_http::{
    services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::middleware::{
    create_session_layer, csp_nonce_middleware, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Cache policy for files under `/static`.
const STATIC_CACHE_CONTROL: &str = "public, max-age=86400";

/// Build the storefront application with all middleware applied.
///
/// Layers, outermost first: Sentry, request tracing, request ID, CSP nonce,
/// security headers, session.
pub fn app(state: AppState) -> Router {
    let static_files = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(STATIC_CACHE_CONTROL),
        ))
        .service(ServeDir::new(&state.config().static_dir));

    let session_layer = create_session_layer(state.config());

    Router::new()
        .merge(routes::routes())
        .nest_service("/static", static_files)
        .layer(session_layer)
        .layer(from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(from_fn(csp_nonce_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use horeca_core::CurrencyCode;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{BackendApiConfig, SentryConfig, StorefrontConfig};
    use crate::content::ContentStore;
    use crate::routes::revalidate::SECRET_HEADER;

    const WEBHOOK_SECRET: &str = "revalidate-secret-for-tests-0123456789";

    fn test_app() -> Router {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("session-secret-for-tests-0123456789abcdef"),
            // Nothing listens on the discard port
            api: BackendApiConfig::with_base_url("http://127.0.0.1:9").unwrap(),
            revalidate_secret: SecretString::from(WEBHOOK_SECRET),
            currency: CurrencyCode::USD,
            content_dir: manifest_dir.join("content"),
            static_dir: manifest_dir.join("static"),
            sentry: SentryConfig::default(),
        };
        let content = ContentStore::load(&config.content_dir).unwrap();
        app(AppState::with_content(config, content).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, secret: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_has_security_headers() {
        let response = test_app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("content-security-policy"));
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_readiness_reports_unreachable_backend() {
        let response = test_app().oneshot(get("/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_revalidate_requires_secret() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(post_json("/api/revalidate", None, r#"{"kind":"all"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(post_json("/api/revalidate", Some("wrong"), r#"{"kind":"all"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_revalidate_rejects_bad_body() {
        let response = test_app()
            .oneshot(post_json(
                "/api/revalidate",
                Some(WEBHOOK_SECRET),
                r#"{"kind":"nothing"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_revalidate_with_query_secret() {
        let uri = format!("/api/revalidate?secret={WEBHOOK_SECRET}");
        let response = test_app()
            .oneshot(post_json(&uri, None, r#"{"kind":"product","slug":"combi-oven"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["revalidated"], true);
        assert_eq!(json["scope"], "product:combi-oven");
    }

    #[tokio::test]
    async fn test_inline_script_carries_policy_nonce() {
        let response = test_app().oneshot(get("/pages/about")).await.unwrap();
        let csp = response.headers()["content-security-policy"]
            .to_str()
            .unwrap()
            .to_string();
        let nonce = csp
            .split("'nonce-")
            .nth(1)
            .and_then(|rest| rest.split('\'').next())
            .unwrap()
            .to_string();
        assert_eq!(nonce.len(), 22);

        let html = body_text(response).await;
        assert!(html.contains(&format!(r#"<script nonce="{nonce}">"#)));

        // A second request draws a different nonce
        let response = test_app().oneshot(get("/pages/about")).await.unwrap();
        let csp = response.headers()["content-security-policy"].to_str().unwrap();
        assert!(!csp.contains(&nonce));
    }

    #[tokio::test]
    async fn test_content_pages() {
        let app = test_app();

        let response = app.clone().oneshot(get("/pages/about")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("About us"));
        assert!(html.contains("/pages/terms"));

        let response = app.oneshot(get("/pages/does-not-exist")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let app = test_app();

        let response = app.clone().oneshot(get("/cart")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Your cart is empty"));

        let response = app.clone().oneshot(get("/cart/count")).await.unwrap();
        assert_eq!(body_text(response).await.trim(), "0");

        let response = app.oneshot(get("/checkout")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/cart");
    }

    #[tokio::test]
    async fn test_account_requires_login() {
        let response = test_app().oneshot(get("/account/orders")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login?next=%2Faccount%2Forders"
        );
    }

    #[tokio::test]
    async fn test_login_page_renders() {
        let response = test_app()
            .oneshot(get("/auth/login?error=credentials&next=/favorites"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Invalid email or password."));
        assert!(html.contains(r#"name="next""#));
    }
}
