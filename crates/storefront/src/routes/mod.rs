//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (backend reachable)
//!
//! # Catalog
//! GET  /products               - Product listing (?category&search&sort&page)
//! GET  /products/{slug}        - Product detail
//! GET  /categories             - Category listing
//! GET  /categories/{slug}      - Category detail (?page)
//!
//! # Cart (HTMX fragments or redirects)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart (count fragment, triggers cart-updated)
//! POST /cart/update            - Update quantity (cart_items fragment)
//! POST /cart/remove            - Remove line (cart_items fragment)
//! POST /cart/clear             - Empty the cart
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Favorites
//! GET  /favorites              - Favorites page
//! POST /favorites/toggle       - Toggle favorite (button fragment)
//! POST /favorites/remove       - Remove favorite
//! POST /favorites/move-to-cart - Move favorite into the cart
//!
//! # Checkout
//! GET  /checkout               - Checkout form
//! POST /checkout               - Create order, redirect to hosted payment
//! GET  /checkout/success       - Confirmation, clears the cart
//! GET  /checkout/cancel        - Back to the cart with a notice
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! GET  /auth/forgot-password   - Password reset request page
//! POST /auth/forgot-password   - Password reset request action
//! POST /auth/logout            - Logout action
//!
//! # Account (requires auth)
//! GET  /account                - Account overview
//! GET  /account/orders         - Order history
//! GET  /account/orders/{id}    - Order detail
//!
//! # Content
//! GET  /pages/{slug}           - Markdown content page
//!
//! # Webhooks
//! POST /api/revalidate         - Cache invalidation
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod checkout;
pub mod favorites;
pub mod home;
pub mod layout;
pub mod pages;
pub mod products;
pub mod revalidate;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router. Form posts share one rate limiter.
pub fn auth_routes() -> Router<AppState> {
    let limiter = auth_rate_limiter();

    Router::new()
        .route(
            "/login",
            get(auth::login_page).merge(post(auth::login).layer(limiter.clone())),
        )
        .route(
            "/register",
            get(auth::register_page).merge(post(auth::register).layer(limiter.clone())),
        )
        .route(
            "/forgot-password",
            get(auth::forgot_password_page)
                .merge(post(auth::forgot_password).layer(limiter)),
        )
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the category routes router.
pub fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index))
        .route("/{slug}", get(categories::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    let actions = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .layer(api_rate_limiter());

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(actions)
}

/// Create the favorites routes router.
pub fn favorites_routes() -> Router<AppState> {
    let actions = Router::new()
        .route("/toggle", post(favorites::toggle))
        .route("/remove", post(favorites::remove))
        .route("/move-to-cart", post(favorites::move_to_cart))
        .layer(api_rate_limiter());

    Router::new()
        .route("/", get(favorites::show))
        .merge(actions)
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(checkout::show).merge(post(checkout::submit).layer(api_rate_limiter())),
        )
        .route("/success", get(checkout::success))
        .route("/cancel", get(checkout::cancel))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order))
}

/// Create the webhook routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/revalidate", post(revalidate::revalidate))
        .layer(api_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/cart", cart_routes())
        .nest("/favorites", favorites_routes())
        .nest("/checkout", checkout_routes())
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .route("/pages/{slug}", get(pages::show))
        .nest("/api", api_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the backend API is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.api().health().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("Readiness check failed: {e}");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
