//! Backend REST API client.
//!
//! # Architecture
//!
//! - The backend is the source of truth for catalog, users and orders
//! - Catalog reads are cached in-memory via `moka` (TTL from config) and
//!   invalidated by the revalidation webhook
//! - Auth, order and checkout calls are never cached and carry the user's
//!   bearer token when logged in
//!
//! Responses may be wrapped in a `{ "data": ... }` envelope or bare; both
//! are accepted.

mod cache;
pub mod types;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::BackendApiConfig;

pub use cache::RevalidateScope;
use cache::{CATEGORIES_KEY, CacheValue, category_key, product_key};
use types::{
    AuthResponse, Category, CheckoutSession, CheckoutSessionRequest, CreateOrderRequest,
    ErrorBody, LoginRequest, Order, Product, ProductPage, RegisterRequest, User,
};

/// Errors that can occur when talking to the backend API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or rejected bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether the error is a client-side validation failure reported by the
    /// backend (400/409/422), whose message is safe to show to the shopper.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Status { status: 400 | 409 | 422, .. })
    }
}

/// `{ "data": T }` or bare `T`.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

/// Filters for a product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub featured: bool,
}

impl ProductQuery {
    /// The backend resource for this query, e.g. `/products?category=knives&page=2`.
    ///
    /// Parameters are emitted in a fixed order so equal queries share a cache
    /// entry.
    #[must_use]
    pub fn resource(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if self.featured {
            query.append_pair("featured", "true");
        }
        if let Some(category) = non_empty(self.category.as_deref()) {
            query.append_pair("category", category);
        }
        if let Some(search) = non_empty(self.search.as_deref()) {
            query.append_pair("search", search);
        }
        if let Some(sort) = non_empty(self.sort.as_deref()) {
            query.append_pair("sort", sort);
        }
        if let Some(page) = self.page.filter(|p| *p > 1) {
            query.append_pair("page", &page.to_string());
        }
        if let Some(limit) = self.limit {
            query.append_pair("limit", &limit.to_string());
        }
        let query = query.finish();
        if query.is_empty() {
            "/products".to_string()
        } else {
            format!("/products?{query}")
        }
    }

    /// Whether the response may be cached. Free-text searches are not.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        non_empty(self.search.as_deref()).is_none()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the backend REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<String, CacheValue>,
    /// Bumped on every invalidation. A read that started under an older
    /// generation must not populate the cache.
    generation: AtomicU64,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BackendApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("horeca-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl)
            .support_invalidation_closures()
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
                generation: AtomicU64::new(0),
            }),
        })
    }

    fn endpoint(&self, resource: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(resource.trim_start_matches('/'))
            .map_err(|_| ApiError::InvalidUrl(resource.to_string()))
    }

    fn request(
        &self,
        method: Method,
        resource: &str,
        token: Option<&str>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(resource)?;
        let builder = self
            .inner
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        Ok(match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Send a request and return the body of a success response.
    async fn send(builder: RequestBuilder, resource: &str) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;

        match status {
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(resource.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ApiError::Unauthorized),
            s if !s.is_success() => {
                let message = serde_json::from_str::<ErrorBody>(&response_text)
                    .ok()
                    .and_then(ErrorBody::into_message)
                    .unwrap_or_else(|| {
                        s.canonical_reason().unwrap_or("unexpected status").to_string()
                    });
                tracing::warn!(
                    status = %s,
                    resource,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Backend API returned non-success status"
                );
                Err(ApiError::Status {
                    status: s.as_u16(),
                    message,
                })
            }
            _ => Ok(response_text),
        }
    }

    /// Send a request and decode the JSON response.
    async fn execute<T: DeserializeOwned>(
        builder: RequestBuilder,
        resource: &str,
    ) -> Result<T, ApiError> {
        let response_text = Self::send(builder, resource).await?;

        match serde_json::from_str::<Envelope<T>>(&response_text) {
            Ok(envelope) => Ok(envelope.into_inner()),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    resource,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse backend response"
                );
                Err(ApiError::Parse(e))
            }
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        resource: &str,
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::GET, resource, token)?;
        Self::execute(builder, resource).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        resource: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::POST, resource, token)?.json(body);
        Self::execute(builder, resource).await
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Cache a backend response unless an invalidation ran since `generation`
    /// was read.
    async fn store(&self, key: String, value: CacheValue, generation: u64) {
        if self.generation() != generation {
            debug!(key = %key, "Skipping cache insert, invalidated while in flight");
            return;
        }
        self.inner.cache.insert(key, value).await;
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    /// Get a page of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        let resource = query.resource();
        let cacheable = query.is_cacheable();

        if cacheable && let Some(CacheValue::Products(page)) = self.inner.cache.get(&resource).await
        {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let generation = self.generation();
        let mut page: ProductPage = self.get(&resource, None).await?;
        for product in &mut page.items {
            product.resolve_images(&self.inner.base_url);
        }

        if cacheable {
            self.store(resource, CacheValue::Products(page.clone()), generation)
                .await;
        }

        Ok(page)
    }

    /// Get featured products for the home page.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn featured_products(&self, limit: u32) -> Result<Vec<Product>, ApiError> {
        let query = ProductQuery {
            featured: true,
            limit: Some(limit),
            ..ProductQuery::default()
        };
        Ok(self.list_products(&query).await?.items)
    }

    /// Get a product by its slug.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the backend has no such product, or an
    /// error if the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn get_product(&self, slug: &str) -> Result<Product, ApiError> {
        let cache_key = product_key(slug);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let resource = format!("/products/{}", urlencoding::encode(slug));
        let generation = self.generation();
        let mut product: Product = self.get(&resource, None).await?;
        product.resolve_images(&self.inner.base_url);

        self.store(
            cache_key,
            CacheValue::Product(Box::new(product.clone())),
            generation,
        )
        .await;

        Ok(product)
    }

    /// Get all categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(CATEGORIES_KEY).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let generation = self.generation();
        let mut categories: Vec<Category> = self.get(CATEGORIES_KEY, None).await?;
        for category in &mut categories {
            category.resolve_images(&self.inner.base_url);
        }

        self.store(
            CATEGORIES_KEY.to_string(),
            CacheValue::Categories(categories.clone()),
            generation,
        )
        .await;

        Ok(categories)
    }

    /// Get a category by its slug.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the backend has no such category, or
    /// an error if the API request fails.
    #[instrument(skip(self), fields(slug = %slug))]
    pub async fn get_category(&self, slug: &str) -> Result<Category, ApiError> {
        let cache_key = category_key(slug);

        if let Some(CacheValue::Category(category)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for category");
            return Ok(*category);
        }

        let resource = format!("/categories/{}", urlencoding::encode(slug));
        let generation = self.generation();
        let mut category: Category = self.get(&resource, None).await?;
        category.resolve_images(&self.inner.base_url);

        self.store(
            cache_key,
            CacheValue::Category(Box::new(category.clone())),
            generation,
        )
        .await;

        Ok(category)
    }

    // =========================================================================
    // Auth Methods
    // =========================================================================

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for bad credentials, or an error if
    /// the API request fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.post("/auth/login", None, &LoginRequest { email, password })
            .await
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with the backend's message for rejected
    /// registrations (e.g. email taken), or an error if the request fails.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        self.post(
            "/auth/register",
            None,
            &RegisterRequest {
                name,
                email,
                password,
            },
        )
        .await
    }

    /// Fetch the user a token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the token is no longer valid.
    #[instrument(skip_all)]
    pub async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        self.get("/auth/me", Some(token)).await
    }

    /// Ask the backend to send a password reset email.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let resource = "/auth/forgot-password";
        let builder = self
            .request(Method::POST, resource, None)?
            .json(&serde_json::json!({ "email": email }));
        Self::send(builder, resource).await.map(|_| ())
    }

    // =========================================================================
    // Order & Checkout Methods
    // =========================================================================

    /// Create an order. Guests pass no token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the order or the request fails.
    #[instrument(skip(self, token, order), fields(lines = order.items.len()))]
    pub async fn create_order(
        &self,
        token: Option<&str>,
        order: &CreateOrderRequest,
    ) -> Result<Order, ApiError> {
        self.post("/orders", token, order).await
    }

    /// List the logged-in user's orders.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn list_orders(&self, token: &str) -> Result<Vec<Order>, ApiError> {
        self.get("/orders", Some(token)).await
    }

    /// Get one of the logged-in user's orders.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not exist for this user.
    #[instrument(skip(self, token))]
    pub async fn get_order(&self, token: &str, id: &str) -> Result<Order, ApiError> {
        let resource = format!("/orders/{}", urlencoding::encode(id));
        self.get(&resource, Some(token)).await
    }

    /// Create a hosted checkout session for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, token, request), fields(order_id = %request.order_id))]
    pub async fn create_checkout_session(
        &self,
        token: Option<&str>,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ApiError> {
        self.post("/checkout/session", token, request).await
    }

    /// Check the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend does not answer with a success status.
    pub async fn health(&self) -> Result<(), ApiError> {
        let builder = self.request(Method::GET, "/health", None)?;
        Self::send(builder, "/health").await.map(|_| ())
    }

    // =========================================================================
    // Cache Methods
    // =========================================================================

    /// Remove every cached entry inside a scope.
    pub async fn invalidate(&self, scope: &RevalidateScope) {
        if *scope == RevalidateScope::All {
            self.invalidate_all().await;
            return;
        }

        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        let scope = scope.clone();
        if let Err(e) = self
            .inner
            .cache
            .invalidate_entries_if(move |key, _| scope.matches(key))
        {
            tracing::error!(error = %e, "Failed to register cache invalidation");
            self.invalidate_all().await;
            return;
        }
        self.inner.cache.run_pending_tasks().await;
    }

    /// Remove every cached entry.
    pub async fn invalidate_all(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }

    /// Number of cached entries (after pending maintenance).
    pub async fn cached_entries(&self) -> u64 {
        self.inner.cache.run_pending_tasks().await;
        self.inner.cache.entry_count()
    }

    /// Whether a resource is currently cached.
    pub async fn is_cached(&self, key: &str) -> bool {
        self.inner.cache.get(key).await.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(&BackendApiConfig::with_base_url("http://127.0.0.1:9/v1").unwrap())
            .unwrap()
    }

    fn product(slug: &str) -> Product {
        serde_json::from_value(serde_json::json!({
            "id": slug, "slug": slug, "name": slug, "price": "10.00"
        }))
        .unwrap()
    }

    #[test]
    fn test_product_query_resource() {
        assert_eq!(ProductQuery::default().resource(), "/products");

        let query = ProductQuery {
            category: Some("knives".to_string()),
            search: Some("  ".to_string()),
            sort: Some("price_asc".to_string()),
            page: Some(2),
            limit: None,
            featured: false,
        };
        assert_eq!(
            query.resource(),
            "/products?category=knives&sort=price_asc&page=2"
        );
        assert!(query.is_cacheable());
    }

    #[test]
    fn test_product_query_encodes_search() {
        let query = ProductQuery {
            search: Some("chef knife & board".to_string()),
            page: Some(1),
            ..ProductQuery::default()
        };
        assert_eq!(query.resource(), "/products?search=chef+knife+%26+board");
        assert!(!query.is_cacheable());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = client();
        assert_eq!(
            client.endpoint("/products?page=2").unwrap().as_str(),
            "http://127.0.0.1:9/v1/products?page=2"
        );
    }

    #[test]
    fn test_envelope_accepts_wrapped_and_bare() {
        let wrapped: Envelope<Vec<u32>> = serde_json::from_str(r#"{"data":[1,2]}"#).unwrap();
        assert_eq!(wrapped.into_inner(), vec![1, 2]);
        let bare: Envelope<Vec<u32>> = serde_json::from_str("[3]").unwrap();
        assert_eq!(bare.into_inner(), vec![3]);
    }

    #[test]
    fn test_is_validation() {
        let err = ApiError::Status {
            status: 422,
            message: "Email taken".to_string(),
        };
        assert!(err.is_validation());
        assert!(!ApiError::Unauthorized.is_validation());
    }

    #[tokio::test]
    async fn test_invalidate_product_scope() {
        let client = client();
        let cache = &client.inner.cache;
        cache
            .insert(product_key("a"), CacheValue::Product(Box::new(product("a"))))
            .await;
        cache
            .insert(product_key("b"), CacheValue::Product(Box::new(product("b"))))
            .await;
        cache
            .insert(
                "/products?page=2".to_string(),
                CacheValue::Products(ProductPage {
                    items: vec![],
                    total: 0,
                    page: 2,
                    pages: 2,
                }),
            )
            .await;
        cache
            .insert(CATEGORIES_KEY.to_string(), CacheValue::Categories(vec![]))
            .await;

        client
            .invalidate(&RevalidateScope::Product("a".to_string()))
            .await;

        assert!(!client.is_cached("/products/a").await);
        assert!(!client.is_cached("/products?page=2").await);
        assert!(client.is_cached("/products/b").await);
        assert!(client.is_cached(CATEGORIES_KEY).await);
    }

    /// Backend whose first product read is slow and serves the old name.
    async fn slow_backend() -> (String, Arc<AtomicU64>) {
        use axum::{Json, Router, extract::State, routing::get};

        async fn product(State(calls): State<Arc<AtomicU64>>) -> Json<serde_json::Value> {
            let name = if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                "Old name"
            } else {
                "New name"
            };
            Json(serde_json::json!({
                "id": "a", "slug": "a", "name": name, "price": "10.00"
            }))
        }

        let calls = Arc::new(AtomicU64::new(0));
        let app = Router::new()
            .route("/products/a", get(product))
            .with_state(Arc::clone(&calls));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), calls)
    }

    #[tokio::test]
    async fn test_invalidate_during_read_is_not_undone() {
        let (base_url, calls) = slow_backend().await;
        let client =
            ApiClient::new(&BackendApiConfig::with_base_url(&base_url).unwrap()).unwrap();

        let in_flight = {
            let client = client.clone();
            tokio::spawn(async move { client.get_product("a").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        client
            .invalidate(&RevalidateScope::Product("a".to_string()))
            .await;

        assert_eq!(in_flight.await.unwrap().unwrap().name, "Old name");
        assert!(!client.is_cached("/products/a").await);

        let fresh = client.get_product("a").await.unwrap();
        assert_eq!(fresh.name, "New name");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(client.is_cached("/products/a").await);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let client = client();
        client
            .inner
            .cache
            .insert(product_key("a"), CacheValue::Product(Box::new(product("a"))))
            .await;
        assert_eq!(client.cached_entries().await, 1);

        client.invalidate(&RevalidateScope::All).await;
        assert_eq!(client.cached_entries().await, 0);
    }
}
