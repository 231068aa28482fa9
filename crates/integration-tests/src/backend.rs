//! In-process stand-in for the backend REST API.
//!
//! Serves a small fixed catalog, two user accounts and order creation. Order
//! bodies and checkout session requests are recorded for assertions.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};

/// Password accepted for [`CUSTOMER_EMAIL`].
pub const CUSTOMER_PASSWORD: &str = "correct-horse-battery";
/// Email of the existing customer account.
pub const CUSTOMER_EMAIL: &str = "chef@bistro.test";
/// Email the backend reports as already registered.
pub const TAKEN_EMAIL: &str = "taken@bistro.test";
/// Bearer token issued to the customer.
pub const CUSTOMER_TOKEN: &str = "token-chef";
/// Hosted payment page prefix returned for checkout sessions.
pub const PAYMENT_URL: &str = "https://pay.example.test/session/";
/// ID given to the first created order.
pub const FIRST_ORDER_ID: &str = "ord_1001";

#[derive(Default)]
struct BackendState {
    knife_name: RwLock<String>,
    orders: Mutex<Vec<Value>>,
    checkout_sessions: Mutex<Vec<Value>>,
}

/// Handle to a running fake backend.
#[derive(Clone)]
pub struct FakeBackend {
    pub base_url: String,
    state: Arc<BackendState>,
}

impl FakeBackend {
    /// Bind an ephemeral port and serve the fake API.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::expect_used)]
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            knife_name: RwLock::new("Chef Knife".to_string()),
            ..BackendState::default()
        });

        let app = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/products", get(list_products))
            .route("/products/{slug}", get(get_product))
            .route("/categories", get(list_categories))
            .route("/categories/{slug}", get(get_category))
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/me", get(me))
            .route("/auth/forgot-password", post(|| async { StatusCode::NO_CONTENT }))
            .route("/orders", get(list_orders).post(create_order))
            .route("/orders/{id}", get(get_order))
            .route("/checkout/session", post(create_checkout_session))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Listener has no address");
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake backend server error");
        });

        Self {
            base_url: format!("http://{addr}/"),
            state,
        }
    }

    /// Rename the chef knife, as a catalog edit in the backend would.
    pub async fn rename_knife(&self, name: &str) {
        *self.state.knife_name.write().await = name.to_string();
    }

    /// Order bodies received so far.
    pub async fn orders(&self) -> Vec<Value> {
        self.state.orders.lock().await.clone()
    }

    /// Checkout session requests received so far.
    pub async fn checkout_sessions(&self) -> Vec<Value> {
        self.state.checkout_sessions.lock().await.clone()
    }
}

// =============================================================================
// Catalog
// =============================================================================

fn cooking() -> Value {
    json!({ "id": "cat-cooking", "slug": "cooking", "name": "Cooking" })
}

fn cutlery() -> Value {
    json!({ "id": "cat-cutlery", "slug": "cutlery", "name": "Cutlery" })
}

async fn catalog(state: &BackendState) -> Vec<Value> {
    vec![
        json!({
            "id": "prod-oven",
            "slug": "combi-oven",
            "name": "Combi Oven 10 GN",
            "description": "Ten-tray combi steamer for busy kitchens.",
            "price": "4999.00",
            "images": ["/uploads/combi-oven.jpg"],
            "category": cooking(),
            "variants": [
                { "id": "v-gas", "name": "Gas", "price": "5199.00" },
                { "id": "v-electric", "name": "Electric" }
            ],
            "sku": "OV-10GN",
            "brand": "Rational",
            "specifications": [{ "name": "Trays", "value": "10" }]
        }),
        json!({
            "id": "prod-knife",
            "slug": "chef-knife",
            "name": state.knife_name.read().await.clone(),
            "price": "89.50",
            "salePrice": "74.50",
            "category": cutlery(),
            "sizes": ["20cm", "25cm"]
        }),
        json!({
            "id": "prod-ice",
            "slug": "ice-machine",
            "name": "Ice Machine 50kg",
            "price": "1890.00",
            "category": cooking(),
            "inStock": false
        }),
    ]
}

#[derive(Debug, Default, Deserialize)]
struct ProductsQuery {
    category: Option<String>,
    search: Option<String>,
    featured: Option<bool>,
}

async fn list_products(
    State(state): State<Arc<BackendState>>,
    Query(query): Query<ProductsQuery>,
) -> Json<Value> {
    let items: Vec<Value> = catalog(&state)
        .await
        .into_iter()
        .filter(|p| {
            query
                .category
                .as_ref()
                .is_none_or(|c| p["category"]["slug"] == c.as_str())
        })
        .filter(|p| {
            query.search.as_ref().is_none_or(|s| {
                p["name"]
                    .as_str()
                    .is_some_and(|name| name.to_lowercase().contains(&s.to_lowercase()))
            })
        })
        .filter(|p| query.featured != Some(true) || p["inStock"] != false)
        .collect();

    Json(json!({ "items": items, "total": items.len(), "page": 1, "pages": 1 }))
}

async fn get_product(State(state): State<Arc<BackendState>>, Path(slug): Path<String>) -> Response {
    match catalog(&state).await.into_iter().find(|p| p["slug"] == slug.as_str()) {
        Some(product) => Json(json!({ "data": product })).into_response(),
        None => not_found(),
    }
}

async fn list_categories() -> Json<Value> {
    let mut cooking = cooking();
    cooking["productCount"] = json!(2);
    let mut cutlery = cutlery();
    cutlery["productCount"] = json!(1);
    Json(json!([cooking, cutlery]))
}

async fn get_category(Path(slug): Path<String>) -> Response {
    [cooking(), cutlery()]
        .into_iter()
        .find(|c| c["slug"] == slug.as_str())
        .map_or_else(not_found, |c| Json(c).into_response())
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not found" }))).into_response()
}

// =============================================================================
// Auth
// =============================================================================

fn customer() -> Value {
    json!({ "id": "user-1", "email": CUSTOMER_EMAIL, "name": "Bistro Chef", "phone": "+31 20 555 0101" })
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized" }))).into_response()
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["email"] == CUSTOMER_EMAIL && body["password"] == CUSTOMER_PASSWORD {
        Json(json!({ "token": CUSTOMER_TOKEN, "user": customer() })).into_response()
    } else {
        unauthorized()
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == TAKEN_EMAIL {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": "Email already exists" })),
        )
            .into_response();
    }
    Json(json!({
        "accessToken": "token-new",
        "user": { "_id": "user-2", "email": body["email"], "name": body["name"] }
    }))
    .into_response()
}

async fn me(headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some(CUSTOMER_TOKEN) => Json(customer()).into_response(),
        _ => unauthorized(),
    }
}

// =============================================================================
// Orders
// =============================================================================

fn order_json(id: &str, body: &Value) -> Value {
    json!({
        "id": id,
        "number": id.trim_start_matches("ord_"),
        "status": "pending",
        "items": body["items"].as_array().map(|items| {
            items.iter().map(|item| json!({
                "productId": item["productId"],
                "name": item["productId"],
                "variant": item["variant"],
                "quantity": item["quantity"],
                "price": "10.00"
            })).collect::<Vec<_>>()
        }),
        "total": "10.00",
        "createdAt": "2026-03-14T10:30:00Z",
        "shippingAddress": body["shippingAddress"]
    })
}

async fn create_order(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    if body["customer"]["name"] == "Reject Me" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "Delivery is not available to this address" })),
        )
            .into_response();
    }

    let mut orders = state.orders.lock().await;
    let id = format!("ord_{}", 1001 + orders.len());
    let order = order_json(&id, &body);
    orders.push(body);
    (StatusCode::CREATED, Json(order)).into_response()
}

async fn list_orders(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if bearer(&headers) != Some(CUSTOMER_TOKEN) {
        return unauthorized();
    }
    let orders = state.orders.lock().await;
    let list: Vec<Value> = orders
        .iter()
        .enumerate()
        .map(|(i, body)| order_json(&format!("ord_{}", 1001 + i), body))
        .collect();
    Json(json!({ "data": list })).into_response()
}

async fn get_order(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if bearer(&headers) != Some(CUSTOMER_TOKEN) {
        return unauthorized();
    }
    let orders = state.orders.lock().await;
    orders
        .iter()
        .enumerate()
        .map(|(i, body)| order_json(&format!("ord_{}", 1001 + i), body))
        .find(|order| order["id"] == id.as_str())
        .map_or_else(not_found, |order| Json(order).into_response())
}

async fn create_checkout_session(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let url = format!(
        "{PAYMENT_URL}{}",
        body["orderId"].as_str().unwrap_or_default()
    );
    state.checkout_sessions.lock().await.push(body);
    Json(json!({ "url": url, "id": "cs_test" }))
}
