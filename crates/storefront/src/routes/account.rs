//! Account route handlers.
//!
//! These routes require authentication. Backend calls use the token stored
//! in the session; if the backend no longer accepts it, the session is
//! cleared and the shopper is sent back to the login page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{OriginalUri, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use horeca_core::CurrencyCode;
use tower_sessions::Session;
use tracing::instrument;

use super::layout::{PageContext, format_money};
use crate::api::ApiError;
use crate::api::types::{Order, OrderItem};
use crate::error::{AppError, Result, clear_sentry_user};
use crate::filters;
use crate::middleware::{RequireAuth, clear_current_user};
use crate::state::AppState;

/// Orders shown on the account overview.
const RECENT_ORDERS: usize = 5;

/// User display data for templates.
#[derive(Clone, Debug)]
pub struct UserView {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
}

/// Order summary display data.
#[derive(Clone, Debug)]
pub struct OrderView {
    pub id: String,
    pub number: String,
    pub status: String,
    pub is_open: bool,
    pub total: String,
    pub placed_on: String,
    pub item_count: u32,
}

impl OrderView {
    fn new(order: &Order, currency: CurrencyCode) -> Self {
        Self {
            id: order.id.to_string(),
            number: order.display_number().to_string(),
            status: order.status.label().to_string(),
            is_open: order.status.is_open(),
            total: format_money(order.total, currency),
            placed_on: order
                .created_at
                .map(|at| at.format("%B %-d, %Y").to_string())
                .unwrap_or_default(),
            item_count: order.items.iter().map(|item| item.quantity).sum(),
        }
    }
}

/// Order line display data.
#[derive(Clone, Debug)]
pub struct OrderLineView {
    pub name: String,
    pub options: Option<String>,
    pub quantity: u32,
    pub price: String,
}

impl OrderLineView {
    fn new(item: &OrderItem, currency: CurrencyCode) -> Self {
        let options = match (item.size.as_deref(), item.variant.as_deref()) {
            (Some(size), Some(variant)) => Some(format!("{size} / {variant}")),
            (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
            (None, None) => None,
        };
        Self {
            name: item.name.clone(),
            options,
            quantity: item.quantity,
            price: format_money(item.price, currency),
        }
    }
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub page: PageContext,
    pub user: UserView,
    pub recent_orders: Vec<OrderView>,
}

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub page: PageContext,
    pub orders: Vec<OrderView>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct OrderTemplate {
    pub page: PageContext,
    pub order: OrderView,
    pub lines: Vec<OrderLineView>,
    pub shipping_address: Option<String>,
}

/// Turn a rejected token into a fresh login, passing other errors through.
async fn handle_api_error(session: &Session, uri: &OriginalUri, err: ApiError) -> Result<Response> {
    if matches!(err, ApiError::Unauthorized) {
        tracing::info!("Backend rejected session token, signing out");
        clear_current_user(session).await?;
        clear_sentry_user();
        let next = uri.path_and_query().map_or("/account", |pq| pq.as_str());
        let location = format!("/auth/login?next={}", urlencoding::encode(next));
        return Ok(Redirect::to(&location).into_response());
    }
    Err(AppError::Api(err))
}

/// Display account overview page.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    uri: OriginalUri,
    RequireAuth(current_user): RequireAuth,
) -> Result<Response> {
    let currency = state.config().currency;
    let (user, orders) = tokio::join!(
        state.api().current_user(&current_user.token),
        state.api().list_orders(&current_user.token),
    );

    let user = match user {
        Ok(user) => UserView {
            name: user.name.unwrap_or_else(|| user.email.clone()),
            email: user.email,
            phone: user.phone,
        },
        Err(e) => return handle_api_error(&session, &uri, e).await,
    };

    let recent_orders = match orders {
        Ok(orders) => orders
            .iter()
            .take(RECENT_ORDERS)
            .map(|order| OrderView::new(order, currency))
            .collect(),
        Err(ApiError::Unauthorized) => {
            return handle_api_error(&session, &uri, ApiError::Unauthorized).await;
        }
        Err(e) => {
            tracing::warn!("Failed to fetch orders for overview: {e}");
            Vec::new()
        }
    };

    Ok(AccountIndexTemplate {
        page,
        user,
        recent_orders,
    }
    .into_response())
}

/// Display order history.
#[instrument(skip_all)]
pub async fn orders(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    uri: OriginalUri,
    RequireAuth(current_user): RequireAuth,
) -> Result<Response> {
    let currency = state.config().currency;
    match state.api().list_orders(&current_user.token).await {
        Ok(orders) => Ok(OrdersTemplate {
            page,
            orders: orders
                .iter()
                .map(|order| OrderView::new(order, currency))
                .collect(),
        }
        .into_response()),
        Err(e) => handle_api_error(&session, &uri, e).await,
    }
}

/// Display a single order.
#[instrument(skip(state, page, session, uri, current_user))]
pub async fn order(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    uri: OriginalUri,
    RequireAuth(current_user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response> {
    let currency = state.config().currency;
    match state.api().get_order(&current_user.token, &id).await {
        Ok(order) => Ok(OrderTemplate {
            page,
            lines: order
                .items
                .iter()
                .map(|item| OrderLineView::new(item, currency))
                .collect(),
            shipping_address: order.shipping_address.as_ref().map(|a| a.one_line()),
            order: OrderView::new(&order, currency),
        }
        .into_response()),
        Err(e) => handle_api_error(&session, &uri, e).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_order_view() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": "o1",
            "number": "HS-1001",
            "status": "shipped",
            "total": "259.90",
            "createdAt": "2026-03-04T10:00:00Z",
            "items": [
                { "name": "Tongs", "quantity": 2, "price": "9.95", "size": "30 cm" },
                { "name": "Pan", "quantity": 1, "price": "240.00" }
            ]
        }))
        .unwrap();

        let view = OrderView::new(&order, CurrencyCode::USD);
        assert_eq!(view.number, "HS-1001");
        assert_eq!(view.total, "$259.90");
        assert_eq!(view.placed_on, "March 4, 2026");
        assert_eq!(view.item_count, 3);

        let line = OrderLineView::new(&order.items[0], CurrencyCode::USD);
        assert_eq!(line.options.as_deref(), Some("30 cm"));
    }
}
