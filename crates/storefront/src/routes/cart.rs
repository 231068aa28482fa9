//! Cart route handlers.
//!
//! The cart lives in a signed cookie. Mutations respond to HTMX requests with
//! a fragment and an `HX-Trigger: cart-updated` header so the header badge
//! refreshes; plain form posts are redirected back to the cart page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use horeca_core::{Cart, CartItem, CurrencyCode, LineKey, ProductId};
use serde::Deserialize;
use tracing::instrument;

use super::layout::{HxRequest, PageContext, blank_as_none, format_money, non_blank};
use crate::api::types::Product;
use crate::cart_store;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::state::AppState;

/// Query value set when the shopper returns from a cancelled checkout.
pub const CHECKOUT_CANCELLED: &str = "checkout-cancelled";

/// Cart line display data.
#[derive(Clone, Debug)]
pub struct CartLineView {
    pub product_id: String,
    pub size: String,
    pub variant: String,
    pub slug: String,
    pub name: String,
    pub options: Option<String>,
    pub image: String,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
}

impl CartLineView {
    fn new(item: &CartItem, currency: CurrencyCode) -> Self {
        Self {
            product_id: item.key.product_id.to_string(),
            size: item.key.size.clone().unwrap_or_default(),
            variant: item.key.variant.clone().unwrap_or_default(),
            slug: item.slug.clone(),
            name: item.name.clone(),
            options: item.key.options_label(),
            image: item
                .image
                .clone()
                .unwrap_or_else(|| crate::api::types::PLACEHOLDER_IMAGE.to_string()),
            unit_price: format_money(item.unit_price, currency),
            quantity: item.quantity,
            line_total: format_money(item.line_total(), currency),
        }
    }
}

/// Cart display data.
#[derive(Clone, Debug)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl CartView {
    /// Build the view in the store currency.
    #[must_use]
    pub fn new(cart: &Cart, currency: CurrencyCode) -> Self {
        Self {
            items: cart
                .items()
                .iter()
                .map(|item| CartLineView::new(item, currency))
                .collect(),
            subtotal: format_money(cart.subtotal(), currency),
            item_count: cart.item_count(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub slug: String,
    pub size: Option<String>,
    pub variant: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub quantity: Option<u32>,
}

/// Form fields identifying a cart or favorites line.
#[derive(Debug, Deserialize)]
pub struct LineForm {
    pub product_id: String,
    pub size: Option<String>,
    pub variant: Option<String>,
}

impl LineForm {
    /// The composite key this form refers to.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(
            ProductId::new(self.product_id.trim()),
            self.size.as_deref(),
            self.variant.as_deref(),
        )
    }
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    pub size: Option<String>,
    pub variant: Option<String>,
    pub quantity: u32,
}

impl UpdateCartForm {
    /// The composite key this form refers to.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(
            ProductId::new(self.product_id.trim()),
            self.size.as_deref(),
            self.variant.as_deref(),
        )
    }
}

/// Cart page query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct CartQuery {
    pub notice: Option<String>,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub notice: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Size and variant chosen for a product, checked against the catalog.
///
/// Returns the line key with the canonical size and variant names.
///
/// # Errors
///
/// `AppError::BadRequest` if the size or variant is not offered, or if
/// `require_choice` is set and the product has options but none was chosen.
pub fn resolve_selection(
    product: &Product,
    size: Option<String>,
    variant: Option<String>,
    require_choice: bool,
) -> Result<LineKey> {
    let size = match non_blank(size) {
        Some(size) => Some(
            product
                .sizes
                .iter()
                .find(|s| s.eq_ignore_ascii_case(&size))
                .cloned()
                .ok_or_else(|| AppError::BadRequest(format!("Unknown size: {size}")))?,
        ),
        None if require_choice && !product.sizes.is_empty() => {
            return Err(AppError::BadRequest("Please choose a size".to_string()));
        }
        None => None,
    };

    let variant = match non_blank(variant) {
        Some(variant) => Some(
            product
                .find_variant(&variant)
                .map(|v| v.name.clone())
                .ok_or_else(|| AppError::BadRequest(format!("Unknown option: {variant}")))?,
        ),
        None if require_choice && !product.variants.is_empty() => {
            return Err(AppError::BadRequest("Please choose an option".to_string()));
        }
        None => None,
    };

    Ok(LineKey::new(
        product.id.clone(),
        size.as_deref(),
        variant.as_deref(),
    ))
}

/// Snapshot a product into a cart line for the given key.
///
/// # Errors
///
/// `AppError::BadRequest` if the product or chosen variant is out of stock.
pub fn line_for(product: &Product, key: LineKey, quantity: u32) -> Result<CartItem> {
    let variant = key
        .variant
        .as_deref()
        .and_then(|name| product.find_variant(name));
    let in_stock = product.in_stock && variant.is_none_or(|v| v.in_stock);
    if !in_stock {
        return Err(AppError::BadRequest(format!(
            "{} is out of stock",
            product.name
        )));
    }

    let unit_price = product.price_for_variant(key.variant.as_deref());
    Ok(CartItem {
        key,
        slug: product.slug.clone(),
        name: product.name.clone(),
        image: product.images.first().cloned(),
        unit_price,
        quantity,
    })
}

/// Write the cart and respond with the items fragment or a redirect.
fn respond_with_items(
    state: &AppState,
    jar: SignedCookieJar,
    cart: &Cart,
    hx: HxRequest,
) -> Result<Response> {
    let jar = cart_store::save(jar, cart, state.config().is_secure())?;

    if hx.0 {
        let cart = CartView::new(cart, state.config().currency);
        Ok((
            jar,
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartItemsTemplate { cart },
        )
            .into_response())
    } else {
        Ok((jar, Redirect::to("/cart")).into_response())
    }
}

/// Display cart page.
#[instrument(skip(state, page, jar))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    jar: SignedCookieJar,
    Query(query): Query<CartQuery>,
) -> CartShowTemplate {
    let cart: Cart = cart_store::load(&jar);
    let notice = query
        .notice
        .filter(|n| n == CHECKOUT_CANCELLED)
        .map(|_| "Checkout was cancelled. Your cart has been kept.".to_string());

    CartShowTemplate {
        page,
        cart: CartView::new(&cart, state.config().currency),
        notice,
    }
}

/// Add item to cart.
///
/// The product is fetched so the chosen size and variant can be checked
/// and the display snapshot and unit price taken from the catalog.
#[instrument(skip(state, jar))]
pub async fn add(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    hx: HxRequest,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product = state.api().get_product(form.slug.trim()).await?;
    let key = resolve_selection(&product, form.size, form.variant, true)?;
    let item = line_for(&product, key, form.quantity.unwrap_or(1))?;

    let mut cart: Cart = cart_store::load(&jar);
    let quantity = cart.add(item)?;
    add_breadcrumb("cart", "Added to cart", Some(&[("product", product.slug.as_str())]));
    tracing::debug!(product = %product.slug, quantity, "Cart line updated");

    let jar = cart_store::save(jar, &cart, state.config().is_secure())?;

    if hx.0 {
        Ok((
            jar,
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: cart.item_count(),
            },
        )
            .into_response())
    } else {
        Ok((jar, Redirect::to("/cart")).into_response())
    }
}

/// Update cart line quantity. Zero removes the line.
#[instrument(skip(state, jar))]
pub async fn update(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    hx: HxRequest,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let mut cart: Cart = cart_store::load(&jar);
    cart.set_quantity(&form.key(), form.quantity)?;
    respond_with_items(&state, jar, &cart, hx)
}

/// Remove a line from the cart.
#[instrument(skip(state, jar))]
pub async fn remove(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    hx: HxRequest,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let mut cart: Cart = cart_store::load(&jar);
    if cart.remove(&form.key()) {
        add_breadcrumb("cart", "Removed from cart", Some(&[("product", form.product_id.as_str())]));
    }
    respond_with_items(&state, jar, &cart, hx)
}

/// Empty the cart.
#[instrument(skip(state, jar))]
pub async fn clear(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    hx: HxRequest,
) -> Result<Response> {
    let mut cart: Cart = cart_store::load(&jar);
    cart.clear();
    respond_with_items(&state, jar, &cart, hx)
}

/// Get cart count badge (HTMX).
#[instrument(skip(jar))]
pub async fn count(jar: SignedCookieJar) -> CartCountTemplate {
    let cart: Cart = cart_store::load(&jar);
    CartCountTemplate {
        count: cart.item_count(),
    }
}
