//! Backend entity types.
//!
//! Pass-through shapes of what the backend REST API returns. The storefront
//! does not enforce invariants on these; it only supplies display fallbacks
//! for optional fields (see the `display_*` helpers).

use chrono::{DateTime, Utc};
use horeca_core::{CategoryId, OrderId, OrderStatus, ProductId, UserId, VariantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

/// Image shown when a product or category has none.
pub const PLACEHOLDER_IMAGE: &str = "/static/images/placeholder.svg";

/// Description shown when a product has none.
pub const NO_DESCRIPTION: &str = "No description available.";

/// Category label shown when a product has none.
pub const UNCATEGORISED: &str = "Uncategorised";

const fn default_true() -> bool {
    true
}

// =============================================================================
// Catalog
// =============================================================================

/// A purchasable variant (finish, material, voltage, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    #[serde(alias = "_id")]
    pub id: VariantId,
    pub name: String,
    /// Overrides the product price when present.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default = "default_true")]
    pub in_stock: bool,
}

/// A technical specification row (e.g. "Capacity" / "20 L").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    pub name: String,
    pub value: String,
}

/// Minimal category reference embedded in a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    #[serde(alias = "_id")]
    pub id: CategoryId,
    pub slug: String,
    pub name: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "_id")]
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: Option<CategorySummary>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub specifications: Vec<Specification>,
}

impl Product {
    /// The sale price, only when it is actually lower than the regular price.
    #[must_use]
    pub fn active_sale_price(&self) -> Option<Decimal> {
        self.sale_price.filter(|sale| *sale < self.price)
    }

    /// Price the shopper pays for the base product.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        self.active_sale_price().unwrap_or(self.price)
    }

    /// Price the shopper pays for a given variant (by id or name).
    #[must_use]
    pub fn price_for_variant(&self, variant: Option<&str>) -> Decimal {
        variant
            .and_then(|v| self.find_variant(v))
            .and_then(|v| v.price)
            .unwrap_or_else(|| self.effective_price())
    }

    /// Find a variant by id or by case-insensitive name.
    #[must_use]
    pub fn find_variant(&self, needle: &str) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.id.as_str() == needle || v.name.eq_ignore_ascii_case(needle))
    }

    /// First image or the placeholder.
    #[must_use]
    pub fn display_image(&self) -> &str {
        self.images.first().map_or(PLACEHOLDER_IMAGE, String::as_str)
    }

    /// Description or the fallback text.
    #[must_use]
    pub fn display_description(&self) -> &str {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(NO_DESCRIPTION)
    }

    /// Category name or the fallback label.
    #[must_use]
    pub fn display_category(&self) -> &str {
        self.category.as_ref().map_or(UNCATEGORISED, |c| c.name.as_str())
    }

    /// Rewrite relative image paths into absolute URLs on the API host.
    pub fn resolve_images(&mut self, base: &Url) {
        for image in &mut self.images {
            *image = resolve_image_url(base, image);
        }
    }
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(alias = "_id")]
    pub id: CategoryId,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub product_count: Option<u32>,
}

impl Category {
    /// Category image or the placeholder.
    #[must_use]
    pub fn display_image(&self) -> &str {
        self.image.as_deref().unwrap_or(PLACEHOLDER_IMAGE)
    }

    /// Rewrite a relative image path into an absolute URL on the API host.
    pub fn resolve_images(&mut self, base: &Url) {
        if let Some(image) = &mut self.image {
            *image = resolve_image_url(base, image);
        }
    }
}

/// One page of a product listing.
///
/// The backend answers either with a page object or, for unpaginated
/// queries, with a bare array; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProductPageRepr")]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: u64,
    pub page: u32,
    pub pages: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProductPageRepr {
    Page {
        #[serde(alias = "products")]
        items: Vec<Product>,
        #[serde(default)]
        total: Option<u64>,
        #[serde(default)]
        page: Option<u32>,
        #[serde(default, alias = "totalPages")]
        pages: Option<u32>,
    },
    List(Vec<Product>),
}

impl From<ProductPageRepr> for ProductPage {
    fn from(repr: ProductPageRepr) -> Self {
        match repr {
            ProductPageRepr::Page {
                items,
                total,
                page,
                pages,
            } => Self {
                total: total.unwrap_or(items.len() as u64),
                page: page.unwrap_or(1).max(1),
                pages: pages.unwrap_or(1).max(1),
                items,
            },
            ProductPageRepr::List(items) => Self {
                total: items.len() as u64,
                page: 1,
                pages: 1,
                items,
            },
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

/// A backend user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Login request body.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Registration request body.
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Token + user returned by login and registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(alias = "accessToken")]
    pub token: String,
    pub user: User,
}

// =============================================================================
// Orders & checkout
// =============================================================================

/// Postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    /// Single-line rendering for order pages.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref().filter(|l| !l.is_empty()) {
            parts.push(line2);
        }
        parts.extend([
            self.city.as_str(),
            self.postal_code.as_str(),
            self.country.as_str(),
        ]);
        parts.join(", ")
    }
}

/// Customer contact details attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

/// A cart line as sent to the backend; the backend prices it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub quantity: u32,
}

/// Order creation request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub customer: CustomerDetails,
    pub shipping_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub name: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id")]
    pub id: OrderId,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
}

impl Order {
    /// Order number for display, falling back to the id.
    #[must_use]
    pub fn display_number(&self) -> &str {
        self.number.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}

/// Checkout session request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub order_id: OrderId,
    pub success_url: String,
    pub cancel_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
}

/// Hosted checkout session returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub url: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Error body shape used by the backend.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Best message available.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error)
    }
}

/// Resolve an image reference against the API base URL.
///
/// Absolute URLs pass through; root-relative and relative paths are joined
/// onto the API origin.
#[must_use]
pub fn resolve_image_url(base: &Url, raw: &str) -> String {
    if Url::parse(raw).is_ok() {
        return raw.to_string();
    }
    base.join(raw)
        .map_or_else(|_| raw.to_string(), |url| url.to_string())
}
