//! Shopping cart state.
//!
//! The cart lives entirely on the client (a signed cookie) and is only
//! handed to the backend at checkout. Lines are identified by a
//! [`LineKey`]: the same product in a different size or variant is a
//! different line, the same `(product, size, variant)` triple is always
//! merged into one line.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// Largest quantity a single cart line can hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Largest number of distinct lines in one cart.
///
/// Keeps the encoded cart within the 4 KB browser cookie limit.
pub const MAX_CART_LINES: usize = 20;

/// Errors returned by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    /// Attempted to add zero units.
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    /// The cart already holds the maximum number of lines.
    #[error("cart is full (at most {max} different items)")]
    Full {
        /// Line limit.
        max: usize,
    },

    /// No line matches the given key.
    #[error("item is not in the cart")]
    LineNotFound,
}

/// Composite identity of a cart or favorites entry.
///
/// `None` only equals `None`: a product added without a size is a
/// different line from the same product added with one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    #[serde(rename = "p")]
    pub product_id: ProductId,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl LineKey {
    /// Build a key, treating blank size/variant values as absent.
    #[must_use]
    pub fn new(product_id: ProductId, size: Option<&str>, variant: Option<&str>) -> Self {
        Self {
            product_id,
            size: normalize(size),
            variant: normalize(variant),
        }
    }

    /// Short human-readable description of the options, e.g. `"Large / Steel"`.
    #[must_use]
    pub fn options_label(&self) -> Option<String> {
        match (&self.size, &self.variant) {
            (Some(size), Some(variant)) => Some(format!("{size} / {variant}")),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// A single cart line.
///
/// Besides the key and quantity, a line carries a display snapshot taken
/// when it was last added so the cart page renders without a backend call.
/// The backend prices the order again at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(rename = "k")]
    pub key: LineKey,
    #[serde(rename = "h")]
    pub slug: String,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "u")]
    pub unit_price: Decimal,
    #[serde(rename = "q")]
    pub quantity: u32,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The shopper's cart. Line order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add an item, merging with an existing line that has the same key.
    ///
    /// On merge the quantities are summed (clamped to
    /// [`MAX_LINE_QUANTITY`]) and the display snapshot is replaced with the
    /// newer one. Returns the resulting quantity of the line.
    ///
    /// # Errors
    ///
    /// [`CartError::ZeroQuantity`] for a zero quantity, [`CartError::Full`]
    /// when a new line would exceed [`MAX_CART_LINES`].
    pub fn add(&mut self, item: CartItem) -> Result<u32, CartError> {
        if item.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }

        if let Some(existing) = self.items.iter_mut().find(|line| line.key == item.key) {
            existing.quantity = existing
                .quantity
                .saturating_add(item.quantity)
                .min(MAX_LINE_QUANTITY);
            existing.slug = item.slug;
            existing.name = item.name;
            existing.image = item.image;
            existing.unit_price = item.unit_price;
            return Ok(existing.quantity);
        }

        if self.items.len() >= MAX_CART_LINES {
            return Err(CartError::Full {
                max: MAX_CART_LINES,
            });
        }

        let quantity = item.quantity.min(MAX_LINE_QUANTITY);
        self.items.push(CartItem { quantity, ..item });
        Ok(quantity)
    }

    /// Set the quantity of a line. Zero removes it.
    ///
    /// # Errors
    ///
    /// [`CartError::LineNotFound`] if no line has this key.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return if self.remove(key) {
                Ok(())
            } else {
                Err(CartError::LineNotFound)
            };
        }

        let line = self
            .items
            .iter_mut()
            .find(|line| &line.key == key)
            .ok_or(CartError::LineNotFound)?;
        line.quantity = quantity.min(MAX_LINE_QUANTITY);
        Ok(())
    }

    /// Remove a line. Returns whether anything was removed.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.items.len();
        self.items.retain(|line| &line.key != key);
        self.items.len() != before
    }

    /// Look up a line by key.
    #[must_use]
    pub fn get(&self, key: &LineKey) -> Option<&CartItem> {
        self.items.iter().find(|line| &line.key == key)
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drop the image snapshots, shrinking the encoded cart.
    ///
    /// Lines without an image render with the placeholder.
    pub fn drop_images(&mut self) {
        for item in &mut self.items {
            item.image = None;
        }
    }

    /// All lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Total number of units across all lines (the badge count).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
