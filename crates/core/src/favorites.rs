//! Favorites (wish list) state.
//!
//! Stored client-side like the cart and keyed by the same [`LineKey`], so a
//! shopper can favorite a specific size or variant of a product.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{CartItem, LineKey};

/// Largest number of favorites kept; the oldest entry is evicted beyond this.
pub const MAX_FAVORITES: usize = 24;

/// A favorited product with a display snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteItem {
    #[serde(rename = "k")]
    pub key: LineKey,
    #[serde(rename = "h")]
    pub slug: String,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "u")]
    pub price: Decimal,
}

impl FavoriteItem {
    /// Turn this favorite into a cart line with the given quantity.
    #[must_use]
    pub fn to_cart_item(&self, quantity: u32) -> CartItem {
        CartItem {
            key: self.key.clone(),
            slug: self.slug.clone(),
            name: self.name.clone(),
            image: self.image.clone(),
            unit_price: self.price,
            quantity,
        }
    }
}

/// Ordered favorites list, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorites {
    #[serde(default)]
    items: Vec<FavoriteItem>,
}

impl Favorites {
    /// An empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add or remove an item. Returns `true` if the item is now a favorite.
    pub fn toggle(&mut self, item: FavoriteItem) -> bool {
        if self.remove(&item.key) {
            false
        } else {
            self.add(item);
            true
        }
    }

    /// Add an item if absent. Returns `true` if it was newly added.
    ///
    /// Evicts the oldest favorite when the list is at [`MAX_FAVORITES`].
    pub fn add(&mut self, item: FavoriteItem) -> bool {
        if self.contains(&item.key) {
            return false;
        }
        if self.items.len() >= MAX_FAVORITES {
            self.items.remove(0);
        }
        self.items.push(item);
        true
    }

    /// Remove an item. Returns whether anything was removed.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.items.len();
        self.items.retain(|fav| &fav.key != key);
        self.items.len() != before
    }

    /// Look up a favorite.
    #[must_use]
    pub fn get(&self, key: &LineKey) -> Option<&FavoriteItem> {
        self.items.iter().find(|fav| &fav.key == key)
    }

    /// Whether the key is favorited.
    #[must_use]
    pub fn contains(&self, key: &LineKey) -> bool {
        self.get(key).is_some()
    }

    /// Whether any size/variant of a product is favorited.
    #[must_use]
    pub fn contains_product(&self, product_id: &crate::ProductId) -> bool {
        self.items.iter().any(|fav| &fav.key.product_id == product_id)
    }

    /// Drop the image snapshots, shrinking the encoded list.
    pub fn drop_images(&mut self) {
        for item in &mut self.items {
            item.image = None;
        }
    }

    /// All favorites, oldest first.
    #[must_use]
    pub fn items(&self) -> &[FavoriteItem] {
        &self.items
    }

    /// Number of favorites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::ProductId;

    fn fav(id: &str, size: Option<&str>) -> FavoriteItem {
        FavoriteItem {
            key: LineKey::new(ProductId::new(id), size, None),
            slug: id.to_string(),
            name: id.to_uppercase(),
            image: None,
            price: Decimal::from(25),
        }
    }

    #[test]
    fn test_toggle_is_an_involution() {
        let mut favorites = Favorites::new();
        assert!(favorites.toggle(fav("p1", None)));
        assert!(favorites.contains(&fav("p1", None).key));
        assert!(!favorites.toggle(fav("p1", None)));
        assert!(favorites.is_empty());
    }

    #[test]
    fn test_sizes_are_distinct_favorites() {
        let mut favorites = Favorites::new();
        favorites.add(fav("p1", Some("S")));
        favorites.add(fav("p1", Some("L")));
        assert_eq!(favorites.len(), 2);
        assert!(favorites.contains_product(&ProductId::new("p1")));
        assert!(!favorites.contains_product(&ProductId::new("p2")));
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut favorites = Favorites::new();
        assert!(favorites.add(fav("p1", None)));
        assert!(!favorites.add(fav("p1", None)));
        assert_eq!(favorites.len(), 1);
    }

    #[test]
    fn test_oldest_evicted_at_capacity() {
        let mut favorites = Favorites::new();
        for i in 0..=MAX_FAVORITES {
            favorites.add(fav(&format!("p{i}"), None));
        }
        assert_eq!(favorites.len(), MAX_FAVORITES);
        assert_eq!(favorites.items()[0].key.product_id.as_str(), "p1");
    }

    #[test]
    fn test_to_cart_item_copies_snapshot() {
        let item = fav("p9", Some("XL")).to_cart_item(3);
        assert_eq!(item.quantity, 3);
        assert_eq!(item.unit_price, Decimal::from(25));
        assert_eq!(item.key.size.as_deref(), Some("XL"));
    }
}
