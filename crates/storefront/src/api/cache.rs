//! Cache values and revalidation scopes for backend catalog responses.
//!
//! Cache keys are the backend resource the response came from, with a
//! leading slash: `/products/chef-knife`, `/products?category=knives&page=2`,
//! `/categories`, `/categories/knives`.

use super::types::{Category, Product, ProductPage};

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(ProductPage),
    Category(Box<Category>),
    Categories(Vec<Category>),
}

/// Cache key for a single product.
#[must_use]
pub fn product_key(slug: &str) -> String {
    format!("/products/{slug}")
}

/// Cache key for a single category.
#[must_use]
pub fn category_key(slug: &str) -> String {
    format!("/categories/{slug}")
}

/// Cache key for the category list.
pub const CATEGORIES_KEY: &str = "/categories";

/// Whether a key is a product listing (any query, including featured).
#[must_use]
pub fn is_listing_key(key: &str) -> bool {
    key == "/products" || key.starts_with("/products?")
}

/// Which cached entries a revalidation removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevalidateScope {
    /// One product's detail entry plus every product listing.
    Product(String),
    /// One category's entry, the category list, and every product listing.
    Category(String),
    /// Every product listing and the category list.
    Listings,
    /// Everything.
    All,
}

impl RevalidateScope {
    /// Map a storefront page path onto the entries that render it.
    ///
    /// Paths that do not correspond to a cached catalog resource invalidate
    /// everything.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] | ["products" | "categories"] => Self::Listings,
            ["products", slug] => Self::Product(decode_segment(slug)),
            ["categories", slug] => Self::Category(decode_segment(slug)),
            _ => Self::All,
        }
    }

    /// Whether a cache key falls inside this scope.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::All => true,
            Self::Listings => is_listing_key(key) || key == CATEGORIES_KEY,
            Self::Product(slug) => is_listing_key(key) || key == product_key(slug),
            Self::Category(slug) => {
                is_listing_key(key) || key == CATEGORIES_KEY || key == category_key(slug)
            }
        }
    }

    /// Short description for logs and the webhook response.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Product(slug) => format!("product:{slug}"),
            Self::Category(slug) => format!("category:{slug}"),
            Self::Listings => "listings".to_string(),
            Self::All => "all".to_string(),
        }
    }
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |s| s.into_owned())
}
