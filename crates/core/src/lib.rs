//! Horeca Supply Core - Shared domain types library.
//!
//! This crate provides the types shared by the storefront server and its
//! integration tests:
//! - `storefront` - Public-facing catalog, cart, checkout and account site
//! - `integration-tests` - End-to-end tests against a fake backend
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O,
//! no HTTP clients. The backend REST API owns products, categories, orders
//! and users; the only state the storefront owns is the shopper's cart and
//! favorites, which live here.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses
//! - [`cart`] - Cart lines merged by `(product, size, variant)` key
//! - [`favorites`] - Favorites list keyed the same way as the cart

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod favorites;
pub mod types;

pub use cart::{Cart, CartError, CartItem, LineKey, MAX_CART_LINES, MAX_LINE_QUANTITY};
pub use favorites::{FavoriteItem, Favorites, MAX_FAVORITES};
pub use types::*;
