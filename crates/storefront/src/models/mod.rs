//! Domain models for storefront.
//!
//! Catalog, order and user entities belong to the backend and live in
//! [`crate::api::types`]. This module holds what the storefront itself keeps
//! in the session.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
