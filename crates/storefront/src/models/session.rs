//! Session-related types.
//!
//! Types stored in the session for authentication state.

use std::fmt;

use serde::{Deserialize, Serialize};

use horeca_core::UserId;

use crate::api::types::AuthResponse;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user, plus
/// the backend bearer token used for account and order calls.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user ID.
    pub id: UserId,
    /// User's email address.
    pub email: String,
    /// Display name, when the backend has one.
    pub name: Option<String>,
    /// Backend API token.
    pub token: String,
}

impl CurrentUser {
    /// Name to greet the user with, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

impl From<AuthResponse> for CurrentUser {
    fn from(auth: AuthResponse) -> Self {
        Self {
            id: auth.user.id,
            email: auth.user.email,
            name: auth.user.name,
            token: auth.token,
        }
    }
}

impl fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the ID of the order most recently sent to checkout.
    pub const PENDING_ORDER: &str = "pending_order";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(name: Option<&str>) -> CurrentUser {
        CurrentUser {
            id: UserId::new("u1"),
            email: "chef@bistro.test".to_string(),
            name: name.map(String::from),
            token: "tok_live_abc".to_string(),
        }
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(user(Some("Ana")).display_name(), "Ana");
        assert_eq!(user(Some(" ")).display_name(), "chef@bistro.test");
        assert_eq!(user(None).display_name(), "chef@bistro.test");
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", user(None));
        assert!(!debug.contains("tok_live_abc"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_auth_response() {
        let auth: AuthResponse = serde_json::from_value(serde_json::json!({
            "accessToken": "t1",
            "user": { "_id": 42, "email": "a@b.test", "name": "Ana" }
        }))
        .unwrap();
        let current = CurrentUser::from(auth);
        assert_eq!(current.id.as_str(), "42");
        assert_eq!(current.token, "t1");
    }
}
