//! Cache revalidation webhook.
//!
//! The backend calls `POST /api/revalidate` after catalog changes so cached
//! product and category responses are dropped before their TTL runs out.
//!
//! Requests authenticate with a shared secret in the `x-revalidate-secret`
//! header or the `secret` query parameter.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::RevalidateScope;
use crate::state::AppState;

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-revalidate-secret";

/// Webhook body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RevalidateRequest {
    Product { slug: String },
    Category { slug: String },
    Path { path: String },
    All,
}

impl RevalidateRequest {
    /// Cache scope this request invalidates.
    #[must_use]
    pub fn scope(&self) -> RevalidateScope {
        match self {
            Self::Product { slug } => RevalidateScope::Product(slug.trim().to_string()),
            Self::Category { slug } => RevalidateScope::Category(slug.trim().to_string()),
            Self::Path { path } => RevalidateScope::from_path(path),
            Self::All => RevalidateScope::All,
        }
    }
}

/// Optional query-string secret.
#[derive(Debug, Default, Deserialize)]
pub struct SecretQuery {
    pub secret: Option<String>,
}

/// Webhook response body.
#[derive(Debug, Serialize)]
pub struct RevalidateResponse {
    pub revalidated: bool,
    pub scope: String,
    /// Unix time in milliseconds.
    pub now: i64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
}

fn reject(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Handle a revalidation webhook.
#[instrument(skip_all)]
pub async fn revalidate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SecretQuery>,
    body: Bytes,
) -> Response {
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned)
        .or(query.secret);

    let expected = state.config().revalidate_secret.expose_secret();
    let authorized = provided.is_some_and(|p| constant_time_compare(&p, expected));
    if !authorized {
        tracing::warn!("Revalidation rejected: invalid secret");
        return reject(StatusCode::UNAUTHORIZED, "invalid secret");
    }

    let request: RevalidateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Revalidation rejected: invalid body: {e}");
            return reject(StatusCode::BAD_REQUEST, "invalid body");
        }
    };

    let scope = request.scope();
    state.api().invalidate(&scope).await;
    tracing::info!(scope = %scope.label(), "Cache revalidated");

    Json(RevalidateResponse {
        revalidated: true,
        scope: scope.label(),
        now: chrono::Utc::now().timestamp_millis(),
    })
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("s3cret-value", "s3cret-value"));
        assert!(!constant_time_compare("s3cret-value", "s3cret-valuf"));
        assert!(!constant_time_compare("short", "longer"));
    }

    #[test]
    fn test_request_scopes() {
        let parse = |json: &str| serde_json::from_str::<RevalidateRequest>(json).unwrap().scope();

        assert_eq!(
            parse(r#"{"kind":"product","slug":"chef-knife"}"#),
            RevalidateScope::Product("chef-knife".to_string())
        );
        assert_eq!(
            parse(r#"{"kind":"category","slug":"knives"}"#),
            RevalidateScope::Category("knives".to_string())
        );
        assert_eq!(
            parse(r#"{"kind":"path","path":"/products/chef-knife"}"#),
            RevalidateScope::Product("chef-knife".to_string())
        );
        assert_eq!(parse(r#"{"kind":"all"}"#), RevalidateScope::All);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(serde_json::from_str::<RevalidateRequest>(r#"{"kind":"everything"}"#).is_err());
        assert!(serde_json::from_str::<RevalidateRequest>(r#"{"kind":"product"}"#).is_err());
    }
}
