//! Checkout route handlers.
//!
//! Checkout creates an order in the backend from the cart's keys and
//! quantities (the backend prices it), asks the backend for a hosted payment
//! session for that order, and redirects the shopper there.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use horeca_core::{Cart, Email};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use url::Url;

use super::cart::{CHECKOUT_CANCELLED, CartView};
use super::layout::{PageContext, non_blank};
use crate::api::ApiError;
use crate::api::types::{
    Address, CheckoutSessionRequest, CreateOrderRequest, CustomerDetails, OrderLineRequest,
};
use crate::cart_store;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::session_keys;
use crate::state::AppState;

/// Checkout form data. Every field is optional so a partial post re-renders
/// with messages instead of failing to deserialize.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub notes: Option<String>,
}

/// Values echoed back into the form.
#[derive(Debug, Clone, Default)]
pub struct CheckoutFormView {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub notes: String,
}

impl From<&CheckoutForm> for CheckoutFormView {
    fn from(form: &CheckoutForm) -> Self {
        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            name: value(&form.name),
            email: value(&form.email),
            phone: value(&form.phone),
            company: value(&form.company),
            line1: value(&form.line1),
            line2: value(&form.line2),
            city: value(&form.city),
            postal_code: value(&form.postal_code),
            country: value(&form.country),
            notes: value(&form.notes),
        }
    }
}

/// A checkout form that passed validation.
#[derive(Debug)]
pub struct ValidCheckout {
    pub customer: CustomerDetails,
    pub shipping_address: Address,
    pub notes: Option<String>,
}

impl CheckoutForm {
    /// Check required fields and the email address.
    ///
    /// # Errors
    ///
    /// Returns the list of messages to show next to the form.
    pub fn validate(&self) -> std::result::Result<ValidCheckout, Vec<String>> {
        let mut errors = Vec::new();
        let mut required = |value: &Option<String>, label: &str| {
            let value = non_blank(value.clone());
            if value.is_none() {
                errors.push(format!("{label} is required"));
            }
            value.unwrap_or_default()
        };

        let name = required(&self.name, "Name");
        let email = required(&self.email, "Email");
        let line1 = required(&self.line1, "Address");
        let city = required(&self.city, "City");
        let postal_code = required(&self.postal_code, "Postal code");
        let country = required(&self.country, "Country");

        let email = if email.is_empty() {
            None
        } else {
            match Email::parse(&email) {
                Ok(email) => Some(email),
                Err(e) => {
                    errors.push(format!("Invalid email: {e}"));
                    None
                }
            }
        };

        match email {
            Some(email) if errors.is_empty() => Ok(ValidCheckout {
                customer: CustomerDetails {
                    name,
                    email: email.into_inner(),
                    phone: non_blank(self.phone.clone()),
                    company: non_blank(self.company.clone()),
                },
                shipping_address: Address {
                    line1,
                    line2: non_blank(self.line2.clone()),
                    city,
                    postal_code,
                    country,
                },
                notes: non_blank(self.notes.clone()),
            }),
            _ => Err(errors),
        }
    }
}

/// Checkout success query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SuccessQuery {
    pub order: Option<String>,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub cart: CartView,
    pub form: CheckoutFormView,
    pub errors: Vec<String>,
}

/// Checkout confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/success.html")]
pub struct CheckoutSuccessTemplate {
    pub page: PageContext,
    pub order_id: Option<String>,
}

/// Display the checkout form, prefilled for logged-in users.
#[instrument(skip(state, page, jar, user))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    jar: SignedCookieJar,
    OptionalAuth(user): OptionalAuth,
) -> Response {
    let cart: Cart = cart_store::load(&jar);
    if cart.is_empty() {
        return Redirect::to("/cart").into_response();
    }

    let form = user.map_or_else(CheckoutFormView::default, |user| CheckoutFormView {
        name: user.name.clone().unwrap_or_default(),
        email: user.email,
        ..CheckoutFormView::default()
    });

    CheckoutTemplate {
        page,
        cart: CartView::new(&cart, state.config().currency),
        form,
        errors: Vec::new(),
    }
    .into_response()
}

/// Create the order and redirect to the hosted payment page.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    jar: SignedCookieJar,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let cart: Cart = cart_store::load(&jar);
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let rerender = |errors: Vec<String>| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            CheckoutTemplate {
                page: page.clone(),
                cart: CartView::new(&cart, state.config().currency),
                form: CheckoutFormView::from(&form),
                errors,
            },
        )
            .into_response()
    };

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return Ok(rerender(errors)),
    };

    let token = user.as_ref().map(|u| u.token.as_str());
    let order_request = CreateOrderRequest {
        items: cart
            .items()
            .iter()
            .map(|item| OrderLineRequest {
                product_id: item.key.product_id.clone(),
                size: item.key.size.clone(),
                variant: item.key.variant.clone(),
                quantity: item.quantity,
            })
            .collect(),
        customer: valid.customer,
        shipping_address: valid.shipping_address,
        notes: valid.notes,
    };

    let order = match state.api().create_order(token, &order_request).await {
        Ok(order) => order,
        Err(ApiError::Status {
            status: 400 | 409 | 422,
            message,
        }) => {
            tracing::warn!("Order rejected by backend: {message}");
            return Ok(rerender(vec![message]));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(order_id = %order.id, lines = cart.line_count(), "Order created");
    add_breadcrumb("checkout", "Order created", Some(&[("order_id", order.id.as_str())]));

    session
        .insert(session_keys::PENDING_ORDER, order.id.to_string())
        .await?;

    let checkout = state
        .api()
        .create_checkout_session(
            token,
            &CheckoutSessionRequest {
                order_id: order.id.clone(),
                success_url: state.config().absolute_url(&format!(
                    "/checkout/success?order={}",
                    urlencoding::encode(order.id.as_str())
                )),
                cancel_url: state.config().absolute_url("/checkout/cancel"),
                customer_email: Some(order_request.customer.email.clone()),
            },
        )
        .await?;

    let target = checkout_redirect(&checkout.url)?;
    Ok(Redirect::to(target.as_str()).into_response())
}

/// Accept only absolute http(s) URLs from the backend as redirect targets.
fn checkout_redirect(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| AppError::Api(ApiError::InvalidUrl(format!("{raw}: {e}"))))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AppError::Api(ApiError::InvalidUrl(format!(
            "unsupported checkout URL scheme: {scheme}"
        )))),
    }
}

/// Payment completed: clear the cart and show the confirmation.
#[instrument(skip(state, page, session, jar))]
pub async fn success(
    State(state): State<AppState>,
    page: PageContext,
    session: Session,
    jar: SignedCookieJar,
    Query(query): Query<SuccessQuery>,
) -> Result<Response> {
    let pending: Option<String> = session.remove(session_keys::PENDING_ORDER).await?;
    let order_id = non_blank(query.order).or(pending);

    let jar = cart_store::save(jar, &Cart::new(), state.config().is_secure())?;
    let page = PageContext {
        cart_count: 0,
        ..page
    };

    Ok((jar, CheckoutSuccessTemplate { page, order_id }).into_response())
}

/// Payment cancelled: back to the cart, which was left untouched.
pub async fn cancel() -> Redirect {
    Redirect::to(&format!("/cart?notice={CHECKOUT_CANCELLED}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled() -> CheckoutForm {
        CheckoutForm {
            name: Some("Ada Cook".to_string()),
            email: Some("ada@bistro.test".to_string()),
            phone: Some(" ".to_string()),
            company: Some("Bistro Ada".to_string()),
            line1: Some("1 Market St".to_string()),
            line2: None,
            city: Some("Lyon".to_string()),
            postal_code: Some("69001".to_string()),
            country: Some("FR".to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_validate_accepts_complete_form() {
        let valid = filled().validate().unwrap();
        assert_eq!(valid.customer.email, "ada@bistro.test");
        assert_eq!(valid.customer.phone, None);
        assert_eq!(valid.customer.company.as_deref(), Some("Bistro Ada"));
        assert_eq!(valid.shipping_address.city, "Lyon");
    }

    #[test]
    fn test_validate_collects_every_error() {
        let form = CheckoutForm {
            email: Some("not-an-email".to_string()),
            city: None,
            country: Some(String::new()),
            ..filled()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.starts_with("City")));
        assert!(errors.iter().any(|e| e.starts_with("Country")));
        assert!(errors.iter().any(|e| e.starts_with("Invalid email")));
    }

    #[test]
    fn test_checkout_redirect_requires_http() {
        assert!(checkout_redirect("https://pay.example.test/s/abc").is_ok());
        assert!(checkout_redirect("javascript:alert(1)").is_err());
        assert!(checkout_redirect("/relative").is_err());
    }
}
