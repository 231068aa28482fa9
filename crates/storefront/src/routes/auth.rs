//! Authentication route handlers.
//!
//! Handles login, registration and password reset against the backend's
//! auth endpoints. A successful login or registration stores the backend
//! token in the server-side session; it never reaches the browser.
//!
//! Failures redirect back to the form with an `error` code that the page
//! handler turns into a message, carrying the `next` target along.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use horeca_core::Email;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::layout::{PageContext, non_blank};
use crate::api::ApiError;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_current_user, is_safe_redirect, set_current_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub next: Option<String>,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: Option<String>,
}

impl MessageQuery {
    fn error_message(&self) -> Option<String> {
        self.error.as_deref().map(|code| error_message(code).to_string())
    }

    fn safe_next(&self) -> String {
        safe_next(self.next.as_deref()).unwrap_or_default()
    }
}

/// Shopper-facing text for an error code.
fn error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid email or password.",
        "invalid_email" => "Please enter a valid email address.",
        "password_mismatch" => "Passwords do not match.",
        "password_too_short" => "Password must be at least 8 characters.",
        "name_required" => "Please enter your name.",
        "email_taken" => "An account with this email already exists.",
        "rate_limited" => "Too many attempts. Please wait a moment and try again.",
        "session" => "We could not sign you in. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}

/// A `next` value that is safe to redirect to.
fn safe_next(next: Option<&str>) -> Option<String> {
    next.map(str::trim)
        .filter(|n| is_safe_redirect(n))
        .map(ToOwned::to_owned)
}

/// Redirect back to a form with an error code, keeping `next`.
fn back_with_error(form_path: &str, code: &str, next: Option<&str>) -> Response {
    let mut location = format!("{form_path}?error={code}");
    if let Some(next) = safe_next(next) {
        location.push_str("&next=");
        location.push_str(&urlencoding::encode(&next));
    }
    Redirect::to(&location).into_response()
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    pub error: Option<String>,
    pub next: String,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub page: PageContext,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Store the user in the session and tag Sentry events with them.
async fn sign_in(session: &Session, user: &CurrentUser) -> Result<(), tower_sessions::session::Error> {
    set_current_user(session, user).await?;
    set_sentry_user(&user.id, Some(&user.email));
    Ok(())
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(page: PageContext, Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        error: query.error_message(),
        success: query
            .success
            .as_deref()
            .map(|_| "You have been signed out.".to_string()),
        next: query.safe_next(),
        page,
    }
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let Ok(email) = Email::parse(&form.email) else {
        return back_with_error("/auth/login", "invalid_email", form.next.as_deref());
    };

    match state.api().login(email.as_str(), &form.password).await {
        Ok(auth) => {
            let user = CurrentUser::from(auth);
            if let Err(e) = sign_in(&session, &user).await {
                tracing::error!("Failed to set session: {e}");
                return back_with_error("/auth/login", "session", form.next.as_deref());
            }
            tracing::info!(user_id = %user.id, "User logged in");

            let target = safe_next(form.next.as_deref()).unwrap_or_else(|| "/account".to_string());
            Redirect::to(&target).into_response()
        }
        Err(e) => {
            tracing::warn!("Login failed: {e}");
            let code = match &e {
                ApiError::RateLimited(_) => "rate_limited",
                ApiError::Unauthorized | ApiError::NotFound(_) => "credentials",
                other if other.is_validation() => "credentials",
                _ => "failed",
            };
            back_with_error("/auth/login", code, form.next.as_deref())
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    page: PageContext,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    RegisterTemplate {
        error: query.error_message(),
        next: query.safe_next(),
        page,
    }
}

/// Handle registration form submission. Signs the new user in directly.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    let next = form.next.as_deref();

    let Some(name) = non_blank(Some(form.name.clone())) else {
        return back_with_error("/auth/register", "name_required", next);
    };
    let Ok(email) = Email::parse(&form.email) else {
        return back_with_error("/auth/register", "invalid_email", next);
    };
    if form.password != form.password_confirm {
        return back_with_error("/auth/register", "password_mismatch", next);
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return back_with_error("/auth/register", "password_too_short", next);
    }

    match state
        .api()
        .register(&name, email.as_str(), &form.password)
        .await
    {
        Ok(auth) => {
            let user = CurrentUser::from(auth);
            if let Err(e) = sign_in(&session, &user).await {
                tracing::error!("Failed to set session after registration: {e}");
                return back_with_error("/auth/login", "session", next);
            }
            tracing::info!(user_id = %user.id, "User registered");

            let target = safe_next(next).unwrap_or_else(|| "/account".to_string());
            Redirect::to(&target).into_response()
        }
        Err(e) => {
            tracing::warn!("Registration failed: {e}");
            let code = match &e {
                ApiError::Status { status: 409, .. } => "email_taken",
                ApiError::Status { message, .. }
                    if e.is_validation()
                        && (message.contains("taken") || message.contains("exists")) =>
                {
                    "email_taken"
                }
                ApiError::RateLimited(_) => "rate_limited",
                _ => "failed",
            };
            back_with_error("/auth/register", code, next)
        }
    }
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(
    page: PageContext,
    Query(query): Query<MessageQuery>,
) -> impl IntoResponse {
    ForgotPasswordTemplate {
        error: query.error_message(),
        success: query.success.as_deref().map(|_| {
            "If an account exists for that address, a reset link has been sent.".to_string()
        }),
        page,
    }
}

/// Handle forgot password form submission.
///
/// Always reports success so the form cannot be used to probe for accounts.
#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let Ok(email) = Email::parse(&form.email) else {
        return back_with_error("/auth/forgot-password", "invalid_email", None);
    };

    if let Err(e) = state.api().request_password_reset(email.as_str()).await {
        tracing::warn!("Password reset request failed: {e}");
    }

    Redirect::to("/auth/forgot-password?success=email_sent").into_response()
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {e}");
    }
    clear_sentry_user();

    Redirect::to("/auth/login?success=logged_out").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_filters_offsite_targets() {
        assert_eq!(safe_next(Some("/checkout")), Some("/checkout".to_string()));
        assert_eq!(safe_next(Some("//evil.test")), None);
        assert_eq!(safe_next(Some("https://evil.test")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_back_with_error_keeps_next() {
        let response = back_with_error("/auth/login", "credentials", Some("/account/orders?x=1"));
        let location = response.headers().get("location").and_then(|v| v.to_str().ok());
        assert_eq!(
            location,
            Some("/auth/login?error=credentials&next=%2Faccount%2Forders%3Fx%3D1")
        );

        let response = back_with_error("/auth/login", "credentials", Some("//evil.test"));
        let location = response.headers().get("location").and_then(|v| v.to_str().ok());
        assert_eq!(location, Some("/auth/login?error=credentials"));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(error_message("credentials"), "Invalid email or password.");
        assert_eq!(
            error_message("nonsense"),
            "Something went wrong. Please try again."
        );
    }
}
