//! Login, registration and account pages against the fake backend.

#![allow(clippy::unwrap_used)]

use horeca_integration_tests::backend::{CUSTOMER_EMAIL, CUSTOMER_PASSWORD, TAKEN_EMAIL};
use horeca_integration_tests::{TestContext, location};
use reqwest::StatusCode;

#[tokio::test]
async fn test_login_account_logout() {
    let ctx = TestContext::start().await;

    let resp = ctx.get("/account").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/auth/login?next=%2Faccount");

    let resp = ctx
        .post_form(
            "/auth/login",
            &[
                ("email", CUSTOMER_EMAIL),
                ("password", "wrong"),
                ("next", "/account/orders"),
            ],
        )
        .await;
    assert_eq!(
        location(&resp),
        "/auth/login?error=credentials&next=%2Faccount%2Forders"
    );
    assert!(ctx
        .get_text("/auth/login?error=credentials")
        .await
        .contains("Invalid email or password."));

    let resp = ctx
        .post_form(
            "/auth/login",
            &[
                ("email", CUSTOMER_EMAIL),
                ("password", CUSTOMER_PASSWORD),
                ("next", "/account/orders"),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/account/orders");

    let body = ctx.get_text("/account/orders").await;
    assert!(body.contains("You have not placed any orders yet"));

    let body = ctx.get_text("/account").await;
    assert!(body.contains("Bistro Chef"));
    assert!(body.contains(CUSTOMER_EMAIL));
    assert!(body.contains("+31 20 555 0101"));

    let resp = ctx.post_form("/auth/logout", &[]).await;
    assert_eq!(location(&resp), "/auth/login?success=logged_out");
    assert!(ctx
        .get_text("/auth/login?success=logged_out")
        .await
        .contains("You have been signed out."));

    let resp = ctx.get("/account").await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let ctx = TestContext::start().await;

    let resp = ctx
        .post_form(
            "/auth/login",
            &[
                ("email", CUSTOMER_EMAIL),
                ("password", CUSTOMER_PASSWORD),
                ("next", "https://evil.example/phish"),
            ],
        )
        .await;
    assert_eq!(location(&resp), "/account");
}

#[tokio::test]
async fn test_registration() {
    let ctx = TestContext::start().await;

    let resp = ctx
        .post_form(
            "/auth/register",
            &[
                ("name", "Line Cook"),
                ("email", "cook@bistro.test"),
                ("password", "long-enough-1"),
                ("password_confirm", "different-2"),
            ],
        )
        .await;
    assert_eq!(location(&resp), "/auth/register?error=password_mismatch");

    let resp = ctx
        .post_form(
            "/auth/register",
            &[
                ("name", "Line Cook"),
                ("email", TAKEN_EMAIL),
                ("password", "long-enough-1"),
                ("password_confirm", "long-enough-1"),
            ],
        )
        .await;
    assert_eq!(location(&resp), "/auth/register?error=email_taken");

    let resp = ctx
        .post_form(
            "/auth/register",
            &[
                ("name", "Line Cook"),
                ("email", "cook@bistro.test"),
                ("password", "long-enough-1"),
                ("password_confirm", "long-enough-1"),
            ],
        )
        .await;
    assert_eq!(location(&resp), "/account");

    // Header shows the signed-in name
    assert!(ctx.get_text("/").await.contains("Line Cook"));
}

#[tokio::test]
async fn test_forgot_password_always_succeeds() {
    let ctx = TestContext::start().await;

    let resp = ctx
        .post_form("/auth/forgot-password", &[("email", "nobody@bistro.test")])
        .await;
    assert_eq!(location(&resp), "/auth/forgot-password?success=email_sent");

    let body = ctx
        .get_text("/auth/forgot-password?success=email_sent")
        .await;
    assert!(body.contains("a reset link has been sent"));
}

#[tokio::test]
async fn test_order_history_after_checkout() {
    let ctx = TestContext::start().await;

    ctx.post_form(
        "/auth/login",
        &[("email", CUSTOMER_EMAIL), ("password", CUSTOMER_PASSWORD)],
    )
    .await;
    ctx.post_form("/cart/add", &[("slug", "combi-oven"), ("variant", "Electric")])
        .await;

    // The form is prefilled from the account
    let body = ctx.get_text("/checkout").await;
    assert!(body.contains(CUSTOMER_EMAIL));

    let resp = ctx
        .post_form(
            "/checkout",
            &[
                ("name", "Bistro Chef"),
                ("email", CUSTOMER_EMAIL),
                ("phone", "+31 20 555 0101"),
                ("line1", "Keizersgracht 1"),
                ("city", "Amsterdam"),
                ("postal_code", "1015 CJ"),
                ("country", "Netherlands"),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let body = ctx.get_text("/account/orders").await;
    assert!(body.contains("#1001"));
    assert!(body.contains("Awaiting payment"));
    assert!(body.contains("March 14, 2026"));

    let body = ctx.get_text("/account/orders/ord_1001").await;
    assert!(body.contains("Order #1001"));
    assert!(body.contains("Keizersgracht 1"));

    let resp = ctx.get("/account/orders/ord_9999").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
