//! Cart and guest checkout flows against the fake backend.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use horeca_integration_tests::backend::{FIRST_ORDER_ID, PAYMENT_URL};
use horeca_integration_tests::{TestContext, location};
use reqwest::StatusCode;

const ADDRESS: [(&str, &str); 6] = [
    ("email", "orders@bistro.test"),
    ("phone", "+31 20 555 0199"),
    ("line1", "Keizersgracht 1"),
    ("city", "Amsterdam"),
    ("postal_code", "1015 CJ"),
    ("country", "Netherlands"),
];

fn checkout_form<'a>(name: &'a str) -> Vec<(&'a str, &'a str)> {
    let mut form = vec![("name", name)];
    form.extend(ADDRESS);
    form
}

#[tokio::test]
async fn test_cart_add_update_remove() {
    let ctx = TestContext::start().await;

    let resp = ctx
        .post_form(
            "/cart/add",
            &[("slug", "chef-knife"), ("size", "25CM"), ("quantity", "2")],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/cart");

    let body = ctx.get_text("/cart").await;
    assert!(body.contains("Chef Knife"));
    assert!(body.contains("25cm"));
    assert!(body.contains("$149.00"));

    // Options must be chosen for the cart
    let resp = ctx.post_form("/cart/add", &[("slug", "combi-oven")]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = ctx
        .post_form("/cart/add", &[("slug", "combi-oven"), ("variant", "Steam")])
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .post_htmx("/cart/add", &[("slug", "combi-oven"), ("variant", "gas")])
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["hx-trigger"], "cart-updated");
    assert_eq!(resp.text().await.unwrap().trim(), "3");

    let resp = ctx
        .post_htmx(
            "/cart/update",
            &[
                ("product_id", "prod-knife"),
                ("size", "25cm"),
                ("variant", ""),
                ("quantity", "1"),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fragment = resp.text().await.unwrap();
    assert!(fragment.contains(r#"id="cart-items""#));
    assert!(fragment.contains("$5,273.50"));

    let resp = ctx
        .post_htmx(
            "/cart/remove",
            &[("product_id", "prod-oven"), ("size", ""), ("variant", "Gas")],
        )
        .await;
    let fragment = resp.text().await.unwrap();
    assert!(!fragment.contains("Combi Oven 10 GN"));
    assert!(fragment.contains("Chef Knife"));

    assert_eq!(ctx.get_text("/cart/count").await.trim(), "1");

    let resp = ctx.post_form("/cart/clear", &[]).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(ctx.get_text("/cart").await.contains("Your cart is empty"));
}

#[tokio::test]
async fn test_cart_add_with_cleared_quantity_adds_one() {
    let ctx = TestContext::start().await;

    let resp = ctx
        .post_form(
            "/cart/add",
            &[
                ("slug", "chef-knife"),
                ("size", "20cm"),
                ("variant", ""),
                ("quantity", ""),
            ],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/cart");

    assert_eq!(ctx.get_text("/cart/count").await.trim(), "1");
    assert!(ctx.get_text("/cart").await.contains("$74.50"));
}

#[tokio::test]
async fn test_out_of_stock_cannot_be_added() {
    let ctx = TestContext::start().await;

    let resp = ctx.post_form("/cart/add", &[("slug", "ice-machine")]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.text().await.unwrap().contains("out of stock"));
    assert_eq!(ctx.get_text("/cart/count").await.trim(), "0");
}

#[tokio::test]
async fn test_guest_checkout() {
    let ctx = TestContext::start().await;

    // Empty cart goes back to the cart page
    let resp = ctx.get("/checkout").await;
    assert_eq!(location(&resp), "/cart");

    ctx.post_form("/cart/add", &[("slug", "chef-knife"), ("size", "20cm")])
        .await;

    let resp = ctx.get("/checkout").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().contains("Continue to payment"));

    // Missing fields re-render the form with the values kept
    let resp = ctx
        .post_form("/checkout", &[("name", "Bistro Chef"), ("email", "not-an-email")])
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = resp.text().await.unwrap();
    assert!(body.contains("City is required"));
    assert!(body.contains("Invalid email"));
    assert!(body.contains(r#"value="Bistro Chef""#));

    // Backend validation errors are shown on the form
    let resp = ctx.post_form("/checkout", &checkout_form("Reject Me")).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp
        .text()
        .await
        .unwrap()
        .contains("Delivery is not available to this address"));
    assert!(ctx.backend.orders().await.is_empty());

    let resp = ctx.post_form("/checkout", &checkout_form("Bistro Chef")).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("{PAYMENT_URL}{FIRST_ORDER_ID}"));

    let orders = ctx.backend.orders().await;
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order["items"][0]["productId"], "prod-knife");
    assert_eq!(order["items"][0]["size"], "20cm");
    assert_eq!(order["items"][0]["quantity"], 1);
    assert_eq!(order["customer"]["email"], "orders@bistro.test");
    assert_eq!(order["shippingAddress"]["postalCode"], "1015 CJ");
    // Prices are decided by the backend
    assert!(order["items"][0].get("price").is_none());

    let sessions = ctx.backend.checkout_sessions().await;
    assert_eq!(sessions[0]["orderId"], FIRST_ORDER_ID);
    assert_eq!(
        sessions[0]["successUrl"],
        ctx.url(&format!("/checkout/success?order={FIRST_ORDER_ID}")).as_str()
    );
    assert_eq!(sessions[0]["cancelUrl"], ctx.url("/checkout/cancel").as_str());

    // Cancelling keeps the cart
    let resp = ctx.get("/checkout/cancel").await;
    assert_eq!(location(&resp), "/cart?notice=checkout-cancelled");
    let body = ctx.get_text("/cart?notice=checkout-cancelled").await;
    assert!(body.contains("Checkout was cancelled"));
    assert!(body.contains("Chef Knife"));

    // Success clears it
    let body = ctx
        .get_text(&format!("/checkout/success?order={FIRST_ORDER_ID}"))
        .await;
    assert!(body.contains(FIRST_ORDER_ID));
    assert_eq!(ctx.get_text("/cart/count").await.trim(), "0");
}
