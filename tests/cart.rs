//! Cart behavior: eager totals, line ordering, clearing.

mod common;

use axum::http::StatusCode;
use rust_decimal_macros::dec;

use common::{as_decimal, TestApp};
use cybershop_api::entities::UserRole;

#[tokio::test]
async fn total_tracks_every_mutation() {
    let app = TestApp::spawn().await;
    let (_, token) = app.seed_user(UserRole::User).await;
    let (phone, _) = app.seed_product("Pixel 9", dec!(699.99), 10).await;
    let (case, _) = app.seed_product("Pixel 9 Case", dec!(29.99), 50).await;

    // First add.
    let (status, body) = app
        .post(
            "/api/v1/cart/items",
            Some(&token),
            serde_json::json!({ "product_id": phone.id, "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_decimal(&body["data"]["cart"]["total_price"]), dec!(699.99));

    // Second product.
    let (_, body) = app
        .post(
            "/api/v1/cart/items",
            Some(&token),
            serde_json::json!({ "product_id": case.id, "quantity": 2 }),
        )
        .await;
    assert_eq!(as_decimal(&body["data"]["cart"]["total_price"]), dec!(759.97));

    // Re-adding an existing product bumps its quantity.
    let (_, body) = app
        .post(
            "/api/v1/cart/items",
            Some(&token),
            serde_json::json!({ "product_id": phone.id, "quantity": 1 }),
        )
        .await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(as_decimal(&body["data"]["cart"]["total_price"]), dec!(1459.96));

    // Quantity update.
    let (_, body) = app
        .put(
            &format!("/api/v1/cart/items/{}", case.id),
            Some(&token),
            serde_json::json!({ "quantity": 1 }),
        )
        .await;
    assert_eq!(as_decimal(&body["data"]["cart"]["total_price"]), dec!(1429.97));

    // Removal.
    let (_, body) = app
        .delete(&format!("/api/v1/cart/items/{}", phone.id), Some(&token))
        .await;
    assert_eq!(as_decimal(&body["data"]["cart"]["total_price"]), dec!(29.99));
}

#[tokio::test]
async fn newest_line_comes_first() {
    let app = TestApp::spawn().await;
    let (_, token) = app.seed_user(UserRole::User).await;
    let (first, _) = app.seed_product("Galaxy S25", dec!(899.00), 5).await;
    let (second, _) = app.seed_product("Galaxy Buds", dec!(99.00), 5).await;

    app.post(
        "/api/v1/cart/items",
        Some(&token),
        serde_json::json!({ "product_id": first.id, "quantity": 1 }),
    )
    .await;
    let (_, body) = app
        .post(
            "/api/v1/cart/items",
            Some(&token),
            serde_json::json!({ "product_id": second.id, "quantity": 1 }),
        )
        .await;

    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items[0]["product_id"], second.id.to_string());
    assert_eq!(items[1]["product_id"], first.id.to_string());
}

#[tokio::test]
async fn discounted_price_is_captured_at_add_time() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.seed_user(UserRole::Admin).await;
    let (_, token) = app.seed_user(UserRole::User).await;

    let (_, created) = app
        .post(
            "/api/v1/products",
            Some(&admin),
            serde_json::json!({
                "title": "Moto G86",
                "description": "A well rounded phone with a bright display, dependable battery \
                                life, fast charging, and a camera that holds up in low light.",
                "base_price": "200.00",
                "category": "phones",
                "badge": "Great Value",
                "discount_percentage": 25,
            }),
        )
        .await;
    let product_id = created["data"]["id"].as_str().unwrap();

    let (_, body) = app
        .post(
            "/api/v1/cart/items",
            Some(&token),
            serde_json::json!({ "product_id": product_id, "quantity": 1 }),
        )
        .await;
    assert_eq!(as_decimal(&body["data"]["items"][0]["unit_price"]), dec!(150));
    assert_eq!(as_decimal(&body["data"]["cart"]["total_price"]), dec!(150));
}

#[tokio::test]
async fn clearing_an_empty_cart_is_not_found() {
    let app = TestApp::spawn().await;
    let (_, token) = app.seed_user(UserRole::User).await;
    let (product, _) = app.seed_product("OnePlus 13", dec!(549.00), 5).await;

    // Empty from the start.
    let (status, _) = app.delete("/api/v1/cart", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.post(
        "/api/v1/cart/items",
        Some(&token),
        serde_json::json!({ "product_id": product.id, "quantity": 1 }),
    )
    .await;

    let (status, body) = app.delete("/api/v1/cart", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_decimal(&body["data"]["total_price"]), dec!(0));

    // Second clear finds nothing to delete.
    let (status, _) = app.delete("/api/v1/cart", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_product_and_bad_quantity_are_rejected() {
    let app = TestApp::spawn().await;
    let (_, token) = app.seed_user(UserRole::User).await;
    let (product, _) = app.seed_product("Xperia 10", dec!(349.00), 5).await;

    let (status, _) = app
        .post(
            "/api/v1/cart/items",
            Some(&token),
            serde_json::json!({ "product_id": uuid::Uuid::new_v4(), "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/api/v1/cart/items",
            Some(&token),
            serde_json::json!({ "product_id": product.id, "quantity": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Updating a line that is not in the cart.
    let (status, _) = app
        .put(
            &format!("/api/v1/cart/items/{}", product.id),
            Some(&token),
            serde_json::json!({ "quantity": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
