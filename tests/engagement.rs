//! Wishlist, feedback, and offer endpoints.

mod common;

use axum::http::StatusCode;
use rust_decimal_macros::dec;

use common::TestApp;
use cybershop_api::entities::UserRole;

#[tokio::test]
async fn wishlist_rejects_duplicates_and_unknown_products() {
    let app = TestApp::spawn().await;
    let (_, token) = app.seed_user(UserRole::User).await;
    let (product, _) = app.seed_product("Pixel 9", dec!(699.99), 5).await;

    let add = serde_json::json!({ "product_id": product.id });
    let (status, _) = app.post("/api/v1/wishlist", Some(&token), add.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.post("/api/v1/wishlist", Some(&token), add).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post(
            "/api/v1/wishlist",
            Some(&token),
            serde_json::json!({ "product_id": uuid::Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/v1/wishlist", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product"]["title"], "Pixel 9");

    let (status, _) = app
        .delete(&format!("/api/v1/wishlist/{}", product.id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .delete(&format!("/api/v1/wishlist/{}", product.id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feedback_is_validated_and_listed_with_authors() {
    let app = TestApp::spawn().await;
    let (_, token) = app.seed_user(UserRole::User).await;
    let (product, _) = app.seed_product("Galaxy S25", dec!(899.00), 5).await;

    // Description too short.
    let (status, _) = app
        .post(
            "/api/v1/feedback",
            Some(&token),
            serde_json::json!({
                "product_id": product.id,
                "description": "Nice",
                "rating": 5,
                "images": [],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rating out of range.
    let (status, _) = app
        .post(
            "/api/v1/feedback",
            Some(&token),
            serde_json::json!({
                "product_id": product.id,
                "description": "Really impressive phone for the price point.",
                "rating": 6,
                "images": [],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Too many images.
    let (status, _) = app
        .post(
            "/api/v1/feedback",
            Some(&token),
            serde_json::json!({
                "product_id": product.id,
                "description": "Really impressive phone for the price point.",
                "rating": 5,
                "images": ["a", "b", "c", "d", "e", "f"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = app
        .post(
            "/api/v1/feedback",
            Some(&token),
            serde_json::json!({
                "product_id": product.id,
                "description": "Really impressive phone for the price point.",
                "rating": 5,
                "images": ["https://img.test/unboxing.jpg"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let feedback_id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .get(&format!("/api/v1/products/{}/feedback", product.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["feedback"]["rating"], 5);
    assert_eq!(rows[0]["user"]["fullname"], "Asha Rao");

    // Only the author (or an admin) may delete.
    let (_, stranger) = app.seed_user(UserRole::User).await;
    let (status, _) = app
        .delete(&format!("/api/v1/feedback/{}", feedback_id), Some(&stranger))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .delete(&format!("/api/v1/feedback/{}", feedback_id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn offers_are_public_to_read_and_admin_to_manage() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.seed_user(UserRole::Admin).await;
    let (_, customer) = app.seed_user(UserRole::User).await;

    let (status, _) = app
        .post(
            "/api/v1/offers",
            Some(&customer),
            serde_json::json!({ "offer_image": "https://img.test/sale.jpg" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .post(
            "/api/v1/offers",
            Some(&admin),
            serde_json::json!({ "offer_image": "https://img.test/sale.jpg" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let offer_id = created["data"]["id"].as_str().unwrap().to_string();

    // Blank image rejected.
    let (status, _) = app
        .post(
            "/api/v1/offers",
            Some(&admin),
            serde_json::json!({ "offer_image": "  " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/v1/offers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .delete(&format!("/api/v1/offers/{}", offer_id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .delete(&format!("/api/v1/offers/{}", offer_id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
