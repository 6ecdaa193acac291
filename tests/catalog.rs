//! Catalog validation rules and public reads.

mod common;

use axum::http::StatusCode;
use rust_decimal_macros::dec;

use common::{as_decimal, TestApp};
use cybershop_api::entities::UserRole;

fn product_body(title: &str) -> serde_json::Value {
    serde_json::json!({
        "title": title,
        "description": "A well rounded phone with a bright display, dependable battery life, \
                        fast charging, and a camera that holds up in low light.",
        "base_price": "499.99",
        "category": "phones",
        "badge": "Best Seller",
        "discount_percentage": null,
    })
}

fn variant_body(color: &str, storage: &str) -> serde_json::Value {
    serde_json::json!({
        "brand": "Cyber",
        "storage": storage,
        "color": color,
        "additional_price": "0",
        "stock": 10,
        "images": ["https://img.test/a.jpg"],
        "screen_type": null,
        "cpu": null,
        "cores": null,
        "main_camera": null,
        "front_camera": null,
        "battery_capacity": null,
        "delivery_time": null,
        "guarantee": null,
    })
}

#[tokio::test]
async fn product_creation_enforces_field_rules() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.seed_user(UserRole::Admin).await;

    // Short description.
    let mut body = product_body("Pixel 9");
    body["description"] = serde_json::json!("Too short");
    let (status, _) = app.post("/api/v1/products", Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // One-word badge.
    let mut body = product_body("Pixel 9");
    body["badge"] = serde_json::json!("Hot");
    let (status, _) = app.post("/api/v1/products", Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Zero base price.
    let mut body = product_body("Pixel 9");
    body["base_price"] = serde_json::json!("0");
    let (status, _) = app.post("/api/v1/products", Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Valid payload goes through.
    let (status, created) = app
        .post("/api/v1/products", Some(&admin), product_body("Pixel 9"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["title"], "Pixel 9");

    // Duplicate title.
    let (status, _) = app
        .post("/api/v1/products", Some(&admin), product_body("Pixel 9"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn discount_produces_a_stored_discounted_price() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.seed_user(UserRole::Admin).await;

    let mut body = product_body("Moto Edge 60");
    body["discount_percentage"] = serde_json::json!(10);
    let (status, created) = app.post("/api/v1/products", Some(&admin), body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["discount_percentage"], 10);
    assert_eq!(as_decimal(&created["data"]["discounted_price"]), dec!(449.99));

    // Out-of-range discount.
    let mut body = product_body("Moto Edge 61");
    body["discount_percentage"] = serde_json::json!(100);
    let (status, _) = app.post("/api/v1/products", Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn variant_rules_and_case_insensitive_uniqueness() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.seed_user(UserRole::Admin).await;
    let (_, created) = app
        .post("/api/v1/products", Some(&admin), product_body("OnePlus 13"))
        .await;
    let product_id = created["data"]["id"].as_str().unwrap().to_string();
    let variants_path = format!("/api/v1/products/{}/variants", product_id);

    let (status, _) = app
        .post(&variants_path, Some(&admin), variant_body("Black", "256GB"))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Same color/storage differing only in case.
    let (status, _) = app
        .post(&variants_path, Some(&admin), variant_body("BLACK", "256gb"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Three-word storage.
    let (status, _) = app
        .post(&variants_path, Some(&admin), variant_body("Blue", "256 GB UFS"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Cores out of range.
    let mut body = variant_body("Blue", "512GB");
    body["cores"] = serde_json::json!(12);
    let (status, _) = app.post(&variants_path, Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Battery out of range.
    let mut body = variant_body("Blue", "512GB");
    body["battery_capacity"] = serde_json::json!(900);
    let (status, _) = app.post(&variants_path, Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No images.
    let mut body = variant_body("Blue", "512GB");
    body["images"] = serde_json::json!([]);
    let (status, _) = app.post(&variants_path, Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn catalog_reads_are_public_but_writes_are_admin_only() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.seed_user(UserRole::Admin).await;
    let (_, customer) = app.seed_user(UserRole::User).await;

    app.post("/api/v1/products", Some(&admin), product_body("Galaxy S25"))
        .await;

    // Anonymous listing works.
    let (status, body) = app.get("/api/v1/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Category filter.
    let (_, body) = app.get("/api/v1/products?category=tablets", None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    // Customers cannot create products.
    let (status, _) = app
        .post("/api/v1/products", Some(&customer), product_body("Nope"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_a_product_removes_its_variants() {
    let app = TestApp::spawn().await;
    let (_, admin) = app.seed_user(UserRole::Admin).await;
    let (product, variant) = app.seed_product("iQOO 13", dec!(549.00), 5).await;

    let (status, _) = app
        .delete(&format!("/api/v1/products/{}", product.id), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .get(&format!("/api/v1/products/{}", product.id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    use sea_orm::EntityTrait;
    let gone = cybershop_api::entities::ProductVariant::find_by_id(variant.id)
        .one(app.state.db.as_ref())
        .await
        .unwrap();
    assert!(gone.is_none());
}
