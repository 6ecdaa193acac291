//! OTP login flow, profile, and the address book.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use common::TestApp;
use cybershop_api::entities::{otp_code, OtpCode, UserRole};

async fn issued_code(app: &TestApp, phone: &str) -> String {
    OtpCode::find()
        .filter(otp_code::Column::Phone.eq(phone))
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .expect("no OTP issued")
        .code
}

#[tokio::test]
async fn otp_flow_creates_account_and_issues_usable_token() {
    let app = TestApp::spawn().await;
    let phone = "9876543210";

    let (status, _) = app
        .post(
            "/api/v1/auth/otp/request",
            None,
            serde_json::json!({ "phone": phone, "fullname": "Ravi Kumar", "email": null }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let code = issued_code(&app, phone).await;
    let (status, body) = app
        .post(
            "/api/v1/auth/otp/verify",
            None,
            serde_json::json!({ "phone": phone, "code": code }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["fullname"], "Ravi Kumar");
    assert_eq!(body["data"]["user"]["role"], "user");
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], phone);
    assert_eq!(body["data"]["is_logged_in"], true);
}

#[tokio::test]
async fn invalid_and_expired_codes_are_rejected() {
    let app = TestApp::spawn().await;
    let phone = "9123456780";

    app.post(
        "/api/v1/auth/otp/request",
        None,
        serde_json::json!({ "phone": phone, "fullname": null, "email": null }),
    )
    .await;

    // Wrong code.
    let (status, _) = app
        .post(
            "/api/v1/auth/otp/verify",
            None,
            serde_json::json!({ "phone": phone, "code": "000000" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Force the stored code past its expiry.
    let row = OtpCode::find()
        .filter(otp_code::Column::Phone.eq(phone))
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let code = row.code.clone();
    let mut stale: otp_code::ActiveModel = row.into();
    stale.expires_at = Set(Utc::now() - Duration::minutes(1));
    stale.update(app.state.db.as_ref()).await.unwrap();

    let (status, _) = app
        .post(
            "/api/v1/auth/otp/verify",
            None,
            serde_json::json!({ "phone": phone, "code": code }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn phone_must_be_exactly_ten_digits() {
    let app = TestApp::spawn().await;

    let (status, _) = app
        .post(
            "/api/v1/auth/otp/request",
            None,
            serde_json::json!({ "phone": "12345", "fullname": null, "email": null }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verifying_twice_with_the_same_code_fails() {
    let app = TestApp::spawn().await;
    let phone = "9988776655";

    app.post(
        "/api/v1/auth/otp/request",
        None,
        serde_json::json!({ "phone": phone, "fullname": null, "email": null }),
    )
    .await;
    let code = issued_code(&app, phone).await;

    let verify = serde_json::json!({ "phone": phone, "code": code });
    let (status, _) = app
        .post("/api/v1/auth/otp/verify", None, verify.clone())
        .await;
    assert_eq!(status, StatusCode::OK);

    // Codes are single use.
    let (status, _) = app.post("/api/v1/auth/otp/verify", None, verify).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn address_landmarks_are_unique_per_user_ignoring_case() {
    let app = TestApp::spawn().await;
    let (_, token) = app.seed_user(UserRole::User).await;

    let address = serde_json::json!({
        "street": "12 MG Road",
        "city": "Bengaluru",
        "land_mark": "Opposite metro",
        "state": "Karnataka",
        "country": "India",
        "zip_code": "560001",
        "address_type": "Home",
    });

    let (status, _) = app
        .post("/api/v1/users/me/addresses", Some(&token), address.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut dup = address.clone();
    dup["land_mark"] = serde_json::json!("OPPOSITE METRO");
    let (status, _) = app
        .post("/api/v1/users/me/addresses", Some(&token), dup)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A different user may reuse the landmark.
    let (_, other_token) = app.seed_user(UserRole::User).await;
    let (status, _) = app
        .post("/api/v1/users/me/addresses", Some(&other_token), address)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn address_update_is_partial_and_keeps_landmarks_unique() {
    let app = TestApp::spawn().await;
    let (_, token) = app.seed_user(UserRole::User).await;

    let mut address = serde_json::json!({
        "street": "12 MG Road",
        "city": "Bengaluru",
        "land_mark": "Opposite metro",
        "state": "Karnataka",
        "country": "India",
        "zip_code": "560001",
        "address_type": "Home",
    });
    let (_, first) = app
        .post("/api/v1/users/me/addresses", Some(&token), address.clone())
        .await;
    let first_id = first["data"]["id"].as_str().unwrap().to_string();

    address["land_mark"] = serde_json::json!("Near park");
    app.post("/api/v1/users/me/addresses", Some(&token), address)
        .await;

    // Empty patch.
    let (status, _) = app
        .put(
            &format!("/api/v1/users/me/addresses/{}", first_id),
            Some(&token),
            serde_json::json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Landmark colliding with the other address, case insensitively.
    let (status, _) = app
        .put(
            &format!("/api/v1/users/me/addresses/{}", first_id),
            Some(&token),
            serde_json::json!({ "land_mark": "NEAR PARK" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Partial update leaves the untouched fields alone.
    let (status, body) = app
        .put(
            &format!("/api/v1/users/me/addresses/{}", first_id),
            Some(&token),
            serde_json::json!({ "street": "14 MG Road", "address_type": "Work" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["street"], "14 MG Road");
    assert_eq!(body["data"]["address_type"], "Work");
    assert_eq!(body["data"]["city"], "Bengaluru");

    // Unknown address id.
    let (status, _) = app
        .put(
            &format!("/api/v1/users/me/addresses/{}", uuid::Uuid::new_v4()),
            Some(&token),
            serde_json::json!({ "city": "Mysuru" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_update_requires_a_field_and_logout_clears_the_flag() {
    let app = TestApp::spawn().await;
    let (_, token) = app.seed_user(UserRole::User).await;

    let (status, _) = app
        .put("/api/v1/users/me", Some(&token), serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(
            "/api/v1/users/me",
            Some(&token),
            serde_json::json!({ "fullname": "Asha R." }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fullname"], "Asha R.");

    let (status, _) = app.request(axum::http::Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(body["data"]["is_logged_in"], false);
}
