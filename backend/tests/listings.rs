mod common;

use axum::http::StatusCode;
use common::{empty_request, json_request, TestApp};
use marketplace_backend::models::{PropertyStatus, Role};
use serde_json::json;

#[tokio::test]
async fn health_reports_the_store_backend() {
    let app = TestApp::new();
    let (status, body) = app.call(empty_request("GET", "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = TestApp::new();

    let (status, body) = app.call(empty_request("GET", "/profile", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing Authorization header");

    let (status, _) = app
        .call(empty_request("GET", "/profile", Some("not-a-jwt")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_is_created_on_first_access_and_cannot_self_promote() {
    let app = TestApp::new();
    let id = uuid::Uuid::new_v4();
    let token =
        marketplace_backend::auth::create_token(id, Some("new@example.com"), common::JWT_SECRET)
            .unwrap();

    let (status, body) = app.call(empty_request("GET", "/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "customer");
    assert_eq!(body["email"], "new@example.com");

    let (status, _) = app
        .call(json_request("PATCH", "/profile", Some(&token), json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(json_request(
            "PATCH",
            "/profile",
            Some(&token),
            json!({ "role": "owner", "full_name": "  Asha Rao " }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "owner");
    assert_eq!(body["full_name"], "Asha Rao");
}

#[tokio::test]
async fn search_applies_every_predicate() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    let hit = app.listing(&owner, "Pune", 2_000_000, 2).await;
    app.listing(&owner, "Pune", 1_500_000, 1).await;
    app.listing(&owner, "Mumbai", 2_000_000, 3).await;
    app.listing(&owner, "Pune", 2_600_000, 3).await;
    app.listing_with_status(&owner, "Pune", 2_000_000, 2, PropertyStatus::Pending)
        .await;

    let (status, body) = app
        .call(empty_request(
            "GET",
            "/properties?city=pune&min_price=1000000&max_price=2500000&bedrooms=2&listing_type=sale",
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["properties"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], hit.id.to_string());
    assert_eq!(body["limit"], 20);

    let (status, body) = app
        .call(empty_request("GET", "/properties?min_price=10&max_price=5", None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn search_sorts_by_price() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    app.listing(&owner, "Pune", 3_000_000, 2).await;
    app.listing(&owner, "Pune", 1_000_000, 2).await;
    app.listing(&owner, "Pune", 2_000_000, 2).await;

    let (_, body) = app
        .call(empty_request("GET", "/properties?sort=price_asc&limit=2", None))
        .await;
    let prices: Vec<i64> = body["properties"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["price"].as_i64().unwrap())
        .collect();
    assert_eq!(prices, vec![1_000_000, 2_000_000]);
}

#[tokio::test]
async fn unapproved_listings_are_hidden_from_the_public() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    let pending = app
        .listing_with_status(&owner, "Pune", 2_000_000, 2, PropertyStatus::Pending)
        .await;
    let uri = format!("/properties/{}", pending.id);

    let (status, _) = app.call(empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let stranger = app.user(Role::Customer).await;
    let (status, _) = app.call(empty_request("GET", &uri, Some(&stranger.token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.call(empty_request("GET", &uri, Some(&owner.token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");

    let (_, body) = app
        .call(empty_request("GET", "/properties/mine", Some(&owner.token)))
        .await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn only_owners_create_listings_and_they_start_pending() {
    let app = TestApp::new();
    let customer = app.user(Role::Customer).await;
    let owner = app.user(Role::Owner).await;
    let listing = json!({
        "title": "Lake view villa",
        "property_type": "villa",
        "listing_type": "sale",
        "price": 9_500_000,
        "city": "Udaipur",
        "bedrooms": 4
    });

    let (status, _) = app
        .call(json_request("POST", "/properties", Some(&customer.token), listing.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(json_request(
            "POST",
            "/properties",
            Some(&owner.token),
            json!({ "title": "  ", "property_type": "villa", "listing_type": "sale", "price": 1, "city": "Udaipur" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "title is required");

    let (status, body) = app
        .call(json_request(
            "POST",
            "/properties",
            Some(&owner.token),
            json!({ "title": "Shed", "property_type": "plot", "listing_type": "rent", "price": 0, "city": "Udaipur" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "price must be positive");

    let (status, body) = app
        .call(json_request("POST", "/properties", Some(&owner.token), listing))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["owner_id"], owner.id.to_string());
}

#[tokio::test]
async fn listings_are_edited_only_by_their_owner() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    let other_owner = app.user(Role::Owner).await;
    let property = app.listing(&owner, "Pune", 2_000_000, 2).await;
    let uri = format!("/properties/{}", property.id);

    let (status, _) = app
        .call(json_request("PATCH", &uri, Some(&other_owner.token), json!({ "price": 1 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(json_request("PATCH", &uri, Some(&owner.token), json!({ "price": 2_100_000 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 2_100_000);

    let (status, _) = app.call(empty_request("DELETE", &uri, Some(&other_owner.token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(empty_request("DELETE", &uri, Some(&owner.token))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorites_are_idempotent_and_keep_the_counter_honest() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    let customer = app.user(Role::Customer).await;
    let property = app.listing(&owner, "Pune", 2_000_000, 2).await;
    let add = json!({ "property_id": property.id });

    let (status, _) = app
        .call(json_request("POST", "/favorites", Some(&customer.token), add.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app
        .call(json_request("POST", "/favorites", Some(&customer.token), add))
        .await;
    assert_eq!(status, StatusCode::OK);

    let detail = format!("/properties/{}", property.id);
    let (_, body) = app.call(empty_request("GET", &detail, None)).await;
    assert_eq!(body["favorites_count"], 1);

    let (_, body) = app
        .call(empty_request("GET", "/favorites", Some(&customer.token)))
        .await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let remove = format!("/favorites/{}", property.id);
    for _ in 0..2 {
        let (status, _) = app
            .call(empty_request("DELETE", &remove, Some(&customer.token)))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
    let (_, body) = app.call(empty_request("GET", &detail, None)).await;
    assert_eq!(body["favorites_count"], 0);

    let (status, _) = app
        .call(json_request(
            "POST",
            "/favorites",
            Some(&customer.token),
            json!({ "property_id": uuid::Uuid::new_v4() }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
