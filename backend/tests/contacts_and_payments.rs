mod common;

use axum::http::StatusCode;
use common::{empty_request, json_request, TestApp, JWT_SECRET};
use marketplace_backend::config::{AppConfig, AppEnv};
use marketplace_backend::gateway::payment_signature;
use marketplace_backend::models::{PropertyStatus, Role};
use marketplace_backend::store::MarketplaceStore;
use serde_json::json;

#[tokio::test]
async fn reveal_without_subscription_asks_for_one() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    let customer = app.user(Role::Customer).await;
    let property = app.listing(&owner, "Pune", 2_000_000, 2).await;

    let (status, body) = app
        .call(empty_request(
            "POST",
            &format!("/properties/{}/contact", property.id),
            Some(&customer.token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["requires_subscription"], true);
    assert!(body["error"].is_string());

    let (_, body) = app
        .call(empty_request("GET", "/subscription", Some(&customer.token)))
        .await;
    assert_eq!(body["active"], false);
}

#[tokio::test]
async fn repeat_reveal_does_not_consume_quota() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    let customer = app.user(Role::Customer).await;
    let property = app.listing(&owner, "Pune", 2_000_000, 2).await;
    let subscribed = app.subscribe(&customer, "basic").await;
    assert_eq!(subscribed["remaining_contacts"], 10);

    let uri = format!("/properties/{}/contact", property.id);
    let (status, first) = app
        .call(empty_request("POST", &uri, Some(&customer.token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["already_revealed"], false);
    assert_eq!(first["remaining_contacts"], 9);
    assert_eq!(first["contact"]["phone"], "+91 98765 43210");

    let (status, second) = app
        .call(empty_request("POST", &uri, Some(&customer.token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["already_revealed"], true);
    assert_eq!(second["remaining_contacts"], 9);
    assert_eq!(second["contact"], first["contact"]);

    let (_, body) = app
        .call(empty_request("GET", &format!("/properties/{}", property.id), None))
        .await;
    assert_eq!(body["contacts_count"], 1);

    let (_, reveals) = app
        .call(empty_request("GET", "/contacts", Some(&customer.token)))
        .await;
    assert_eq!(reveals.as_array().unwrap().len(), 1);

    let (_, notifications) = app
        .call(empty_request("GET", "/notifications", Some(&owner.token)))
        .await;
    let kinds: Vec<&str> = notifications
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["kind"].as_str())
        .collect();
    assert_eq!(kinds, vec!["contact_revealed"]);
}

#[tokio::test]
async fn paid_reveals_survive_the_listing_leaving_review() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    let customer = app.user(Role::Customer).await;
    let property = app.listing(&owner, "Pune", 2_000_000, 2).await;
    app.subscribe(&customer, "basic").await;

    let uri = format!("/properties/{}/contact", property.id);
    let (status, first) = app
        .call(empty_request("POST", &uri, Some(&customer.token)))
        .await;
    assert_eq!(status, StatusCode::OK);

    app.store
        .set_property_status(property.id, PropertyStatus::Rejected, Some("Blurry photos".to_string()))
        .await
        .unwrap();

    let (status, again) = app
        .call(empty_request("POST", &uri, Some(&customer.token)))
        .await;
    assert_eq!(status, StatusCode::OK, "{again}");
    assert_eq!(again["already_revealed"], true);
    assert_eq!(again["contact"], first["contact"]);
    assert_eq!(again["remaining_contacts"], 9);

    // Customers without a prior reveal still cannot see it.
    let other = app.user(Role::Customer).await;
    app.subscribe(&other, "basic").await;
    let (status, _) = app
        .call(empty_request("POST", &uri, Some(&other.token)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owners_see_their_own_contact_without_a_plan() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    let property = app
        .listing_with_status(&owner, "Pune", 2_000_000, 2, PropertyStatus::Pending)
        .await;

    let (status, body) = app
        .call(empty_request(
            "POST",
            &format!("/properties/{}/contact", property.id),
            Some(&owner.token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["already_revealed"], false);
    assert!(body["remaining_contacts"].is_null());
}

#[tokio::test]
async fn exhausted_quota_is_refused() {
    let app = TestApp::new();
    let owner = app.user(Role::Owner).await;
    let customer = app.user(Role::Customer).await;
    app.subscribe(&customer, "basic").await;

    for _ in 0..10 {
        let property = app.listing(&owner, "Pune", 2_000_000, 2).await;
        let (status, _) = app
            .call(empty_request(
                "POST",
                &format!("/properties/{}/contact", property.id),
                Some(&customer.token),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let extra = app.listing(&owner, "Pune", 2_000_000, 2).await;
    let (status, body) = app
        .call(empty_request(
            "POST",
            &format!("/properties/{}/contact", extra.id),
            Some(&customer.token),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["requires_subscription"], true);
    assert_eq!(body["error"], "Contact limit reached for your subscription");

    let (_, body) = app
        .call(empty_request("GET", "/subscription", Some(&customer.token)))
        .await;
    assert_eq!(body["active"], true);
    assert_eq!(body["remaining_contacts"], 0);
}

#[tokio::test]
async fn plans_are_public() {
    let app = TestApp::new();
    let (status, body) = app.call(empty_request("GET", "/plans", None)).await;
    assert_eq!(status, StatusCode::OK);
    let plans = body.as_array().unwrap();
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0]["plan"], "basic");
    assert_eq!(plans[0]["currency"], "INR");
}

fn signed_config() -> AppConfig {
    let mut config = AppConfig::local(JWT_SECRET);
    config.payment_test_mode = false;
    config.payment_key_id = Some("rzp_test_key".to_string());
    config.payment_key_secret = Some("gateway-secret".to_string());
    config
}

#[tokio::test]
async fn payment_verification_checks_the_signature() {
    let app = TestApp::with_config(signed_config());
    let customer = app.user(Role::Customer).await;

    let (status, order) = app
        .call(json_request(
            "POST",
            "/payments/orders",
            Some(&customer.token),
            json!({ "plan": "standard" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["amount"], 99_900);
    let order_id = order["order_id"].as_str().unwrap().to_string();

    // Test orders get no bypass once test mode is off.
    let (status, body) = app
        .call(json_request(
            "POST",
            "/payments/verify",
            Some(&customer.token),
            json!({ "order_id": order_id, "payment_id": "pay_1", "signature": "00ff" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid payment signature");

    let (status, _) = app
        .call(json_request(
            "POST",
            "/payments/verify",
            Some(&customer.token),
            json!({ "order_id": order_id, "payment_id": "pay_1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let signature = payment_signature("gateway-secret", &order_id, "pay_1").unwrap();
    let verify = json!({ "order_id": order_id, "payment_id": "pay_1", "signature": signature });
    let (status, first) = app
        .call(json_request("POST", "/payments/verify", Some(&customer.token), verify.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["active"], true);
    assert_eq!(first["subscription"]["plan"], "standard");
    assert_eq!(first["remaining_contacts"], 25);

    let (status, again) = app
        .call(json_request("POST", "/payments/verify", Some(&customer.token), verify))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["subscription"]["id"], first["subscription"]["id"]);
}

#[tokio::test]
async fn verify_without_gateway_secret_is_a_client_error() {
    let mut config = AppConfig::local(JWT_SECRET);
    config.app_env = AppEnv::Development;
    config.payment_test_mode = false;
    let app = TestApp::with_config(config);
    let customer = app.user(Role::Customer).await;

    let (status, order) = app
        .call(json_request(
            "POST",
            "/payments/orders",
            Some(&customer.token),
            json!({ "plan": "basic" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call(json_request(
            "POST",
            "/payments/verify",
            Some(&customer.token),
            json!({ "order_id": order["order_id"], "payment_id": "pay_1", "signature": "00ff" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Online payments are not configured on this server");
}

#[tokio::test]
async fn orders_belong_to_their_buyer() {
    let app = TestApp::new();
    let buyer = app.user(Role::Customer).await;
    let other = app.user(Role::Customer).await;

    let (_, order) = app
        .call(json_request(
            "POST",
            "/payments/orders",
            Some(&buyer.token),
            json!({ "plan": "premium" }),
        ))
        .await;

    let (status, _) = app
        .call(json_request(
            "POST",
            "/payments/verify",
            Some(&other.token),
            json!({ "order_id": order["order_id"] }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(json_request(
            "POST",
            "/payments/verify",
            Some(&buyer.token),
            json!({ "order_id": "order_unknown" }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call(json_request("POST", "/payments/verify", Some(&buyer.token), json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "order_id is required");

    let (status, _) = app
        .call(json_request("POST", "/payments/orders", Some(&buyer.token), json!({ "plan": "gold" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
