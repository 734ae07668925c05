#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use marketplace_backend::auth::create_token;
use marketplace_backend::config::AppConfig;
use marketplace_backend::gateway::TestGateway;
use marketplace_backend::models::{ListingType, Profile, Property, PropertyStatus, Role};
use marketplace_backend::store::memory::InMemoryStore;
use marketplace_backend::store::MarketplaceStore;
use marketplace_backend::{build_router, AppState};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::local(JWT_SECRET))
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = AppState::new(config, store.clone(), Arc::new(TestGateway));
        Self {
            router: build_router(state),
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.expect("request")
    }

    /// Sends the request and decodes the JSON body (`Null` when empty).
    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        (status, read_json(response).await)
    }

    pub async fn user(&self, role: Role) -> TestUser {
        let id = Uuid::new_v4();
        let email = format!("{}@example.com", id.simple());
        let mut profile = Profile::new_customer(id, Some(email.clone()), Utc::now());
        profile.role = role;
        profile.full_name = Some(format!("{role} user"));
        profile.phone = Some("+91 98765 43210".to_string());
        self.store.ensure_profile(profile).await.expect("profile");
        TestUser {
            id,
            token: create_token(id, Some(&email), JWT_SECRET).expect("token"),
        }
    }

    /// A signed-in user who has never been seen before, so has no profile yet.
    pub fn newcomer(&self) -> TestUser {
        let id = Uuid::new_v4();
        let email = format!("{}@example.com", id.simple());
        TestUser {
            id,
            token: create_token(id, Some(&email), JWT_SECRET).expect("token"),
        }
    }

    pub async fn listing(&self, owner: &TestUser, city: &str, price: i64, bedrooms: i32) -> Property {
        self.listing_with_status(owner, city, price, bedrooms, PropertyStatus::Approved)
            .await
    }

    pub async fn listing_with_status(
        &self,
        owner: &TestUser,
        city: &str,
        price: i64,
        bedrooms: i32,
        status: PropertyStatus,
    ) -> Property {
        let now = Utc::now();
        let property = Property {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            title: format!("{bedrooms} BHK apartment in {city}"),
            description: "Sunny corner flat".to_string(),
            property_type: "apartment".to_string(),
            listing_type: ListingType::Sale,
            price,
            city: city.to_string(),
            locality: Some("Central".to_string()),
            address: None,
            bedrooms,
            bathrooms: 1,
            area_sqft: Some(900),
            amenities: vec!["parking".to_string()],
            images: vec![],
            status,
            rejection_reason: None,
            favorites_count: 0,
            contacts_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.create_property(property).await.expect("property")
    }

    /// Buys `plan` through the test-order bypass.
    pub async fn subscribe(&self, user: &TestUser, plan: &str) -> Value {
        let (status, order) = self
            .call(json_request(
                "POST",
                "/payments/orders",
                Some(&user.token),
                serde_json::json!({ "plan": plan }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        let (status, body) = self
            .call(json_request(
                "POST",
                "/payments/verify",
                Some(&user.token),
                serde_json::json!({ "order_id": order["order_id"] }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("body")))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json body")
}
