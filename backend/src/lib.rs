use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub mod admin;
pub mod auth;
pub mod chat;
pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod favorite;
pub mod gateway;
pub mod models;
pub mod notification;
pub mod payment;
pub mod profile;
pub mod property;
pub mod realtime;
pub mod schema;
pub mod store;
pub mod upload;
pub mod visit;

use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::gateway::PaymentGateway;
use crate::realtime::ChatHub;
use crate::store::MarketplaceStore;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn MarketplaceStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub hub: ChatHub,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn MarketplaceStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            gateway,
            hub: ChatHub::new(),
        }
    }
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.store.health_check().await?;
    Ok(Json(json!({
        "status": "ok",
        "store": state.store.backend_name(),
    })))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    log::info!(
        "{} {} -> {} ({:?})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match config.cors_origin.as_deref() {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(origin) => base.allow_origin(origin),
            Err(_) => {
                log::warn!("Ignoring invalid CORS_ORIGIN {:?}", origin);
                base
            }
        },
        None => base.allow_origin(Any),
    }
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health))
        .route("/plans", get(payment::list_plans))
        .route(
            "/profile",
            get(profile::get_profile).patch(profile::update_profile),
        )
        .route("/profile/verification", post(profile::submit_verification))
        .route(
            "/properties",
            get(property::search_properties).post(property::create_property),
        )
        .route("/properties/mine", get(property::my_properties))
        .route(
            "/properties/:id",
            get(property::get_property)
                .patch(property::update_property)
                .delete(property::delete_property),
        )
        .route("/properties/:id/contact", post(contact::reveal_contact))
        .route("/contacts", get(contact::list_reveals))
        .route(
            "/favorites",
            get(favorite::list_favorites).post(favorite::add_favorite),
        )
        .route("/favorites/:property_id", delete(favorite::remove_favorite))
        .route("/visits", get(visit::list_visits).post(visit::create_visit))
        .route("/visits/:id", patch(visit::update_visit))
        .route("/chats", get(chat::list_chats).post(chat::start_chat))
        .route(
            "/chats/:id/messages",
            get(chat::list_messages).post(chat::send_message),
        )
        .route("/chats/:id/read", post(chat::mark_read))
        .route("/chats/:id/live", get(chat::live))
        .route("/payments/orders", post(payment::create_order))
        .route("/payments/verify", post(payment::verify_payment))
        .route("/subscription", get(payment::current_subscription))
        .route("/admin/verifications", get(admin::pending_verifications))
        .route(
            "/admin/verifications/:profile_id",
            post(admin::decide_verification),
        )
        .route("/admin/properties", get(admin::list_properties))
        .route("/admin/properties/:id", patch(admin::set_property_status))
        .route(
            "/uploads",
            post(upload::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/notifications", get(notification::list_notifications))
        .route("/notifications/read-all", post(notification::mark_all_read))
        .route("/notifications/:id/read", post(notification::mark_read))
        .nest_service("/files", ServeDir::new(&state.config.upload_dir))
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        .layer(middleware::from_fn(log_requests))
        .layer(cors_layer(&state.config))
        .with_state(state)
}
