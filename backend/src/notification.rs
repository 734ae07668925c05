use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::Notification;
use crate::store::MarketplaceStore;
use crate::AppState;

/// Best-effort delivery: a failed insert is logged and does not fail the caller.
pub(crate) async fn notify(store: &dyn MarketplaceStore, notification: Notification) {
    let user_id = notification.user_id;
    let kind = notification.kind.clone();
    if let Err(err) = store.insert_notification(notification).await {
        log::warn!("Failed to store {} notification for {}: {}", kind, user_id, err);
    }
}

pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(state.store.list_notifications(user.id).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.store.mark_notification_read(id, user.id).await? {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Value>> {
    let updated = state.store.mark_all_notifications_read(user.id).await?;
    Ok(Json(json!({ "updated": updated })))
}
