use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{require, ApiError, ApiResult, AppJson};
use crate::models::{Favorite, Property, PropertyCounter};
use crate::profile::current_profile;
use crate::AppState;

#[derive(Deserialize)]
pub struct FavoriteRequest {
    pub property_id: Option<Uuid>,
}

async fn bump_favorites(state: &AppState, property_id: Uuid, delta: i32) {
    if let Err(err) = state
        .store
        .bump_property_counter(property_id, PropertyCounter::Favorites, delta)
        .await
    {
        log::warn!("Failed to adjust favorite count on {}: {}", property_id, err);
    }
}

pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Property>>> {
    Ok(Json(state.store.list_favorite_properties(user.id).await?))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<FavoriteRequest>,
) -> ApiResult<StatusCode> {
    let property_id = require(request.property_id, "property_id")?;
    if state.store.get_property(property_id).await?.is_none() {
        return Err(ApiError::not_found("Property not found"));
    }
    let profile = current_profile(&state, &user).await?;

    let favorite = Favorite {
        user_id: profile.id,
        property_id,
        created_at: Utc::now(),
    };
    if state.store.add_favorite(favorite).await? {
        bump_favorites(&state, property_id, 1).await;
        return Ok(StatusCode::CREATED);
    }
    Ok(StatusCode::OK)
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(property_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.store.remove_favorite(user.id, property_id).await? {
        bump_favorites(&state, property_id, -1).await;
    }
    Ok(StatusCode::NO_CONTENT)
}
