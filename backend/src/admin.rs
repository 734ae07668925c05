use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{require, ApiError, ApiResult, AppJson, AppQuery};
use crate::models::{Notification, Profile, Property, PropertyStatus, VerificationStatus};
use crate::notification::notify;
use crate::profile::require_admin;
use crate::store::{PropertyFilter, MAX_PAGE_SIZE};
use crate::AppState;

#[derive(Deserialize)]
pub struct VerificationDecision {
    pub approve: Option<bool>,
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub status: Option<PropertyStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct StatusChange {
    pub status: Option<PropertyStatus>,
    pub reason: Option<String>,
}

fn clean(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

pub async fn pending_verifications(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Profile>>> {
    require_admin(&state, &user).await?;
    let profiles = state
        .store
        .list_profiles_by_verification(VerificationStatus::Pending)
        .await?;
    Ok(Json(profiles))
}

pub async fn decide_verification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(profile_id): Path<Uuid>,
    AppJson(decision): AppJson<VerificationDecision>,
) -> ApiResult<Json<Profile>> {
    let admin = require_admin(&state, &user).await?;
    let approve = require(decision.approve, "approve")?;
    if state.store.get_profile(profile_id).await?.is_none() {
        return Err(ApiError::not_found("Profile not found"));
    }

    let status = if approve {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Rejected
    };
    let note = clean(decision.note);
    let profile = state
        .store
        .set_verification(profile_id, status, note.clone())
        .await?;
    log::info!("Admin {} marked profile {} {}", admin.id, profile_id, status);

    let body = match (approve, note) {
        (true, _) => "Your owner account is verified. You can now list properties.".to_string(),
        (false, Some(note)) => format!("Your verification was rejected: {note}"),
        (false, None) => "Your verification was rejected.".to_string(),
    };
    notify(
        state.store.as_ref(),
        Notification::new(profile_id, "verification_decided", "Verification update", body)
            .with_link("/profile"),
    )
    .await;

    Ok(Json(profile))
}

pub async fn list_properties(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<StatusQuery>,
) -> ApiResult<Json<Vec<Property>>> {
    require_admin(&state, &user).await?;
    let filter = PropertyFilter {
        status: Some(query.status.unwrap_or(PropertyStatus::Pending)),
        limit: query.limit.unwrap_or(MAX_PAGE_SIZE),
        offset: query.offset.unwrap_or_default(),
        ..Default::default()
    };
    Ok(Json(state.store.search_properties(&filter).await?))
}

pub async fn set_property_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(change): AppJson<StatusChange>,
) -> ApiResult<Json<Property>> {
    let admin = require_admin(&state, &user).await?;
    let status = require(change.status, "status")?;
    let reason = clean(change.reason);

    let property = state
        .store
        .set_property_status(id, status, reason.clone())
        .await?;
    log::info!("Admin {} set property {} to {}", admin.id, id, status);

    let body = match (status, reason) {
        (PropertyStatus::Rejected, Some(reason)) => {
            format!("\"{}\" was rejected: {}", property.title, reason)
        }
        _ => format!("\"{}\" is now {}", property.title, status),
    };
    notify(
        state.store.as_ref(),
        Notification::new(property.owner_id, "property_status", "Listing review", body)
            .with_link(format!("/properties/{}", property.id)),
    )
    .await;

    Ok(Json(property))
}
