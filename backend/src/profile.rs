use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{require_text, ApiError, ApiResult, AppJson};
use crate::models::{Profile, ProfileUpdate, Role, VerificationStatus};
use crate::AppState;

#[derive(Deserialize)]
pub struct VerificationRequest {
    pub document_url: Option<String>,
}

/// Loads the caller's profile, creating a customer profile on first access.
pub(crate) async fn current_profile(state: &AppState, user: &AuthUser) -> ApiResult<Profile> {
    if let Some(profile) = state.store.get_profile(user.id).await? {
        return Ok(profile);
    }
    log::info!("Creating profile for new user {}", user.id);
    let fresh = Profile::new_customer(user.id, user.email.clone(), Utc::now());
    Ok(state.store.ensure_profile(fresh).await?)
}

pub(crate) async fn require_admin(state: &AppState, user: &AuthUser) -> ApiResult<Profile> {
    let profile = current_profile(state, user).await?;
    if !profile.is_admin() {
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(profile)
}

pub async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Profile>> {
    Ok(Json(current_profile(&state, &user).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(mut update): AppJson<ProfileUpdate>,
) -> ApiResult<Json<Profile>> {
    let profile = current_profile(&state, &user).await?;

    if let Some(role) = update.role {
        if role == Role::Admin {
            return Err(ApiError::forbidden("The admin role cannot be self-assigned"));
        }
        if profile.is_admin() {
            return Err(ApiError::forbidden("Admins cannot change their own role"));
        }
        if role == profile.role {
            update.role = None;
        }
    }
    for field in [
        &mut update.full_name,
        &mut update.phone,
        &mut update.whatsapp,
        &mut update.avatar_url,
    ] {
        if let Some(value) = field.take() {
            *field = Some(value.trim().to_string());
        }
    }

    let updated = state.store.update_profile(profile.id, update).await?;
    log::info!("Updated profile {}", updated.id);
    Ok(Json(updated))
}

pub async fn submit_verification(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<VerificationRequest>,
) -> ApiResult<Json<Profile>> {
    let document_url = require_text(request.document_url, "document_url")?;
    let profile = current_profile(&state, &user).await?;

    if profile.role != Role::Owner {
        return Err(ApiError::forbidden("Only property owners can request verification"));
    }
    if profile.verification_status == VerificationStatus::Verified {
        return Err(ApiError::bad_request("Profile is already verified"));
    }

    let updated = state
        .store
        .submit_verification(profile.id, &document_url)
        .await?;
    log::info!("Owner {} submitted verification documents", updated.id);
    Ok(Json(updated))
}
