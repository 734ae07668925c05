use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{require, ApiError, ApiResult, AppJson, AppQuery};
use crate::models::{Notification, PropertyStatus, VisitActor, VisitRequest, VisitStatus};
use crate::notification::notify;
use crate::profile::current_profile;
use crate::AppState;

const MAX_NOTE_LEN: usize = 1000;

#[derive(Deserialize)]
pub struct NewVisitRequest {
    pub property_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitSide {
    #[default]
    Customer,
    Owner,
}

#[derive(Deserialize)]
pub struct VisitListQuery {
    #[serde(rename = "as", default)]
    pub side: VisitSide,
}

#[derive(Deserialize)]
pub struct VisitUpdate {
    pub status: Option<VisitStatus>,
    pub owner_note: Option<String>,
}

fn trimmed_note(value: Option<String>, field: &str) -> ApiResult<Option<String>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let value = value.trim();
    if value.chars().count() > MAX_NOTE_LEN {
        return Err(ApiError::BadRequest(format!(
            "{field} must be at most {MAX_NOTE_LEN} characters"
        )));
    }
    Ok((!value.is_empty()).then(|| value.to_string()))
}

pub async fn create_visit(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<NewVisitRequest>,
) -> ApiResult<(StatusCode, Json<VisitRequest>)> {
    let property_id = require(request.property_id, "property_id")?;
    let scheduled_at = require(request.scheduled_at, "scheduled_at")?;
    let message = trimmed_note(request.message, "message")?;

    let property = state
        .store
        .get_property(property_id)
        .await?
        .filter(|p| p.status == PropertyStatus::Approved)
        .ok_or_else(|| ApiError::not_found("Property not found"))?;
    if property.owner_id == user.id {
        return Err(ApiError::bad_request("You cannot request a visit to your own listing"));
    }
    let now = Utc::now();
    if scheduled_at <= now {
        return Err(ApiError::bad_request("scheduled_at must be in the future"));
    }
    let customer = current_profile(&state, &user).await?;

    let visit = VisitRequest {
        id: Uuid::new_v4(),
        property_id,
        customer_id: customer.id,
        owner_id: property.owner_id,
        scheduled_at,
        message,
        owner_note: None,
        status: VisitStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    let visit = state.store.create_visit(visit).await?;
    log::info!("Visit {} requested for property {}", visit.id, property_id);

    notify(
        state.store.as_ref(),
        Notification::new(
            property.owner_id,
            "visit_requested",
            "New visit request",
            format!(
                "A visit to \"{}\" was requested for {}",
                property.title,
                scheduled_at.format("%Y-%m-%d %H:%M UTC")
            ),
        )
        .with_link("/visits?as=owner"),
    )
    .await;

    Ok((StatusCode::CREATED, Json(visit)))
}

pub async fn list_visits(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<VisitListQuery>,
) -> ApiResult<Json<Vec<VisitRequest>>> {
    let visits = match query.side {
        VisitSide::Customer => state.store.list_visits_by_customer(user.id).await?,
        VisitSide::Owner => state.store.list_visits_by_owner(user.id).await?,
    };
    Ok(Json(visits))
}

pub async fn update_visit(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(update): AppJson<VisitUpdate>,
) -> ApiResult<Json<VisitRequest>> {
    let next = require(update.status, "status")?;
    let visit = state
        .store
        .get_visit(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Visit request not found"))?;

    let actor = if visit.owner_id == user.id {
        VisitActor::Owner
    } else if visit.customer_id == user.id {
        VisitActor::Customer
    } else {
        return Err(ApiError::forbidden("You are not part of this visit request"));
    };
    if !visit.status.can_transition(next, actor) {
        return Err(ApiError::BadRequest(format!(
            "Cannot change a {} visit to {}",
            visit.status, next
        )));
    }
    let owner_note = match actor {
        VisitActor::Owner => trimmed_note(update.owner_note, "owner_note")?,
        VisitActor::Customer if update.owner_note.is_some() => {
            return Err(ApiError::forbidden("Only the owner can leave a note"));
        }
        VisitActor::Customer => None,
    };

    let updated = state
        .store
        .transition_visit(id, visit.status, next, owner_note)
        .await?
        .ok_or_else(|| ApiError::bad_request("Visit request was updated by someone else"))?;
    log::info!("Visit {} moved {} -> {}", id, visit.status, next);

    let recipient = match actor {
        VisitActor::Owner => updated.customer_id,
        VisitActor::Customer => updated.owner_id,
    };
    notify(
        state.store.as_ref(),
        Notification::new(
            recipient,
            "visit_updated",
            format!("Visit request {}", next),
            format!(
                "A visit scheduled for {} is now {}",
                updated.scheduled_at.format("%Y-%m-%d %H:%M UTC"),
                next
            ),
        )
        .with_link("/visits"),
    )
    .await;

    Ok(Json(updated))
}
