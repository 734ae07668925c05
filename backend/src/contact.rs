use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    ContactReveal, Notification, Profile, PropertyCounter, PropertyStatus, RevealOutcome,
};
use crate::notification::notify;
use crate::profile::current_profile;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OwnerContact {
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub whatsapp: Option<String>,
}

impl From<&ContactReveal> for OwnerContact {
    fn from(reveal: &ContactReveal) -> Self {
        Self {
            owner_name: reveal.owner_name.clone(),
            phone: reveal.phone.clone(),
            email: reveal.email.clone(),
            whatsapp: reveal.whatsapp.clone(),
        }
    }
}

impl From<&Profile> for OwnerContact {
    fn from(owner: &Profile) -> Self {
        Self {
            owner_name: owner.full_name.clone(),
            phone: owner.phone.clone(),
            email: owner.email.clone(),
            whatsapp: owner.whatsapp.clone(),
        }
    }
}

fn contact_body(contact: OwnerContact, already_revealed: bool, remaining: Option<i32>) -> Json<Value> {
    Json(json!({
        "contact": contact,
        "already_revealed": already_revealed,
        "remaining_contacts": remaining,
    }))
}

async fn already_revealed(
    state: &AppState,
    viewer_id: Uuid,
    existing: &ContactReveal,
    now: DateTime<Utc>,
) -> ApiResult<Json<Value>> {
    let remaining = state
        .store
        .active_subscription(viewer_id, now)
        .await?
        .map(|s| s.remaining());
    Ok(contact_body(OwnerContact::from(existing), true, remaining))
}

pub async fn reveal_contact(
    State(state): State<AppState>,
    user: AuthUser,
    Path(property_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let property = state
        .store
        .get_property(property_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;
    let viewer = current_profile(&state, &user).await?;
    let owner = state
        .store
        .get_profile(property.owner_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Property owner not found"))?;

    if viewer.id == owner.id || viewer.is_admin() {
        return Ok(contact_body(OwnerContact::from(&owner), false, None));
    }

    let now = Utc::now();
    // A paid reveal stays readable even after the listing leaves review.
    if let Some(existing) = state.store.find_reveal(viewer.id, property.id).await? {
        return already_revealed(&state, viewer.id, &existing, now).await;
    }
    if property.status != PropertyStatus::Approved {
        return Err(ApiError::not_found("Property not found"));
    }

    let reveal = ContactReveal::snapshot(viewer.id, property.id, &owner, now);
    match state.store.reveal_contact(reveal, now).await? {
        RevealOutcome::AlreadyRevealed(existing) => {
            already_revealed(&state, viewer.id, &existing, now).await
        }
        RevealOutcome::Granted {
            reveal,
            subscription,
        } => {
            log::info!(
                "Customer {} revealed contact for property {} ({} left on {})",
                viewer.id,
                property.id,
                subscription.remaining(),
                subscription.plan
            );
            if let Err(err) = state
                .store
                .bump_property_counter(property.id, PropertyCounter::Contacts, 1)
                .await
            {
                log::warn!("Failed to bump contact count on {}: {}", property.id, err);
            }
            notify(
                state.store.as_ref(),
                Notification::new(
                    owner.id,
                    "contact_revealed",
                    "A customer viewed your contact details",
                    format!("Someone is interested in \"{}\"", property.title),
                )
                .with_link(format!("/properties/{}", property.id)),
            )
            .await;
            Ok(contact_body(
                OwnerContact::from(&reveal),
                false,
                Some(subscription.remaining()),
            ))
        }
        RevealOutcome::NoActiveSubscription => Err(ApiError::SubscriptionRequired(
            "An active subscription is required to view owner contacts".to_string(),
        )),
        RevealOutcome::QuotaExhausted => Err(ApiError::SubscriptionRequired(
            "Contact limit reached for your subscription".to_string(),
        )),
    }
}

pub async fn list_reveals(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<ContactReveal>>> {
    Ok(Json(state.store.list_reveals(user.id).await?))
}
