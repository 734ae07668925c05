use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{require, require_text, ApiError, ApiResult, AppJson, AppQuery};
use crate::models::{ListingType, Profile, Property, PropertyStatus, PropertyUpdate, Role};
use crate::profile::current_profile;
use crate::store::{PropertyFilter, PropertySort};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub listing_type: Option<ListingType>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub bedrooms: Option<i32>,
    pub q: Option<String>,
    pub sort: Option<PropertySort>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Honored for admins only.
    pub status: Option<PropertyStatus>,
}

#[derive(Debug, Deserialize)]
pub struct NewPropertyRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    pub property_type: Option<String>,
    pub listing_type: Option<ListingType>,
    pub price: Option<i64>,
    pub city: Option<String>,
    pub locality: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub bedrooms: i32,
    #[serde(default)]
    pub bathrooms: i32,
    pub area_sqft: Option<i32>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn search_filter(query: SearchQuery, viewer: Option<&Profile>) -> ApiResult<PropertyFilter> {
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(ApiError::bad_request("min_price cannot exceed max_price"));
        }
    }
    let is_admin = viewer.is_some_and(Profile::is_admin);
    let status = match query.status {
        Some(status) if is_admin => Some(status),
        _ => Some(PropertyStatus::Approved),
    };
    Ok(PropertyFilter {
        status,
        owner_id: None,
        city: non_blank(query.city),
        property_type: non_blank(query.property_type),
        listing_type: query.listing_type,
        min_price: query.min_price,
        max_price: query.max_price,
        min_bedrooms: query.bedrooms,
        text: non_blank(query.q),
        sort: query.sort.unwrap_or_default(),
        limit: query.limit.unwrap_or_default(),
        offset: query.offset.unwrap_or_default(),
    })
}

fn check_numbers(price: Option<i64>, bedrooms: Option<i32>, bathrooms: Option<i32>) -> ApiResult<()> {
    if price.is_some_and(|p| p <= 0) {
        return Err(ApiError::bad_request("price must be positive"));
    }
    if bedrooms.is_some_and(|b| b < 0) || bathrooms.is_some_and(|b| b < 0) {
        return Err(ApiError::bad_request("room counts cannot be negative"));
    }
    Ok(())
}

/// Loads a property the caller may modify: its owner or an admin.
async fn editable_property(state: &AppState, user: &AuthUser, id: Uuid) -> ApiResult<Property> {
    let profile = current_profile(state, user).await?;
    let property = state
        .store
        .get_property(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Property not found"))?;
    if property.owner_id != profile.id && !profile.is_admin() {
        return Err(ApiError::forbidden("You can only manage your own listings"));
    }
    Ok(property)
}

pub async fn search_properties(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    AppQuery(query): AppQuery<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let profile = match &viewer {
        Some(user) => state.store.get_profile(user.id).await?,
        None => None,
    };
    let filter = search_filter(query, profile.as_ref())?;
    let properties = state.store.search_properties(&filter).await?;
    log::info!("Property search returned {} rows", properties.len());
    Ok(Json(json!({
        "properties": properties,
        "limit": filter.page_limit(),
        "offset": filter.page_offset(),
    })))
}

pub async fn get_property(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Property>> {
    let property = state.store.get_property(id).await?;
    let profile = match &viewer {
        Some(user) => state.store.get_profile(user.id).await?,
        None => None,
    };
    match property {
        Some(property) if property.visible_to(profile.as_ref()) => Ok(Json(property)),
        _ => Err(ApiError::not_found("Property not found")),
    }
}

pub async fn my_properties(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Property>>> {
    let filter = PropertyFilter {
        owner_id: Some(user.id),
        limit: crate::store::MAX_PAGE_SIZE,
        ..Default::default()
    };
    Ok(Json(state.store.search_properties(&filter).await?))
}

pub async fn create_property(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<NewPropertyRequest>,
) -> ApiResult<(StatusCode, Json<Property>)> {
    let profile = current_profile(&state, &user).await?;
    if profile.role == Role::Customer {
        return Err(ApiError::forbidden("Only property owners can create listings"));
    }

    let title = require_text(request.title, "title")?;
    let property_type = require_text(request.property_type, "property_type")?;
    let listing_type = require(request.listing_type, "listing_type")?;
    let price = require(request.price, "price")?;
    let city = require_text(request.city, "city")?;
    check_numbers(Some(price), Some(request.bedrooms), Some(request.bathrooms))?;

    let now = Utc::now();
    let property = Property {
        id: Uuid::new_v4(),
        owner_id: profile.id,
        title,
        description: request.description.trim().to_string(),
        property_type,
        listing_type,
        price,
        city,
        locality: non_blank(request.locality),
        address: non_blank(request.address),
        bedrooms: request.bedrooms,
        bathrooms: request.bathrooms,
        area_sqft: request.area_sqft,
        amenities: request.amenities,
        images: request.images,
        status: PropertyStatus::Pending,
        rejection_reason: None,
        favorites_count: 0,
        contacts_count: 0,
        created_at: now,
        updated_at: now,
    };
    let created = state.store.create_property(property).await?;
    log::info!("Owner {} listed property {} for review", profile.id, created.id);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_property(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    AppJson(update): AppJson<PropertyUpdate>,
) -> ApiResult<Json<Property>> {
    editable_property(&state, &user, id).await?;
    check_numbers(update.price, update.bedrooms, update.bathrooms)?;
    for (value, field) in [
        (&update.title, "title"),
        (&update.property_type, "property_type"),
        (&update.city, "city"),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ApiError::BadRequest(format!("{field} cannot be blank")));
        }
    }

    let updated = state.store.update_property(id, update).await?;
    log::info!("Updated property {}", id);
    Ok(Json(updated))
}

pub async fn delete_property(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    editable_property(&state, &user, id).await?;
    state.store.delete_property(id).await?;
    log::info!("Deleted property {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_admins_only_search_approved_listings() {
        let query = SearchQuery {
            status: Some(PropertyStatus::Pending),
            ..Default::default()
        };
        let filter = search_filter(query, None).unwrap();
        assert_eq!(filter.status, Some(PropertyStatus::Approved));

        let mut admin = Profile::new_customer(Uuid::new_v4(), None, Utc::now());
        admin.role = Role::Admin;
        let query = SearchQuery {
            status: Some(PropertyStatus::Pending),
            ..Default::default()
        };
        let filter = search_filter(query, Some(&admin)).unwrap();
        assert_eq!(filter.status, Some(PropertyStatus::Pending));
    }

    #[test]
    fn inverted_price_range_is_rejected() {
        let query = SearchQuery {
            min_price: Some(500),
            max_price: Some(100),
            ..Default::default()
        };
        assert!(search_filter(query, None).is_err());
    }

    #[test]
    fn blank_text_filters_are_dropped() {
        let query = SearchQuery {
            city: Some("  ".to_string()),
            q: Some(" baner ".to_string()),
            ..Default::default()
        };
        let filter = search_filter(query, None).unwrap();
        assert!(filter.city.is_none());
        assert_eq!(filter.text.as_deref(), Some("baner"));
    }
}
