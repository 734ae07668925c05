//! Storage boundary for the marketplace.
//!
//! Handlers talk to a [`MarketplaceStore`] trait object. The Postgres backend
//! is the durable one; the in-memory backend serves tests and local runs
//! without a database.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Chat, ContactReveal, Favorite, ListingType, Message, Notification, Profile, ProfileUpdate,
    Property, PropertyCounter, PropertyStatus, PropertyUpdate, RevealOutcome, Subscription,
    Transaction, VerificationStatus, VisitRequest, VisitStatus,
};

pub mod memory;
pub mod postgres;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertySort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
}

/// Listing search predicates. Every supplied field must hold for a row to match.
#[derive(Debug, Clone, Default)]
pub struct PropertyFilter {
    pub status: Option<PropertyStatus>,
    pub owner_id: Option<Uuid>,
    pub city: Option<String>,
    pub property_type: Option<String>,
    pub listing_type: Option<ListingType>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_bedrooms: Option<i32>,
    pub text: Option<String>,
    pub sort: PropertySort,
    pub limit: i64,
    pub offset: i64,
}

impl PropertyFilter {
    pub fn page_limit(&self) -> i64 {
        if self.limit <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.limit.min(MAX_PAGE_SIZE)
        }
    }

    pub fn page_offset(&self) -> i64 {
        self.offset.max(0)
    }

    /// Row-level predicate; the Postgres backend expresses the same rules in SQL.
    pub fn matches(&self, property: &Property) -> bool {
        if self.status.is_some_and(|s| s != property.status) {
            return false;
        }
        if self.owner_id.is_some_and(|o| o != property.owner_id) {
            return false;
        }
        if let Some(city) = &self.city {
            if !property.city.eq_ignore_ascii_case(city.trim()) {
                return false;
            }
        }
        if let Some(kind) = &self.property_type {
            if !property.property_type.eq_ignore_ascii_case(kind.trim()) {
                return false;
            }
        }
        if self.listing_type.is_some_and(|l| l != property.listing_type) {
            return false;
        }
        if self.min_price.is_some_and(|min| property.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| property.price > max) {
            return false;
        }
        if self.min_bedrooms.is_some_and(|min| property.bedrooms < min) {
            return false;
        }
        if let Some(text) = &self.text {
            let needle = text.trim().to_lowercase();
            let in_title = property.title.to_lowercase().contains(&needle);
            let in_locality = property
                .locality
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains(&needle));
            if !in_title && !in_locality {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;
    /// Returns the stored profile, inserting `profile` first if none exists.
    async fn ensure_profile(&self, profile: Profile) -> StoreResult<Profile>;
    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> StoreResult<Profile>;
    async fn submit_verification(&self, id: Uuid, document_url: &str) -> StoreResult<Profile>;
    async fn set_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
        note: Option<String>,
    ) -> StoreResult<Profile>;
    async fn list_profiles_by_verification(
        &self,
        status: VerificationStatus,
    ) -> StoreResult<Vec<Profile>>;

    async fn create_property(&self, property: Property) -> StoreResult<Property>;
    async fn get_property(&self, id: Uuid) -> StoreResult<Option<Property>>;
    async fn search_properties(&self, filter: &PropertyFilter) -> StoreResult<Vec<Property>>;
    async fn update_property(&self, id: Uuid, update: PropertyUpdate) -> StoreResult<Property>;
    async fn set_property_status(
        &self,
        id: Uuid,
        status: PropertyStatus,
        reason: Option<String>,
    ) -> StoreResult<Property>;
    async fn delete_property(&self, id: Uuid) -> StoreResult<()>;
    /// Adds `delta` to a counter in place, never dropping below zero.
    async fn bump_property_counter(
        &self,
        id: Uuid,
        counter: PropertyCounter,
        delta: i32,
    ) -> StoreResult<()>;

    /// Returns `true` when the pair was newly inserted.
    async fn add_favorite(&self, favorite: Favorite) -> StoreResult<bool>;
    /// Returns `true` when a row was removed.
    async fn remove_favorite(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<bool>;
    async fn list_favorite_properties(&self, user_id: Uuid) -> StoreResult<Vec<Property>>;

    async fn find_reveal(
        &self,
        customer_id: Uuid,
        property_id: Uuid,
    ) -> StoreResult<Option<ContactReveal>>;
    /// Charges one contact against the customer's live subscription and records
    /// the reveal, as a single atomic step. An existing reveal for the pair is
    /// returned without touching quota.
    async fn reveal_contact(
        &self,
        reveal: ContactReveal,
        now: DateTime<Utc>,
    ) -> StoreResult<RevealOutcome>;
    async fn list_reveals(&self, customer_id: Uuid) -> StoreResult<Vec<ContactReveal>>;

    /// Live subscription with the most remaining quota, if any.
    async fn active_subscription(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Subscription>>;
    async fn subscription_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> StoreResult<Option<Subscription>>;

    async fn create_transaction(&self, transaction: Transaction) -> StoreResult<Transaction>;
    async fn get_transaction_by_order(&self, order_id: &str) -> StoreResult<Option<Transaction>>;
    /// Marks a `created` transaction paid and inserts its subscription atomically.
    /// A transaction that is already paid yields `Conflict`.
    async fn complete_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        subscription: Subscription,
    ) -> StoreResult<(Transaction, Subscription)>;
    async fn fail_transaction(&self, order_id: &str) -> StoreResult<()>;

    async fn create_visit(&self, visit: VisitRequest) -> StoreResult<VisitRequest>;
    async fn get_visit(&self, id: Uuid) -> StoreResult<Option<VisitRequest>>;
    async fn list_visits_by_customer(&self, customer_id: Uuid) -> StoreResult<Vec<VisitRequest>>;
    async fn list_visits_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<VisitRequest>>;
    /// Moves a request from `from` to `to` only if it is still in `from`.
    /// Returns `None` when the status changed underneath.
    async fn transition_visit(
        &self,
        id: Uuid,
        from: VisitStatus,
        to: VisitStatus,
        owner_note: Option<String>,
    ) -> StoreResult<Option<VisitRequest>>;

    async fn get_or_create_chat(&self, chat: Chat) -> StoreResult<Chat>;
    async fn get_chat(&self, id: Uuid) -> StoreResult<Option<Chat>>;
    async fn list_chats(&self, user_id: Uuid) -> StoreResult<Vec<Chat>>;
    /// Appends a message, updates the preview and bumps the recipient's unread counter.
    async fn append_message(&self, message: Message) -> StoreResult<Message>;
    async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>>;
    async fn mark_chat_read(&self, chat_id: Uuid, user_id: Uuid) -> StoreResult<Chat>;

    async fn insert_notification(&self, notification: Notification) -> StoreResult<()>;
    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;
    /// Returns `false` when no such notification belongs to `user_id`.
    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingType;

    fn listing(city: &str, kind: &str, price: i64, bedrooms: i32) -> Property {
        let now = Utc::now();
        Property {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            title: format!("{bedrooms} BHK {kind} in {city}"),
            description: String::new(),
            property_type: kind.to_string(),
            listing_type: ListingType::Sale,
            price,
            city: city.to_string(),
            locality: Some("Baner".to_string()),
            address: None,
            bedrooms,
            bathrooms: 1,
            area_sqft: None,
            amenities: vec![],
            images: vec![],
            status: PropertyStatus::Approved,
            rejection_reason: None,
            favorites_count: 0,
            contacts_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn filter_requires_every_predicate() {
        let filter = PropertyFilter {
            city: Some("pune".to_string()),
            property_type: Some("apartment".to_string()),
            min_price: Some(1_000_000),
            max_price: Some(5_000_000),
            min_bedrooms: Some(2),
            ..Default::default()
        };

        assert!(filter.matches(&listing("Pune", "apartment", 2_000_000, 2)));
        assert!(!filter.matches(&listing("Mumbai", "apartment", 2_000_000, 2)));
        assert!(!filter.matches(&listing("Pune", "villa", 2_000_000, 2)));
        assert!(!filter.matches(&listing("Pune", "apartment", 6_000_000, 2)));
        assert!(!filter.matches(&listing("Pune", "apartment", 900_000, 2)));
        assert!(!filter.matches(&listing("Pune", "apartment", 2_000_000, 1)));
    }

    #[test]
    fn text_search_covers_title_and_locality() {
        let row = listing("Pune", "apartment", 2_000_000, 2);
        let by_locality = PropertyFilter {
            text: Some("baner".to_string()),
            ..Default::default()
        };
        let miss = PropertyFilter {
            text: Some("koregaon".to_string()),
            ..Default::default()
        };
        assert!(by_locality.matches(&row));
        assert!(!miss.matches(&row));
    }

    #[test]
    fn page_size_is_clamped() {
        let mut filter = PropertyFilter::default();
        assert_eq!(filter.page_limit(), DEFAULT_PAGE_SIZE);
        filter.limit = 10_000;
        assert_eq!(filter.page_limit(), MAX_PAGE_SIZE);
        filter.offset = -5;
        assert_eq!(filter.page_offset(), 0);
    }
}
