//! In-memory implementation of the marketplace store.
//!
//! All tables live behind one `tokio::sync::RwLock`, so every trait method is
//! atomic with respect to the others. Nothing survives a restart.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MarketplaceStore, PropertyFilter, PropertySort, StoreError, StoreResult};
use crate::models::{
    Chat, ContactReveal, Favorite, Message, Notification, Profile, ProfileUpdate, Property,
    PropertyCounter, PropertyStatus, PropertyUpdate, RevealOutcome, Subscription,
    Transaction, TransactionStatus, VerificationStatus, VisitRequest, VisitStatus,
};

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    properties: HashMap<Uuid, Property>,
    favorites: HashMap<(Uuid, Uuid), Favorite>,
    reveals: HashMap<(Uuid, Uuid), ContactReveal>,
    subscriptions: HashMap<Uuid, Subscription>,
    transactions: HashMap<Uuid, Transaction>,
    visits: HashMap<Uuid, VisitRequest>,
    chats: HashMap<Uuid, Chat>,
    messages: Vec<Message>,
    notifications: Vec<Notification>,
}

impl Tables {
    fn profile_mut(&mut self, id: Uuid) -> StoreResult<&mut Profile> {
        self.profiles
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {id}")))
    }

    fn property_mut(&mut self, id: Uuid) -> StoreResult<&mut Property> {
        self.properties
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("property {id}")))
    }

    fn transaction_by_order_mut(&mut self, order_id: &str) -> Option<&mut Transaction> {
        self.transactions
            .values_mut()
            .find(|t| t.gateway_order_id == order_id)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl MarketplaceStore for InMemoryStore {
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn ensure_profile(&self, profile: Profile) -> StoreResult<Profile> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .profiles
            .entry(profile.id)
            .or_insert(profile)
            .clone())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> StoreResult<Profile> {
        let mut tables = self.tables.write().await;
        let profile = tables.profile_mut(id)?;
        if let Some(full_name) = update.full_name {
            profile.full_name = Some(full_name);
        }
        if let Some(phone) = update.phone {
            profile.phone = Some(phone);
        }
        if let Some(whatsapp) = update.whatsapp {
            profile.whatsapp = Some(whatsapp);
        }
        if let Some(avatar_url) = update.avatar_url {
            profile.avatar_url = Some(avatar_url);
        }
        if let Some(role) = update.role {
            profile.role = role;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn submit_verification(&self, id: Uuid, document_url: &str) -> StoreResult<Profile> {
        let mut tables = self.tables.write().await;
        let profile = tables.profile_mut(id)?;
        profile.verification_document_url = Some(document_url.to_string());
        profile.verification_status = VerificationStatus::Pending;
        profile.verification_note = None;
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn set_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
        note: Option<String>,
    ) -> StoreResult<Profile> {
        let mut tables = self.tables.write().await;
        let profile = tables.profile_mut(id)?;
        profile.verification_status = status;
        profile.verification_note = note;
        if status == VerificationStatus::Verified && !profile.is_admin() {
            profile.role = crate::models::Role::Owner;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn list_profiles_by_verification(
        &self,
        status: VerificationStatus,
    ) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Profile> = tables
            .profiles
            .values()
            .filter(|p| p.verification_status == status)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.updated_at);
        Ok(rows)
    }

    async fn create_property(&self, property: Property) -> StoreResult<Property> {
        let mut tables = self.tables.write().await;
        if tables.properties.contains_key(&property.id) {
            return Err(StoreError::Conflict(format!("property {}", property.id)));
        }
        tables.properties.insert(property.id, property.clone());
        Ok(property)
    }

    async fn get_property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        Ok(self.tables.read().await.properties.get(&id).cloned())
    }

    async fn search_properties(&self, filter: &PropertyFilter) -> StoreResult<Vec<Property>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Property> = tables
            .properties
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        match filter.sort {
            PropertySort::Newest => newest_first(&mut rows, |p| p.created_at),
            PropertySort::PriceAsc => rows.sort_by_key(|p| p.price),
            PropertySort::PriceDesc => rows.sort_by(|a, b| b.price.cmp(&a.price)),
        }
        Ok(rows
            .into_iter()
            .skip(filter.page_offset() as usize)
            .take(filter.page_limit() as usize)
            .collect())
    }

    async fn update_property(&self, id: Uuid, update: PropertyUpdate) -> StoreResult<Property> {
        let mut tables = self.tables.write().await;
        let property = tables.property_mut(id)?;
        let PropertyUpdate {
            title,
            description,
            property_type,
            listing_type,
            price,
            city,
            locality,
            address,
            bedrooms,
            bathrooms,
            area_sqft,
            amenities,
            images,
        } = update;
        if let Some(v) = title {
            property.title = v;
        }
        if let Some(v) = description {
            property.description = v;
        }
        if let Some(v) = property_type {
            property.property_type = v;
        }
        if let Some(v) = listing_type {
            property.listing_type = v;
        }
        if let Some(v) = price {
            property.price = v;
        }
        if let Some(v) = city {
            property.city = v;
        }
        if locality.is_some() {
            property.locality = locality;
        }
        if address.is_some() {
            property.address = address;
        }
        if let Some(v) = bedrooms {
            property.bedrooms = v;
        }
        if let Some(v) = bathrooms {
            property.bathrooms = v;
        }
        if area_sqft.is_some() {
            property.area_sqft = area_sqft;
        }
        if let Some(v) = amenities {
            property.amenities = v;
        }
        if let Some(v) = images {
            property.images = v;
        }
        property.updated_at = Utc::now();
        Ok(property.clone())
    }

    async fn set_property_status(
        &self,
        id: Uuid,
        status: PropertyStatus,
        reason: Option<String>,
    ) -> StoreResult<Property> {
        let mut tables = self.tables.write().await;
        let property = tables.property_mut(id)?;
        property.status = status;
        property.rejection_reason = reason;
        property.updated_at = Utc::now();
        Ok(property.clone())
    }

    async fn delete_property(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.properties.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("property {id}")));
        }
        tables.favorites.retain(|(_, property_id), _| *property_id != id);
        tables.reveals.retain(|(_, property_id), _| *property_id != id);
        tables.visits.retain(|_, v| v.property_id != id);
        let removed_chats: Vec<Uuid> = tables
            .chats
            .values()
            .filter(|c| c.property_id == id)
            .map(|c| c.id)
            .collect();
        tables.chats.retain(|_, c| c.property_id != id);
        tables.messages.retain(|m| !removed_chats.contains(&m.chat_id));
        Ok(())
    }

    async fn bump_property_counter(
        &self,
        id: Uuid,
        counter: PropertyCounter,
        delta: i32,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let property = tables.property_mut(id)?;
        let slot = match counter {
            PropertyCounter::Favorites => &mut property.favorites_count,
            PropertyCounter::Contacts => &mut property.contacts_count,
        };
        *slot = (*slot + delta).max(0);
        Ok(())
    }

    async fn add_favorite(&self, favorite: Favorite) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let key = (favorite.user_id, favorite.property_id);
        if tables.favorites.contains_key(&key) {
            return Ok(false);
        }
        tables.favorites.insert(key, favorite);
        Ok(true)
    }

    async fn remove_favorite(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.favorites.remove(&(user_id, property_id)).is_some())
    }

    async fn list_favorite_properties(&self, user_id: Uuid) -> StoreResult<Vec<Property>> {
        let tables = self.tables.read().await;
        let mut favorites: Vec<&Favorite> = tables
            .favorites
            .values()
            .filter(|f| f.user_id == user_id)
            .collect();
        favorites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(favorites
            .into_iter()
            .filter_map(|f| tables.properties.get(&f.property_id).cloned())
            .collect())
    }

    async fn find_reveal(
        &self,
        customer_id: Uuid,
        property_id: Uuid,
    ) -> StoreResult<Option<ContactReveal>> {
        let tables = self.tables.read().await;
        Ok(tables.reveals.get(&(customer_id, property_id)).cloned())
    }

    async fn reveal_contact(
        &self,
        mut reveal: ContactReveal,
        now: DateTime<Utc>,
    ) -> StoreResult<RevealOutcome> {
        let mut tables = self.tables.write().await;
        let key = (reveal.customer_id, reveal.property_id);
        if let Some(existing) = tables.reveals.get(&key) {
            return Ok(RevealOutcome::AlreadyRevealed(existing.clone()));
        }

        let customer_id = reveal.customer_id;
        let mut live = tables
            .subscriptions
            .values_mut()
            .filter(|s| s.user_id == customer_id && s.is_live(now))
            .peekable();
        if live.peek().is_none() {
            return Ok(RevealOutcome::NoActiveSubscription);
        }
        // Spend from the plan that runs out first.
        let Some(subscription) = live
            .filter(|s| s.contacts_used < s.contacts_limit)
            .min_by_key(|s| s.expires_at)
        else {
            return Ok(RevealOutcome::QuotaExhausted);
        };
        subscription.contacts_used += 1;
        let subscription = subscription.clone();

        reveal.subscription_id = Some(subscription.id);
        tables.reveals.insert(key, reveal.clone());
        Ok(RevealOutcome::Granted {
            reveal,
            subscription,
        })
    }

    async fn list_reveals(&self, customer_id: Uuid) -> StoreResult<Vec<ContactReveal>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ContactReveal> = tables
            .reveals
            .values()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |r| r.created_at);
        Ok(rows)
    }

    async fn active_subscription(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Subscription>> {
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id && s.is_live(now))
            .max_by_key(|s| (s.remaining(), s.expires_at))
            .cloned())
    }

    async fn subscription_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> StoreResult<Option<Subscription>> {
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .values()
            .find(|s| s.transaction_id == Some(transaction_id))
            .cloned())
    }

    async fn create_transaction(&self, transaction: Transaction) -> StoreResult<Transaction> {
        let mut tables = self.tables.write().await;
        if tables
            .transactions
            .values()
            .any(|t| t.gateway_order_id == transaction.gateway_order_id)
        {
            return Err(StoreError::Conflict(format!(
                "order {}",
                transaction.gateway_order_id
            )));
        }
        tables.transactions.insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn get_transaction_by_order(&self, order_id: &str) -> StoreResult<Option<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .values()
            .find(|t| t.gateway_order_id == order_id)
            .cloned())
    }

    async fn complete_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        subscription: Subscription,
    ) -> StoreResult<(Transaction, Subscription)> {
        let mut tables = self.tables.write().await;
        let transaction = tables
            .transaction_by_order_mut(order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        if transaction.status == TransactionStatus::Paid {
            return Err(StoreError::Conflict(format!("order {order_id} already paid")));
        }
        transaction.status = TransactionStatus::Paid;
        transaction.gateway_payment_id = Some(payment_id.to_string());
        transaction.updated_at = Utc::now();
        let transaction = transaction.clone();

        tables.subscriptions.insert(subscription.id, subscription.clone());
        Ok((transaction, subscription))
    }

    async fn fail_transaction(&self, order_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(transaction) = tables.transaction_by_order_mut(order_id) {
            if transaction.status == TransactionStatus::Created {
                transaction.status = TransactionStatus::Failed;
                transaction.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn create_visit(&self, visit: VisitRequest) -> StoreResult<VisitRequest> {
        let mut tables = self.tables.write().await;
        tables.visits.insert(visit.id, visit.clone());
        Ok(visit)
    }

    async fn get_visit(&self, id: Uuid) -> StoreResult<Option<VisitRequest>> {
        Ok(self.tables.read().await.visits.get(&id).cloned())
    }

    async fn list_visits_by_customer(&self, customer_id: Uuid) -> StoreResult<Vec<VisitRequest>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<VisitRequest> = tables
            .visits
            .values()
            .filter(|v| v.customer_id == customer_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |v| v.created_at);
        Ok(rows)
    }

    async fn list_visits_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<VisitRequest>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<VisitRequest> = tables
            .visits
            .values()
            .filter(|v| v.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |v| v.created_at);
        Ok(rows)
    }

    async fn transition_visit(
        &self,
        id: Uuid,
        from: VisitStatus,
        to: VisitStatus,
        owner_note: Option<String>,
    ) -> StoreResult<Option<VisitRequest>> {
        let mut tables = self.tables.write().await;
        let visit = tables
            .visits
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("visit request {id}")))?;
        if visit.status != from {
            return Ok(None);
        }
        visit.status = to;
        if owner_note.is_some() {
            visit.owner_note = owner_note;
        }
        visit.updated_at = Utc::now();
        Ok(Some(visit.clone()))
    }

    async fn get_or_create_chat(&self, chat: Chat) -> StoreResult<Chat> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .chats
            .values()
            .find(|c| c.property_id == chat.property_id && c.customer_id == chat.customer_id)
        {
            return Ok(existing.clone());
        }
        tables.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, id: Uuid) -> StoreResult<Option<Chat>> {
        Ok(self.tables.read().await.chats.get(&id).cloned())
    }

    async fn list_chats(&self, user_id: Uuid) -> StoreResult<Vec<Chat>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Chat> = tables
            .chats
            .values()
            .filter(|c| c.is_participant(user_id))
            .cloned()
            .collect();
        newest_first(&mut rows, |c| c.last_message_at.unwrap_or(c.created_at));
        Ok(rows)
    }

    async fn append_message(&self, message: Message) -> StoreResult<Message> {
        let mut tables = self.tables.write().await;
        let chat = tables
            .chats
            .get_mut(&message.chat_id)
            .ok_or_else(|| StoreError::NotFound(format!("chat {}", message.chat_id)))?;
        if message.sender_id == chat.customer_id {
            chat.owner_unread += 1;
        } else {
            chat.customer_unread += 1;
        }
        chat.last_message = Some(message.content.clone());
        chat.last_message_at = Some(message.created_at);
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn mark_chat_read(&self, chat_id: Uuid, user_id: Uuid) -> StoreResult<Chat> {
        let mut tables = self.tables.write().await;
        let chat = tables
            .chats
            .get_mut(&chat_id)
            .ok_or_else(|| StoreError::NotFound(format!("chat {chat_id}")))?;
        if chat.customer_id == user_id {
            chat.customer_unread = 0;
        }
        if chat.owner_id == user_id {
            chat.owner_unread = 0;
        }
        Ok(chat.clone())
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<()> {
        self.tables.write().await.notifications.push(notification);
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Notification> = tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |n| n.created_at);
        Ok(rows)
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut count = 0;
        for notification in tables
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            count += 1;
        }
        Ok(count)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
