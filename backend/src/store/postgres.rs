//! Postgres implementation of the marketplace store.
//!
//! Diesel is synchronous, so every call checks a connection out of the r2d2
//! pool and runs on tokio's blocking pool. Counter updates are expressed as
//! `col = col + n` and the quota charge as a conditional `UPDATE`, so none of
//! them depend on a value read earlier in the request.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use uuid::Uuid;

use super::{MarketplaceStore, PropertyFilter, PropertySort, StoreError, StoreResult};
use crate::models::{
    Chat, ContactReveal, Favorite, Message, Notification, Profile, ProfileUpdate, Property,
    PropertyCounter, PropertyStatus, PropertyUpdate, RevealOutcome, Role, Subscription,
    SubscriptionStatus, Transaction, TransactionStatus, VerificationStatus, VisitRequest,
    VisitStatus,
};
use crate::schema::{
    chats, contact_reveals, favorites, messages, notifications, profiles, properties,
    subscriptions, transactions, visit_requests,
};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => StoreError::NotFound("record".to_string()),
            other => StoreError::Unexpected(other.into()),
        }
    }
}

/// Escapes `%`, `_` and `\` so user input matches literally inside `ILIKE`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| StoreError::Unexpected(anyhow::anyhow!("connection pool: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unexpected(anyhow::anyhow!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl MarketplaceStore for PgStore {
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        self.run(move |conn| {
            Ok(profiles::table
                .find(id)
                .select(Profile::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn ensure_profile(&self, profile: Profile) -> StoreResult<Profile> {
        self.run(move |conn| {
            diesel::insert_into(profiles::table)
                .values(&profile)
                .on_conflict(profiles::id)
                .do_nothing()
                .execute(conn)?;
            Ok(profiles::table
                .find(profile.id)
                .select(Profile::as_select())
                .first(conn)?)
        })
        .await
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> StoreResult<Profile> {
        self.run(move |conn| {
            Ok(diesel::update(profiles::table.find(id))
                .set((update, profiles::updated_at.eq(Utc::now())))
                .returning(Profile::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn submit_verification(&self, id: Uuid, document_url: &str) -> StoreResult<Profile> {
        let document_url = document_url.to_string();
        self.run(move |conn| {
            Ok(diesel::update(profiles::table.find(id))
                .set((
                    profiles::verification_document_url.eq(Some(document_url)),
                    profiles::verification_status.eq(VerificationStatus::Pending),
                    profiles::verification_note.eq(None::<String>),
                    profiles::updated_at.eq(Utc::now()),
                ))
                .returning(Profile::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn set_verification(
        &self,
        id: Uuid,
        status: VerificationStatus,
        note: Option<String>,
    ) -> StoreResult<Profile> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let current = profiles::table
                    .find(id)
                    .select(Profile::as_select())
                    .for_update()
                    .first(conn)?;
                let role = if status == VerificationStatus::Verified && !current.is_admin() {
                    Role::Owner
                } else {
                    current.role
                };
                Ok(diesel::update(profiles::table.find(id))
                    .set((
                        profiles::verification_status.eq(status),
                        profiles::verification_note.eq(note),
                        profiles::role.eq(role),
                        profiles::updated_at.eq(Utc::now()),
                    ))
                    .returning(Profile::as_returning())
                    .get_result(conn)?)
            })
        })
        .await
    }

    async fn list_profiles_by_verification(
        &self,
        status: VerificationStatus,
    ) -> StoreResult<Vec<Profile>> {
        self.run(move |conn| {
            Ok(profiles::table
                .filter(profiles::verification_status.eq(status))
                .order(profiles::updated_at.asc())
                .select(Profile::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn create_property(&self, property: Property) -> StoreResult<Property> {
        self.run(move |conn| {
            Ok(diesel::insert_into(properties::table)
                .values(&property)
                .returning(Property::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn get_property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        self.run(move |conn| {
            Ok(properties::table
                .find(id)
                .select(Property::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn search_properties(&self, filter: &PropertyFilter) -> StoreResult<Vec<Property>> {
        let filter = filter.clone();
        self.run(move |conn| {
            let mut query = properties::table
                .select(Property::as_select())
                .into_boxed();

            if let Some(status) = filter.status {
                query = query.filter(properties::status.eq(status));
            }
            if let Some(owner_id) = filter.owner_id {
                query = query.filter(properties::owner_id.eq(owner_id));
            }
            if let Some(city) = &filter.city {
                query = query.filter(properties::city.ilike(escape_like(city.trim())));
            }
            if let Some(kind) = &filter.property_type {
                query = query.filter(properties::property_type.ilike(escape_like(kind.trim())));
            }
            if let Some(listing_type) = filter.listing_type {
                query = query.filter(properties::listing_type.eq(listing_type));
            }
            if let Some(min) = filter.min_price {
                query = query.filter(properties::price.ge(min));
            }
            if let Some(max) = filter.max_price {
                query = query.filter(properties::price.le(max));
            }
            if let Some(min) = filter.min_bedrooms {
                query = query.filter(properties::bedrooms.ge(min));
            }
            if let Some(text) = &filter.text {
                let pattern = format!("%{}%", escape_like(text.trim()));
                query = query.filter(
                    properties::title
                        .ilike(pattern.clone())
                        .or(properties::locality.ilike(pattern)),
                );
            }

            query = match filter.sort {
                PropertySort::Newest => query.order(properties::created_at.desc()),
                PropertySort::PriceAsc => {
                    query.order((properties::price.asc(), properties::created_at.desc()))
                }
                PropertySort::PriceDesc => {
                    query.order((properties::price.desc(), properties::created_at.desc()))
                }
            };

            Ok(query
                .limit(filter.page_limit())
                .offset(filter.page_offset())
                .load(conn)?)
        })
        .await
    }

    async fn update_property(&self, id: Uuid, update: PropertyUpdate) -> StoreResult<Property> {
        self.run(move |conn| {
            Ok(diesel::update(properties::table.find(id))
                .set((update, properties::updated_at.eq(Utc::now())))
                .returning(Property::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn set_property_status(
        &self,
        id: Uuid,
        status: PropertyStatus,
        reason: Option<String>,
    ) -> StoreResult<Property> {
        self.run(move |conn| {
            Ok(diesel::update(properties::table.find(id))
                .set((
                    properties::status.eq(status),
                    properties::rejection_reason.eq(reason),
                    properties::updated_at.eq(Utc::now()),
                ))
                .returning(Property::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn delete_property(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            let deleted = diesel::delete(properties::table.find(id)).execute(conn)?;
            if deleted == 0 {
                return Err(StoreError::NotFound(format!("property {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn bump_property_counter(
        &self,
        id: Uuid,
        counter: PropertyCounter,
        delta: i32,
    ) -> StoreResult<()> {
        self.run(move |conn| {
            let updated = match counter {
                PropertyCounter::Favorites => diesel::update(
                    properties::table
                        .find(id)
                        .filter((properties::favorites_count + delta).ge(0)),
                )
                .set(properties::favorites_count.eq(properties::favorites_count + delta))
                .execute(conn)?,
                PropertyCounter::Contacts => diesel::update(
                    properties::table
                        .find(id)
                        .filter((properties::contacts_count + delta).ge(0)),
                )
                .set(properties::contacts_count.eq(properties::contacts_count + delta))
                .execute(conn)?,
            };
            if updated == 0 {
                let exists: i64 = properties::table.find(id).count().get_result(conn)?;
                if exists == 0 {
                    return Err(StoreError::NotFound(format!("property {id}")));
                }
            }
            Ok(())
        })
        .await
    }

    async fn add_favorite(&self, favorite: Favorite) -> StoreResult<bool> {
        self.run(move |conn| {
            let inserted = diesel::insert_into(favorites::table)
                .values(&favorite)
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn remove_favorite(&self, user_id: Uuid, property_id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| {
            let removed = diesel::delete(
                favorites::table
                    .filter(favorites::user_id.eq(user_id))
                    .filter(favorites::property_id.eq(property_id)),
            )
            .execute(conn)?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_favorite_properties(&self, user_id: Uuid) -> StoreResult<Vec<Property>> {
        self.run(move |conn| {
            Ok(favorites::table
                .inner_join(properties::table)
                .filter(favorites::user_id.eq(user_id))
                .order(favorites::created_at.desc())
                .select(Property::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn find_reveal(
        &self,
        customer_id: Uuid,
        property_id: Uuid,
    ) -> StoreResult<Option<ContactReveal>> {
        self.run(move |conn| {
            Ok(contact_reveals::table
                .filter(contact_reveals::customer_id.eq(customer_id))
                .filter(contact_reveals::property_id.eq(property_id))
                .select(ContactReveal::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn reveal_contact(
        &self,
        reveal: ContactReveal,
        now: DateTime<Utc>,
    ) -> StoreResult<RevealOutcome> {
        self.run(move |conn| {
            let customer_id = reveal.customer_id;
            let property_id = reveal.property_id;
            let mut reveal = reveal;

            let attempt = conn.transaction::<_, StoreError, _>(|conn| {
                let existing = contact_reveals::table
                    .filter(contact_reveals::customer_id.eq(customer_id))
                    .filter(contact_reveals::property_id.eq(property_id))
                    .select(ContactReveal::as_select())
                    .first(conn)
                    .optional()?;
                if let Some(existing) = existing {
                    return Ok(RevealOutcome::AlreadyRevealed(existing));
                }

                let candidates: Vec<Uuid> = subscriptions::table
                    .filter(subscriptions::user_id.eq(customer_id))
                    .filter(subscriptions::status.eq(SubscriptionStatus::Active))
                    .filter(subscriptions::expires_at.gt(now))
                    .filter(subscriptions::contacts_used.lt(subscriptions::contacts_limit))
                    .order(subscriptions::expires_at.asc())
                    .select(subscriptions::id)
                    .load(conn)?;

                for candidate in candidates {
                    // The guard clauses make the increment a compare-and-set.
                    let charged = diesel::update(
                        subscriptions::table
                            .find(candidate)
                            .filter(subscriptions::status.eq(SubscriptionStatus::Active))
                            .filter(subscriptions::expires_at.gt(now))
                            .filter(
                                subscriptions::contacts_used.lt(subscriptions::contacts_limit),
                            ),
                    )
                    .set(subscriptions::contacts_used.eq(subscriptions::contacts_used + 1))
                    .returning(Subscription::as_returning())
                    .get_result(conn)
                    .optional()?;
                    let Some(subscription) = charged else {
                        continue;
                    };

                    reveal.subscription_id = Some(subscription.id);
                    let inserted = diesel::insert_into(contact_reveals::table)
                        .values(&reveal)
                        .on_conflict((contact_reveals::customer_id, contact_reveals::property_id))
                        .do_nothing()
                        .returning(ContactReveal::as_returning())
                        .get_result(conn)
                        .optional()?;
                    return match inserted {
                        Some(reveal) => Ok(RevealOutcome::Granted {
                            reveal,
                            subscription,
                        }),
                        // Rolls the charge back; the concurrent winner is read below.
                        None => Err(StoreError::Conflict("contact already revealed".to_string())),
                    };
                }

                let live: i64 = subscriptions::table
                    .filter(subscriptions::user_id.eq(customer_id))
                    .filter(subscriptions::status.eq(SubscriptionStatus::Active))
                    .filter(subscriptions::expires_at.gt(now))
                    .count()
                    .get_result(conn)?;
                Ok(if live == 0 {
                    RevealOutcome::NoActiveSubscription
                } else {
                    RevealOutcome::QuotaExhausted
                })
            });

            match attempt {
                Err(StoreError::Conflict(_)) => {
                    let existing = contact_reveals::table
                        .filter(contact_reveals::customer_id.eq(customer_id))
                        .filter(contact_reveals::property_id.eq(property_id))
                        .select(ContactReveal::as_select())
                        .first(conn)?;
                    Ok(RevealOutcome::AlreadyRevealed(existing))
                }
                other => other,
            }
        })
        .await
    }

    async fn list_reveals(&self, customer_id: Uuid) -> StoreResult<Vec<ContactReveal>> {
        self.run(move |conn| {
            Ok(contact_reveals::table
                .filter(contact_reveals::customer_id.eq(customer_id))
                .order(contact_reveals::created_at.desc())
                .select(ContactReveal::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn active_subscription(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Subscription>> {
        self.run(move |conn| {
            Ok(subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .filter(subscriptions::status.eq(SubscriptionStatus::Active))
                .filter(subscriptions::expires_at.gt(now))
                .order((
                    (subscriptions::contacts_limit - subscriptions::contacts_used).desc(),
                    subscriptions::expires_at.desc(),
                ))
                .select(Subscription::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn subscription_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> StoreResult<Option<Subscription>> {
        self.run(move |conn| {
            Ok(subscriptions::table
                .filter(subscriptions::transaction_id.eq(transaction_id))
                .select(Subscription::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn create_transaction(&self, transaction: Transaction) -> StoreResult<Transaction> {
        self.run(move |conn| {
            Ok(diesel::insert_into(transactions::table)
                .values(&transaction)
                .returning(Transaction::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn get_transaction_by_order(&self, order_id: &str) -> StoreResult<Option<Transaction>> {
        let order_id = order_id.to_string();
        self.run(move |conn| {
            Ok(transactions::table
                .filter(transactions::gateway_order_id.eq(order_id))
                .select(Transaction::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn complete_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        subscription: Subscription,
    ) -> StoreResult<(Transaction, Subscription)> {
        let order_id = order_id.to_string();
        let payment_id = payment_id.to_string();
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let paid = diesel::update(
                    transactions::table
                        .filter(transactions::gateway_order_id.eq(&order_id))
                        .filter(transactions::status.ne(TransactionStatus::Paid)),
                )
                .set((
                    transactions::status.eq(TransactionStatus::Paid),
                    transactions::gateway_payment_id.eq(Some(payment_id)),
                    transactions::updated_at.eq(Utc::now()),
                ))
                .returning(Transaction::as_returning())
                .get_result(conn)
                .optional()?;

                let Some(transaction) = paid else {
                    let known: i64 = transactions::table
                        .filter(transactions::gateway_order_id.eq(&order_id))
                        .count()
                        .get_result(conn)?;
                    return Err(if known == 0 {
                        StoreError::NotFound(format!("order {order_id}"))
                    } else {
                        StoreError::Conflict(format!("order {order_id} already paid"))
                    });
                };

                let subscription = diesel::insert_into(subscriptions::table)
                    .values(&subscription)
                    .returning(Subscription::as_returning())
                    .get_result(conn)?;
                Ok((transaction, subscription))
            })
        })
        .await
    }

    async fn fail_transaction(&self, order_id: &str) -> StoreResult<()> {
        let order_id = order_id.to_string();
        self.run(move |conn| {
            diesel::update(
                transactions::table
                    .filter(transactions::gateway_order_id.eq(order_id))
                    .filter(transactions::status.eq(TransactionStatus::Created)),
            )
            .set((
                transactions::status.eq(TransactionStatus::Failed),
                transactions::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn create_visit(&self, visit: VisitRequest) -> StoreResult<VisitRequest> {
        self.run(move |conn| {
            Ok(diesel::insert_into(visit_requests::table)
                .values(&visit)
                .returning(VisitRequest::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn get_visit(&self, id: Uuid) -> StoreResult<Option<VisitRequest>> {
        self.run(move |conn| {
            Ok(visit_requests::table
                .find(id)
                .select(VisitRequest::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn list_visits_by_customer(&self, customer_id: Uuid) -> StoreResult<Vec<VisitRequest>> {
        self.run(move |conn| {
            Ok(visit_requests::table
                .filter(visit_requests::customer_id.eq(customer_id))
                .order(visit_requests::created_at.desc())
                .select(VisitRequest::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn list_visits_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<VisitRequest>> {
        self.run(move |conn| {
            Ok(visit_requests::table
                .filter(visit_requests::owner_id.eq(owner_id))
                .order(visit_requests::created_at.desc())
                .select(VisitRequest::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn transition_visit(
        &self,
        id: Uuid,
        from: VisitStatus,
        to: VisitStatus,
        owner_note: Option<String>,
    ) -> StoreResult<Option<VisitRequest>> {
        self.run(move |conn| {
            let target = visit_requests::table
                .find(id)
                .filter(visit_requests::status.eq(from));
            let now = Utc::now();
            let updated = match owner_note {
                Some(note) => diesel::update(target)
                    .set((
                        visit_requests::status.eq(to),
                        visit_requests::owner_note.eq(Some(note)),
                        visit_requests::updated_at.eq(now),
                    ))
                    .returning(VisitRequest::as_returning())
                    .get_result(conn)
                    .optional()?,
                None => diesel::update(target)
                    .set((
                        visit_requests::status.eq(to),
                        visit_requests::updated_at.eq(now),
                    ))
                    .returning(VisitRequest::as_returning())
                    .get_result(conn)
                    .optional()?,
            };
            if updated.is_none() {
                let exists: i64 = visit_requests::table.find(id).count().get_result(conn)?;
                if exists == 0 {
                    return Err(StoreError::NotFound(format!("visit request {id}")));
                }
            }
            Ok(updated)
        })
        .await
    }

    async fn get_or_create_chat(&self, chat: Chat) -> StoreResult<Chat> {
        self.run(move |conn| {
            diesel::insert_into(chats::table)
                .values(&chat)
                .on_conflict((chats::property_id, chats::customer_id))
                .do_nothing()
                .execute(conn)?;
            Ok(chats::table
                .filter(chats::property_id.eq(chat.property_id))
                .filter(chats::customer_id.eq(chat.customer_id))
                .select(Chat::as_select())
                .first(conn)?)
        })
        .await
    }

    async fn get_chat(&self, id: Uuid) -> StoreResult<Option<Chat>> {
        self.run(move |conn| {
            Ok(chats::table
                .find(id)
                .select(Chat::as_select())
                .first(conn)
                .optional()?)
        })
        .await
    }

    async fn list_chats(&self, user_id: Uuid) -> StoreResult<Vec<Chat>> {
        self.run(move |conn| {
            Ok(chats::table
                .filter(
                    chats::customer_id
                        .eq(user_id)
                        .or(chats::owner_id.eq(user_id)),
                )
                .order((
                    chats::last_message_at.desc().nulls_last(),
                    chats::created_at.desc(),
                ))
                .select(Chat::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn append_message(&self, message: Message) -> StoreResult<Message> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let chat = chats::table
                    .find(message.chat_id)
                    .select(Chat::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or_else(|| StoreError::NotFound(format!("chat {}", message.chat_id)))?;

                let preview = (
                    chats::last_message.eq(Some(message.content.clone())),
                    chats::last_message_at.eq(Some(message.created_at)),
                );
                if message.sender_id == chat.customer_id {
                    diesel::update(chats::table.find(chat.id))
                        .set((chats::owner_unread.eq(chats::owner_unread + 1), preview))
                        .execute(conn)?;
                } else {
                    diesel::update(chats::table.find(chat.id))
                        .set((chats::customer_unread.eq(chats::customer_unread + 1), preview))
                        .execute(conn)?;
                }

                Ok(diesel::insert_into(messages::table)
                    .values(&message)
                    .returning(Message::as_returning())
                    .get_result(conn)?)
            })
        })
        .await
    }

    async fn list_messages(&self, chat_id: Uuid) -> StoreResult<Vec<Message>> {
        self.run(move |conn| {
            Ok(messages::table
                .filter(messages::chat_id.eq(chat_id))
                .order(messages::created_at.asc())
                .select(Message::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn mark_chat_read(&self, chat_id: Uuid, user_id: Uuid) -> StoreResult<Chat> {
        self.run(move |conn| {
            diesel::update(
                chats::table
                    .find(chat_id)
                    .filter(chats::customer_id.eq(user_id)),
            )
            .set(chats::customer_unread.eq(0))
            .execute(conn)?;
            diesel::update(chats::table.find(chat_id).filter(chats::owner_id.eq(user_id)))
                .set(chats::owner_unread.eq(0))
                .execute(conn)?;
            chats::table
                .find(chat_id)
                .select(Chat::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("chat {chat_id}")))
        })
        .await
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::insert_into(notifications::table)
                .values(&notification)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        self.run(move |conn| {
            Ok(notifications::table
                .filter(notifications::user_id.eq(user_id))
                .order(notifications::created_at.desc())
                .select(Notification::as_select())
                .load(conn)?)
        })
        .await
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| {
            let updated = diesel::update(
                notifications::table
                    .find(id)
                    .filter(notifications::user_id.eq(user_id)),
            )
            .set(notifications::is_read.eq(true))
            .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64> {
        self.run(move |conn| {
            let updated = diesel::update(
                notifications::table
                    .filter(notifications::user_id.eq(user_id))
                    .filter(notifications::is_read.eq(false)),
            )
            .set(notifications::is_read.eq(true))
            .execute(conn)?;
            Ok(updated as u64)
        })
        .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.run(|conn| {
            let one: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1"))
                .get_result(conn)?;
            log::debug!("Database test query result: {}", one);
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("Pune"), "Pune");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
