use chrono::{DateTime, Duration, Utc};
use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a lowercase string-backed enum stored in a `Text`/`Varchar` column.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
            diesel::AsExpression, diesel::FromSqlRow,
        )]
        #[diesel(sql_type = Text)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {} value: {}", stringify!($name), other)),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                Ok(raw.parse::<$name>()?)
            }
        }
    };
}

text_enum!(Role {
    Customer => "customer",
    Owner => "owner",
    Admin => "admin",
});

text_enum!(VerificationStatus {
    Unverified => "unverified",
    Pending => "pending",
    Verified => "verified",
    Rejected => "rejected",
});

text_enum!(PropertyStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

text_enum!(ListingType {
    Sale => "sale",
    Rent => "rent",
});

text_enum!(SubscriptionStatus {
    Active => "active",
    Expired => "expired",
    Cancelled => "cancelled",
});

text_enum!(TransactionStatus {
    Created => "created",
    Paid => "paid",
    Failed => "failed",
});

text_enum!(VisitStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Rejected => "rejected",
    Cancelled => "cancelled",
    Completed => "completed",
});

text_enum!(
    /// Purchasable contact-reveal packages.
    SubscriptionPlan {
        Basic => "basic",
        Standard => "standard",
        Premium => "premium",
    }
);

pub const PLAN_CURRENCY: &str = "INR";

impl SubscriptionPlan {
    pub const ALL: [SubscriptionPlan; 3] = [Self::Basic, Self::Standard, Self::Premium];

    /// Price in paise.
    pub fn price(&self) -> i64 {
        match self {
            Self::Basic => 49_900,
            Self::Standard => 99_900,
            Self::Premium => 199_900,
        }
    }

    pub fn contacts_limit(&self) -> i32 {
        match self {
            Self::Basic => 10,
            Self::Standard => 25,
            Self::Premium => 60,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Basic => Duration::days(30),
            Self::Standard => Duration::days(60),
            Self::Premium => Duration::days(90),
        }
    }
}

/// Who is acting on a visit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitActor {
    Owner,
    Customer,
}

impl VisitStatus {
    /// Whether `actor` may move a request from `self` to `next`.
    pub fn can_transition(self, next: VisitStatus, actor: VisitActor) -> bool {
        use VisitStatus::*;
        match actor {
            VisitActor::Owner => matches!(
                (self, next),
                (Pending, Confirmed) | (Pending, Rejected) | (Confirmed, Completed)
            ),
            VisitActor::Customer => {
                matches!((self, next), (Pending, Cancelled) | (Confirmed, Cancelled))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub verification_status: VerificationStatus,
    pub verification_document_url: Option<String>,
    pub verification_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh customer profile for a user seen for the first time.
    pub fn new_customer(id: Uuid, email: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            full_name: None,
            phone: None,
            whatsapp: None,
            avatar_url: None,
            role: Role::Customer,
            verification_status: VerificationStatus::Unverified,
            verification_document_url: None,
            verification_note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Self-service profile edits. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = crate::schema::profiles)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::properties)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub property_type: String,
    pub listing_type: ListingType,
    pub price: i64,
    pub city: String,
    pub locality: Option<String>,
    pub address: Option<String>,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub area_sqft: Option<i32>,
    pub amenities: Vec<String>,
    pub images: Vec<String>,
    pub status: PropertyStatus,
    pub rejection_reason: Option<String>,
    pub favorites_count: i32,
    pub contacts_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Owners and admins see every status; everyone else only approved rows.
    pub fn visible_to(&self, viewer: Option<&Profile>) -> bool {
        if self.status == PropertyStatus::Approved {
            return true;
        }
        viewer.is_some_and(|p| p.is_admin() || p.id == self.owner_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize, AsChangeset)]
#[diesel(table_name = crate::schema::properties)]
pub struct PropertyUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub property_type: Option<String>,
    pub listing_type: Option<ListingType>,
    pub price: Option<i64>,
    pub city: Option<String>,
    pub locality: Option<String>,
    pub address: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqft: Option<i32>,
    pub amenities: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
}

/// Atomically adjusted property counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyCounter {
    Favorites,
    Contacts,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: SubscriptionPlan,
    pub contacts_limit: i32,
    pub contacts_used: i32,
    pub status: SubscriptionStatus,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn for_plan(
        user_id: Uuid,
        plan: SubscriptionPlan,
        transaction_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            plan,
            contacts_limit: plan.contacts_limit(),
            contacts_used: 0,
            status: SubscriptionStatus::Active,
            starts_at: now,
            expires_at: now + plan.duration(),
            transaction_id,
            created_at: now,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.expires_at > now
    }

    pub fn remaining(&self) -> i32 {
        (self.contacts_limit - self.contacts_used).max(0)
    }

    pub fn has_quota(&self, now: DateTime<Utc>) -> bool {
        self.is_live(now) && self.contacts_used < self.contacts_limit
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: SubscriptionPlan,
    pub amount: i64,
    pub currency: String,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::contact_reveals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContactReveal {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub property_id: Uuid,
    pub owner_id: Uuid,
    pub owner_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub whatsapp: Option<String>,
    pub subscription_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ContactReveal {
    /// Snapshot of `owner`'s contact details for `customer_id`.
    pub fn snapshot(
        customer_id: Uuid,
        property_id: Uuid,
        owner: &Profile,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            property_id,
            owner_id: owner.id,
            owner_name: owner.full_name.clone(),
            phone: owner.phone.clone(),
            email: owner.email.clone(),
            whatsapp: owner.whatsapp.clone(),
            subscription_id: None,
            created_at: now,
        }
    }
}

/// Result of an attempt to reveal an owner's contact.
#[derive(Debug, Clone)]
pub enum RevealOutcome {
    AlreadyRevealed(ContactReveal),
    Granted {
        reveal: ContactReveal,
        subscription: Subscription,
    },
    NoActiveSubscription,
    QuotaExhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::visit_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VisitRequest {
    pub id: Uuid,
    pub property_id: Uuid,
    pub customer_id: Uuid,
    pub owner_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub message: Option<String>,
    pub owner_note: Option<String>,
    pub status: VisitStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::chats)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Chat {
    pub id: Uuid,
    pub property_id: Uuid,
    pub customer_id: Uuid,
    pub owner_id: Uuid,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub customer_unread: i32,
    pub owner_unread: i32,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.customer_id == user_id || self.owner_id == user_id
    }

    /// The participant on the other side of `user_id`.
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.customer_id == user_id {
            self.owner_id
        } else {
            self.customer_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, kind: &str, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.to_string(),
            title: title.into(),
            body: body.into(),
            link: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::favorites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Favorite {
    pub user_id: Uuid,
    pub property_id: Uuid,
    pub created_at: DateTime<Utc>,
}
