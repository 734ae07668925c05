//! Payment gateway client and signature checks.
//!
//! Orders are created through the gateway's REST API. After checkout the
//! client returns `(order_id, payment_id, signature)` where the signature is
//! `hex(HMAC-SHA256(key_secret, order_id + "|" + payment_id))`.
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Orders minted locally when no gateway credentials are configured.
pub const TEST_ORDER_PREFIX: &str = "order_test_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> anyhow::Result<GatewayOrder>;

    /// Public key id handed to the checkout widget.
    fn key_id(&self) -> Option<&str>;
}

pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(base_url: &str, key_id: &str, key_secret: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        }
    }
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> anyhow::Result<GatewayOrder> {
        let order = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderBody {
                amount,
                currency,
                receipt,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<GatewayOrder>()
            .await?;
        log::info!("Created gateway order {} for {} {}", order.id, order.amount, order.currency);
        Ok(order)
    }

    fn key_id(&self) -> Option<&str> {
        Some(&self.key_id)
    }
}

/// Local stand-in used in development and tests. Its orders carry
/// [`TEST_ORDER_PREFIX`] and can only be settled through the test bypass.
#[derive(Default)]
pub struct TestGateway;

#[async_trait]
impl PaymentGateway for TestGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        _receipt: &str,
    ) -> anyhow::Result<GatewayOrder> {
        Ok(GatewayOrder {
            id: format!("{}{}", TEST_ORDER_PREFIX, Uuid::new_v4().simple()),
            amount,
            currency: currency.to_string(),
        })
    }

    fn key_id(&self) -> Option<&str> {
        None
    }
}

pub fn payment_signature(secret: &str, order_id: &str, payment_id: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| anyhow::anyhow!("invalid payment secret: {err}"))?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time comparison of a client-supplied signature with the expected one.
pub fn verify_payment_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> anyhow::Result<bool> {
    let expected = hex::decode(payment_signature(secret, order_id, payment_id)?)?;
    let Ok(actual) = hex::decode(signature.trim()) else {
        return Ok(false);
    };
    if expected.len() != actual.len() {
        return Ok(false);
    }
    Ok(expected.ct_eq(actual.as_slice()).into())
}

pub fn is_test_order(order_id: &str) -> bool {
    order_id.starts_with(TEST_ORDER_PREFIX)
}
