use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::RazorpayConfig;
use crate::error::{AppError, Result};

use super::{to_minor_units, GatewayOrder};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    /// Paise - Razorpay bills in the minor unit
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: OrderNotes<'a>,
}

/// The merchant transaction id rides in the notes so webhooks can be
/// correlated without a gateway-order-id lookup.
#[derive(Debug, Serialize)]
struct OrderNotes<'a> {
    merchant_transaction_id: &'a str,
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    id: String,
}

#[derive(Debug, Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: String,
    webhook_secret: String,
}

impl RazorpayClient {
    pub fn new(config: &RazorpayConfig) -> Self {
        Self {
            client: Client::new(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Create a Razorpay order. The returned id (`order_xxx`) seeds the
    /// client-side checkout widget; there is no hosted redirect URL.
    pub async fn create_order(
        &self,
        merchant_transaction_id: &str,
        user_id: &str,
        amount: i64,
        currency: &str,
    ) -> Result<GatewayOrder> {
        let request = CreateOrderRequest {
            amount: to_minor_units(amount)?,
            currency,
            receipt: merchant_transaction_id,
            notes: OrderNotes {
                merchant_transaction_id,
                user_id,
            },
        };

        let response = self
            .client
            .post("https://api.razorpay.com/v1/orders")
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Razorpay API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!("Razorpay API error: {}", error_text)));
        }

        let created: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse Razorpay response: {}", e)))?;

        let gateway_order_id = created.id;
        Ok(GatewayOrder {
            redirect: gateway_order_id.clone(),
            gateway_order_id,
        })
    }

    /// Verify the checkout-callback signature the client hands to /verify:
    /// hex `HMAC-SHA256("{order_id}|{payment_id}")` keyed by the key secret.
    pub fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool> {
        let signed_payload = format!("{}|{}", gateway_order_id, payment_id);
        self.verify_hmac(&self.key_secret, signed_payload.as_bytes(), signature)
    }

    /// Verify the `x-razorpay-signature` webhook header: hex HMAC-SHA256
    /// over the raw body, keyed by the webhook secret.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        self.verify_hmac(&self.webhook_secret, payload, signature)
    }

    fn verify_hmac(&self, secret: &str, payload: &[u8], signature: &str) -> Result<bool> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid signing secret".into()))?;
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison; signature length is not secret.
        let expected_bytes = expected.as_bytes();
        let provided_bytes = signature.as_bytes();
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }
        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

/// Typed Razorpay webhook envelope.
#[derive(Debug, Deserialize)]
pub struct RazorpayWebhookEvent {
    pub event: String,
    pub payload: RazorpayWebhookPayload,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayWebhookPayload {
    pub payment: RazorpayPaymentWrapper,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayPaymentWrapper {
    pub entity: RazorpayPaymentEntity,
}

#[derive(Debug, Deserialize)]
pub struct RazorpayPaymentEntity {
    pub id: String,
    pub order_id: String,
    pub status: String,
    /// Paise
    pub amount: i64,
    #[serde(default, deserialize_with = "deserialize_notes")]
    pub notes: RazorpayNotes,
}

/// Razorpay serializes empty notes as `[]` instead of `{}`; fall back to the
/// default rather than failing the whole event on that quirk.
fn deserialize_notes<'de, D>(deserializer: D) -> std::result::Result<RazorpayNotes, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
pub struct RazorpayNotes {
    pub merchant_transaction_id: Option<String>,
    pub user_id: Option<String>,
}
