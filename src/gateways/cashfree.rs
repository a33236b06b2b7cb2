use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::config::CashfreeConfig;
use crate::error::{AppError, Result};

use super::{GatewayCustomer, GatewayOrder, PaymentState};

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2023-08-01";

// Cashfree bills in the major unit (rupees); the integer amount goes on the
// wire as-is. Razorpay and PhonePe are the paise gateways.

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    order_id: &'a str,
    order_amount: i64,
    order_currency: &'a str,
    customer_details: CustomerDetails<'a>,
    order_meta: OrderMeta<'a>,
}

#[derive(Debug, Serialize)]
struct CustomerDetails<'a> {
    customer_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_email: Option<&'a str>,
    customer_phone: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderMeta<'a> {
    return_url: &'a str,
    notify_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    cf_order_id: String,
    payment_session_id: String,
}

#[derive(Debug, Deserialize)]
struct OrderStatusResponse {
    order_status: String,
}

#[derive(Debug, Clone)]
pub struct CashfreeClient {
    client: Client,
    client_id: String,
    client_secret: String,
    api_base: String,
}

impl CashfreeClient {
    pub fn new(config: &CashfreeConfig) -> Self {
        Self {
            client: Client::new(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            api_base: config.api_base.clone(),
        }
    }

    /// Create a Cashfree order. The returned session id is what the hosted
    /// checkout page consumes on the client side.
    pub async fn create_order(
        &self,
        order_id: &str,
        amount: i64,
        currency: &str,
        customer: &GatewayCustomer,
        return_url: &str,
        notify_url: &str,
    ) -> Result<GatewayOrder> {
        let request = CreateOrderRequest {
            order_id,
            order_amount: amount,
            order_currency: currency,
            customer_details: CustomerDetails {
                customer_id: &customer.id,
                customer_email: customer.email.as_deref(),
                customer_phone: customer.phone.as_deref().unwrap_or(""),
            },
            order_meta: OrderMeta {
                return_url,
                notify_url,
            },
        };

        let response = self
            .client
            .post(format!("{}/orders", self.api_base))
            .header("x-client-id", &self.client_id)
            .header("x-client-secret", &self.client_secret)
            .header("x-api-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Cashfree API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!("Cashfree API error: {}", error_text)));
        }

        let created: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse Cashfree response: {}", e)))?;

        Ok(GatewayOrder {
            gateway_order_id: created.cf_order_id,
            redirect: created.payment_session_id,
        })
    }

    /// Server-to-server order status, used by the verify endpoint when the
    /// webhook has not arrived yet.
    pub async fn fetch_order_state(&self, order_id: &str) -> Result<PaymentState> {
        let response = self
            .client
            .get(format!("{}/orders/{}", self.api_base, order_id))
            .header("x-client-id", &self.client_id)
            .header("x-client-secret", &self.client_secret)
            .header("x-api-version", API_VERSION)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Cashfree API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Gateway(format!("Cashfree API error: {}", error_text)));
        }

        let status: OrderStatusResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse Cashfree response: {}", e)))?;

        Ok(match status.order_status.as_str() {
            "PAID" => PaymentState::Success,
            "EXPIRED" | "TERMINATED" => PaymentState::Failed,
            _ => PaymentState::Pending,
        })
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    /// Verify the `x-webhook-signature` header:
    /// `base64(HMAC-SHA256(timestamp + raw_body))` keyed by the client secret.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        timestamp: &str,
        signature: &str,
    ) -> Result<bool> {
        // Reject stale timestamps to bound replays.
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| AppError::InvalidArgument("Invalid webhook timestamp".into()))?;
        let age = chrono::Utc::now().timestamp() - ts;
        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Cashfree webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }
        if age < -60 {
            tracing::warn!("Cashfree webhook rejected: timestamp in the future (age={}s)", age);
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(self.client_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(timestamp.as_bytes());
        mac.update(payload);
        let expected = BASE64.encode(mac.finalize().into_bytes());

        // Constant-time comparison; signature length is not secret.
        let expected_bytes = expected.as_bytes();
        let provided_bytes = signature.as_bytes();
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }
        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

/// Typed Cashfree webhook envelope (2023-08-01 schema). Anything that does
/// not deserialize into this is rejected at the boundary instead of being
/// probed field-by-field downstream.
#[derive(Debug, Deserialize)]
pub struct CashfreeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: CashfreeWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct CashfreeWebhookData {
    pub order: CashfreeWebhookOrder,
    pub payment: Option<CashfreeWebhookPayment>,
}

#[derive(Debug, Deserialize)]
pub struct CashfreeWebhookOrder {
    pub order_id: String,
    /// Rupees, possibly fractional on the wire
    pub order_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CashfreeWebhookPayment {
    pub cf_payment_id: Option<serde_json::Number>,
    pub payment_status: String,
}
