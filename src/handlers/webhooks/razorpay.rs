//! Razorpay webhook handler.
//!
//! Razorpay signs the raw body with the dedicated webhook secret (hex
//! HMAC-SHA256 in `x-razorpay-signature`). Payment events reference the
//! Razorpay order id; our merchant transaction id rides along in the
//! order notes when present.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::AppState;
use crate::gateways::razorpay::{RazorpayClient, RazorpayWebhookEvent};

use super::common::{
    handle_webhook, GatewayEvent, PaymentNotice, WebhookGateway, WebhookResult, WebhookSignature,
};

pub struct RazorpayWebhook;

impl WebhookGateway for RazorpayWebhook {
    fn gateway_name(&self) -> &'static str {
        "razorpay"
    }

    fn extract_signature(&self, headers: &HeaderMap) -> Result<WebhookSignature, WebhookResult> {
        let signature = headers
            .get("x-razorpay-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::BAD_REQUEST, "Missing signature header"))?
            .to_string();
        Ok(WebhookSignature {
            signature,
            timestamp: None,
        })
    }

    fn verify_signature(
        &self,
        state: &AppState,
        signature: &WebhookSignature,
        body: &Bytes,
    ) -> Result<bool, WebhookResult> {
        let config = state
            .razorpay
            .as_ref()
            .ok_or((StatusCode::OK, "Gateway not configured"))?;

        RazorpayClient::new(config)
            .verify_webhook_signature(body, &signature.signature)
            .map_err(|e| {
                tracing::warn!("Razorpay signature check failed: {}", e);
                (StatusCode::BAD_REQUEST, "Malformed signature")
            })
    }

    fn parse_event(&self, body: &Bytes) -> Result<GatewayEvent, WebhookResult> {
        let event: RazorpayWebhookEvent = serde_json::from_slice(body).map_err(|e| {
            tracing::warn!("Failed to parse Razorpay webhook: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid payload")
        })?;

        let entity = &event.payload.payment.entity;
        let notice = PaymentNotice {
            merchant_transaction_id: entity.notes.merchant_transaction_id.clone(),
            gateway_order_id: Some(entity.order_id.clone()),
            gateway_transaction_id: Some(entity.id.clone()),
            amount_minor: Some(entity.amount),
        };

        Ok(match event.event.as_str() {
            "payment.captured" => GatewayEvent::PaymentSucceeded(notice),
            "payment.failed" => GatewayEvent::PaymentFailed {
                notice,
                reason: Some(entity.status.clone()),
            },
            other => {
                tracing::debug!("Ignoring Razorpay event type: {}", other);
                GatewayEvent::Ignored
            }
        })
    }
}

pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    handle_webhook(&RazorpayWebhook, &state, headers, body).await
}
