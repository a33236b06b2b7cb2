//! Cashfree webhook handler.
//!
//! Cashfree signs `timestamp + raw_body` with the client secret and sends
//! the result base64-encoded in `x-webhook-signature`, plus the timestamp
//! in `x-webhook-timestamp`. The order id in the payload is our merchant
//! transaction id.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::AppState;
use crate::gateways::cashfree::{CashfreeClient, CashfreeWebhookEvent};

use super::common::{
    handle_webhook, GatewayEvent, PaymentNotice, WebhookGateway, WebhookResult, WebhookSignature,
};

pub struct CashfreeWebhook;

impl WebhookGateway for CashfreeWebhook {
    fn gateway_name(&self) -> &'static str {
        "cashfree"
    }

    fn extract_signature(&self, headers: &HeaderMap) -> Result<WebhookSignature, WebhookResult> {
        let signature = headers
            .get("x-webhook-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::BAD_REQUEST, "Missing signature header"))?
            .to_string();
        let timestamp = headers
            .get("x-webhook-timestamp")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::BAD_REQUEST, "Missing timestamp header"))?
            .to_string();
        Ok(WebhookSignature {
            signature,
            timestamp: Some(timestamp),
        })
    }

    fn verify_signature(
        &self,
        state: &AppState,
        signature: &WebhookSignature,
        body: &Bytes,
    ) -> Result<bool, WebhookResult> {
        let config = state
            .cashfree
            .as_ref()
            .ok_or((StatusCode::OK, "Gateway not configured"))?;
        let timestamp = signature
            .timestamp
            .as_deref()
            .ok_or((StatusCode::BAD_REQUEST, "Missing timestamp header"))?;

        CashfreeClient::new(config)
            .verify_webhook_signature(body, timestamp, &signature.signature)
            .map_err(|e| {
                tracing::warn!("Cashfree signature check failed: {}", e);
                (StatusCode::BAD_REQUEST, "Malformed signature")
            })
    }

    fn parse_event(&self, body: &Bytes) -> Result<GatewayEvent, WebhookResult> {
        let event: CashfreeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
            tracing::warn!("Failed to parse Cashfree webhook: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid payload")
        })?;

        let notice = PaymentNotice {
            merchant_transaction_id: Some(event.data.order.order_id.clone()),
            gateway_order_id: None,
            gateway_transaction_id: event
                .data
                .payment
                .as_ref()
                .and_then(|p| p.cf_payment_id.as_ref())
                .map(|id| id.to_string()),
            amount_minor: event
                .data
                .order
                .order_amount
                .map(|rupees| (rupees * 100.0).round() as i64),
        };

        Ok(match event.event_type.as_str() {
            "PAYMENT_SUCCESS_WEBHOOK" => GatewayEvent::PaymentSucceeded(notice),
            "PAYMENT_FAILED_WEBHOOK" => GatewayEvent::PaymentFailed {
                notice,
                reason: event.data.payment.map(|p| p.payment_status),
            },
            other => {
                tracing::debug!("Ignoring Cashfree event type: {}", other);
                GatewayEvent::Ignored
            }
        })
    }
}

pub async fn cashfree_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    handle_webhook(&CashfreeWebhook, &state, headers, body).await
}
