//! PhonePe webhook handler.
//!
//! PhonePe posts `{"response": base64(json)}` with an `X-VERIFY` header of
//! `sha256(base64_response + salt_key) + "###" + salt_index`. The checksum
//! covers the still-encoded response field, so verification decodes the
//! envelope itself rather than hashing the raw body.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::AppState;
use crate::gateways::phonepe::{self, PhonePeClient};

use super::common::{
    handle_webhook, GatewayEvent, PaymentNotice, WebhookGateway, WebhookResult, WebhookSignature,
};

pub struct PhonePeWebhook;

impl WebhookGateway for PhonePeWebhook {
    fn gateway_name(&self) -> &'static str {
        "phonepe"
    }

    fn extract_signature(&self, headers: &HeaderMap) -> Result<WebhookSignature, WebhookResult> {
        let signature = headers
            .get("x-verify")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::BAD_REQUEST, "Missing X-VERIFY header"))?
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
            .phonepe
            .as_ref()
            .ok_or((StatusCode::OK, "Gateway not configured"))?;

        let (base64_response, _) = phonepe::decode_webhook_body(body).map_err(|e| {
            tracing::warn!("Failed to decode PhonePe webhook: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid payload")
        })?;
        PhonePeClient::new(config)
            .verify_webhook_signature(&base64_response, &signature.signature)
            .map_err(|e| {
                tracing::warn!("PhonePe signature check failed: {}", e);
                (StatusCode::BAD_REQUEST, "Malformed signature")
            })
    }

    fn parse_event(&self, body: &Bytes) -> Result<GatewayEvent, WebhookResult> {
        let (_, callback) = phonepe::decode_webhook_body(body).map_err(|e| {
            tracing::warn!("Failed to decode PhonePe webhook: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid payload")
        })?;

        let Some(data) = callback.data else {
            tracing::debug!("Ignoring PhonePe callback without data: {}", callback.code);
            return Ok(GatewayEvent::Ignored);
        };

        let notice = PaymentNotice {
            merchant_transaction_id: Some(data.merchant_transaction_id),
            gateway_order_id: None,
            gateway_transaction_id: data.transaction_id,
            amount_minor: data.amount,
        };

        Ok(match callback.code.as_str() {
            "PAYMENT_SUCCESS" => GatewayEvent::PaymentSucceeded(notice),
            // Pending means PhonePe will call again; no state change yet.
            "PAYMENT_PENDING" => GatewayEvent::Ignored,
            _ => GatewayEvent::PaymentFailed {
                notice,
                reason: data.state.or_else(|| Some(callback.code.clone())),
            },
        })
    }
}

pub async fn phonepe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    handle_webhook(&PhonePeWebhook, &state, headers, body).await
}
