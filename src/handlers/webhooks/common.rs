//! Common webhook handling infrastructure for payment gateways.
//!
//! A trait-based approach unifies the Cashfree, Razorpay and PhonePe
//! handlers: each gateway supplies signature extraction, verification and
//! payload parsing, while the shared pipeline resolves the order and runs
//! the grant. Verification happens before anything touches the database -
//! a request with a bad signature must leave no trace.

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
};
use rusqlite::Connection;

use crate::db::{queries, AppState};
use crate::entitlements;
use crate::error::AppError;
use crate::models::Order;

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

/// Signature material pulled from request headers.
#[derive(Debug)]
pub struct WebhookSignature {
    pub signature: String,
    /// Only Cashfree sends a signed timestamp.
    pub timestamp: Option<String>,
}

/// How a payment notice identifies its order. Gateways differ: Razorpay
/// echoes its own order id, Cashfree and PhonePe echo ours.
#[derive(Debug)]
pub struct PaymentNotice {
    pub merchant_transaction_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub gateway_transaction_id: Option<String>,
    /// Captured amount in paise, when the gateway reports one.
    pub amount_minor: Option<i64>,
}

/// Parsed webhook payload in gateway-agnostic form.
#[derive(Debug)]
pub enum GatewayEvent {
    PaymentSucceeded(PaymentNotice),
    PaymentFailed {
        notice: PaymentNotice,
        reason: Option<String>,
    },
    /// Event type not relevant to order resolution
    Ignored,
}

/// Trait for payment gateway webhook handling.
pub trait WebhookGateway: Send + Sync {
    /// Gateway name for logging (e.g. "cashfree", "razorpay")
    fn gateway_name(&self) -> &'static str;

    /// Extract signature material from request headers.
    fn extract_signature(&self, headers: &HeaderMap) -> Result<WebhookSignature, WebhookResult>;

    /// Verify the payload against the gateway's signing secret.
    /// `Ok(false)` means the signature did not match; `Err` means the
    /// gateway is not configured or the payload is malformed.
    fn verify_signature(
        &self,
        state: &AppState,
        signature: &WebhookSignature,
        body: &Bytes,
    ) -> Result<bool, WebhookResult>;

    /// Parse the webhook payload into a gateway-agnostic event.
    fn parse_event(&self, body: &Bytes) -> Result<GatewayEvent, WebhookResult>;
}

/// Generic webhook pipeline shared by all gateways.
///
/// Order of operations is deliberate: extract, verify, then parse - only a
/// request that proves possession of the signing secret gets as far as a
/// database connection. Unknown orders get 200 so the gateway stops
/// retrying a notice we can never resolve.
pub async fn handle_webhook<G: WebhookGateway>(
    gateway: &G,
    state: &AppState,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    let signature = match gateway.extract_signature(&headers) {
        Ok(s) => s,
        Err(e) => return e,
    };

    match gateway.verify_signature(state, &signature, &body) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("{} webhook: invalid signature", gateway.gateway_name());
            return (StatusCode::UNAUTHORIZED, "Invalid signature");
        }
        Err(e) => return e,
    }

    let event = match gateway.parse_event(&body) {
        Ok(e) => e,
        Err(e) => return e,
    };

    match event {
        GatewayEvent::PaymentSucceeded(notice) => {
            handle_success(gateway, state, notice).unwrap_or_else(|e| e)
        }
        GatewayEvent::PaymentFailed { notice, reason } => {
            handle_failure(gateway, state, notice, reason).unwrap_or_else(|e| e)
        }
        GatewayEvent::Ignored => (StatusCode::OK, "Event ignored"),
    }
}

fn handle_success<G: WebhookGateway>(
    gateway: &G,
    state: &AppState,
    notice: PaymentNotice,
) -> Result<WebhookResult, WebhookResult> {
    let mut conn = state.db.get().map_err(db_err)?;

    let order = match resolve_order(gateway, &conn, &notice)? {
        Some(o) => o,
        None => return Ok((StatusCode::OK, "Order not found")),
    };

    // A capture for the wrong amount must not grant anything. The order is
    // left at `initiated`, where the reconciliation report surfaces it for
    // manual follow-up.
    if let Some(captured) = notice.amount_minor {
        let expected = order.amount.checked_mul(100);
        if expected != Some(captured) {
            tracing::error!(
                "{} webhook: amount mismatch for order={}: captured {} paise, expected {:?}",
                gateway.gateway_name(),
                order.id,
                captured,
                expected
            );
            return Ok((StatusCode::OK, "Amount mismatch"));
        }
    }

    match entitlements::grant_for_order(
        &mut conn,
        &order,
        notice.gateway_transaction_id.as_deref(),
    ) {
        Ok(entitlements::GrantOutcome::Granted { .. }) => {
            tracing::info!(
                "{} webhook: payment confirmed, order={}",
                gateway.gateway_name(),
                order.id
            );
            Ok((StatusCode::OK, "OK"))
        }
        Ok(entitlements::GrantOutcome::AlreadyGranted) => Ok((StatusCode::OK, "Already processed")),
        Err(AppError::Conflict(msg)) => {
            // Success notice for an order we already failed. Keep the failed
            // state and flag it; reconciliation or support takes it from here.
            tracing::warn!("{} webhook: {}", gateway.gateway_name(), msg);
            Ok((StatusCode::OK, "Order already resolved"))
        }
        Err(e) => {
            tracing::error!("{} webhook: grant failed: {}", gateway.gateway_name(), e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to grant access"))
        }
    }
}

fn handle_failure<G: WebhookGateway>(
    gateway: &G,
    state: &AppState,
    notice: PaymentNotice,
    reason: Option<String>,
) -> Result<WebhookResult, WebhookResult> {
    let conn = state.db.get().map_err(db_err)?;

    let order = match resolve_order(gateway, &conn, &notice)? {
        Some(o) => o,
        None => return Ok((StatusCode::OK, "Order not found")),
    };

    match queries::fail_order(&conn, &order.id) {
        Ok(true) => {
            tracing::info!(
                "{} webhook: payment failed, order={}, reason={:?}",
                gateway.gateway_name(),
                order.id,
                reason
            );
            Ok((StatusCode::OK, "OK"))
        }
        // Already completed or already failed - the failure notice is stale.
        Ok(false) => Ok((StatusCode::OK, "Order already resolved")),
        Err(e) => {
            tracing::error!("{} webhook: DB error: {}", gateway.gateway_name(), e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Database error"))
        }
    }
}

fn resolve_order<G: WebhookGateway>(
    gateway: &G,
    conn: &Connection,
    notice: &PaymentNotice,
) -> Result<Option<Order>, WebhookResult> {
    let found = if let Some(id) = &notice.merchant_transaction_id {
        queries::get_order_by_id(conn, id)
    } else if let Some(gw_id) = &notice.gateway_order_id {
        queries::get_order_by_gateway_order_id(conn, gateway.gateway_name(), gw_id)
    } else {
        tracing::warn!(
            "{} webhook: notice carries no order reference",
            gateway.gateway_name()
        );
        return Ok(None);
    };

    match found {
        Ok(Some(order)) => Ok(Some(order)),
        Ok(None) => {
            tracing::warn!(
                "{} webhook: no order for notice {:?}",
                gateway.gateway_name(),
                notice
            );
            Ok(None)
        }
        Err(e) => {
            tracing::error!("{} webhook: DB error: {}", gateway.gateway_name(), e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Database error"))
        }
    }
}

fn db_err(e: r2d2::Error) -> WebhookResult {
    tracing::error!("DB connection error: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
}
