//! Client-initiated payment verification.
//!
//! The browser return leg is untrusted: Razorpay hands the client a
//! signature we can check locally, Cashfree and PhonePe give us nothing,
//! so those go server-to-server for the authoritative state. Either way
//! the Entitlement Writer is the only path that grants.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::entitlements::{self, GrantOutcome};
use crate::error::{AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::gateways::{
    cashfree::CashfreeClient, phonepe::PhonePeClient, razorpay::RazorpayClient, Gateway,
    PaymentState,
};
use crate::models::{Entitlement, Order, OrderStatus};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub merchant_transaction_id: String,
    /// Razorpay checkout callback fields; other gateways omit them.
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<Vec<Entitlement>>,
}

pub async fn verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &req.merchant_transaction_id)?
        .or_not_found("Order not found")?;
    drop(conn);

    // Re-verify of a resolved order is a read, not a mutation.
    match order.status {
        OrderStatus::Completed => return respond_resolved(&state, &order, true, OrderStatus::Completed),
        OrderStatus::Failed => return respond_resolved(&state, &order, false, OrderStatus::Failed),
        OrderStatus::Initiated => {}
    }

    let gateway: Gateway = order
        .gateway
        .parse()
        .map_err(|_| AppError::Internal(format!("Order {} has unknown gateway", order.id)))?;

    let (payment_state, gateway_transaction_id) =
        confirm_with_gateway(&state, gateway, &order, &req).await?;

    match payment_state {
        PaymentState::Success => {
            let mut conn = state.db.get()?;
            match entitlements::grant_for_order(&mut conn, &order, gateway_transaction_id.as_deref())? {
                GrantOutcome::Granted { entitlements } => Ok(Json(VerifyResponse {
                    success: true,
                    status: OrderStatus::Completed.as_str().to_string(),
                    entitlements: Some(entitlements),
                })),
                // A webhook got there first; report the settled state.
                GrantOutcome::AlreadyGranted => {
                    respond_resolved(&state, &order, true, OrderStatus::Completed)
                }
            }
        }
        PaymentState::Failed => {
            let conn = state.db.get()?;
            queries::fail_order(&conn, &order.id)?;
            Ok(Json(VerifyResponse {
                success: false,
                status: OrderStatus::Failed.as_str().to_string(),
                entitlements: None,
            }))
        }
        PaymentState::Pending => Ok(Json(VerifyResponse {
            success: false,
            status: OrderStatus::Initiated.as_str().to_string(),
            entitlements: None,
        })),
    }
}

async fn confirm_with_gateway(
    state: &AppState,
    gateway: Gateway,
    order: &Order,
    req: &VerifyRequest,
) -> Result<(PaymentState, Option<String>)> {
    match gateway {
        Gateway::Razorpay => {
            let config = state
                .razorpay
                .as_ref()
                .ok_or_else(|| AppError::Gateway("Razorpay not configured".into()))?;
            let payment_id = req
                .payment_id
                .as_deref()
                .or_invalid_argument("payment_id required for Razorpay verification")?;
            let signature = req
                .signature
                .as_deref()
                .or_invalid_argument("signature required for Razorpay verification")?;
            let gateway_order_id = order
                .gateway_order_id
                .as_deref()
                .ok_or_else(|| AppError::Conflict("Order has no gateway reference".into()))?;

            let ok = RazorpayClient::new(config).verify_payment_signature(
                gateway_order_id,
                payment_id,
                signature,
            )?;
            if !ok {
                tracing::warn!("verify: bad Razorpay signature for order {}", order.id);
                return Err(AppError::Unauthenticated);
            }
            Ok((PaymentState::Success, Some(payment_id.to_string())))
        }
        Gateway::Cashfree => {
            let config = state
                .cashfree
                .as_ref()
                .ok_or_else(|| AppError::Gateway("Cashfree not configured".into()))?;
            let payment_state = CashfreeClient::new(config).fetch_order_state(&order.id).await?;
            Ok((payment_state, None))
        }
        Gateway::PhonePe => {
            let config = state
                .phonepe
                .as_ref()
                .ok_or_else(|| AppError::Gateway("PhonePe not configured".into()))?;
            PhonePeClient::new(config).fetch_order_state(&order.id).await
        }
    }
}

fn respond_resolved(
    state: &AppState,
    order: &Order,
    success: bool,
    status: OrderStatus,
) -> Result<Json<VerifyResponse>> {
    let entitlements = if success {
        let conn = state.db.get()?;
        let all = queries::list_entitlements_for_user(&conn, &order.user_id)?;
        Some(
            all.into_iter()
                .filter(|e| order.tool_ids.contains(&e.tool_id))
                .collect(),
        )
    } else {
        None
    };
    Ok(Json(VerifyResponse {
        success,
        status: status.as_str().to_string(),
        entitlements,
    }))
}
