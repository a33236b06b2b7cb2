//! Checkout: create a local order, then its remote counterpart.
//!
//! The local row is written before the gateway call on purpose. If the
//! remote create fails the order sits at `initiated` with no gateway ref,
//! which reconciliation will surface; the reverse ordering could take
//! money against an order we never recorded.

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::gateways::{
    cashfree::CashfreeClient, phonepe::PhonePeClient, razorpay::RazorpayClient, Gateway,
    GatewayCustomer, GatewayOrder,
};
use crate::models::{CreateOrder, OrderStatus};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub tool_ids: Vec<String>,
    pub gateway: String,
    /// Client-supplied id for retry-safe checkout; generated when absent.
    pub merchant_transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub merchant_transaction_id: String,
    pub gateway: String,
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_order_id: Option<String>,
    /// Payment page URL (or session token, for Cashfree) the client opens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

pub async fn checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let gateway: Gateway = req
        .gateway
        .parse()
        .map_err(|_| AppError::InvalidArgument(format!("Unknown gateway: {}", req.gateway)))?;
    if req.tool_ids.is_empty() {
        return Err(AppError::InvalidArgument("tool_ids must not be empty".into()));
    }

    let conn = state.db.get()?;

    let user = queries::get_user_by_id(&conn, &req.user_id)?
        .or_invalid_argument("Unknown user")?;

    // Price comes from the catalog, never from the client.
    let mut amount: i64 = 0;
    for tool_id in &req.tool_ids {
        let tool = queries::get_tool_by_id(&conn, tool_id)?
            .or_invalid_argument("Unknown tool")?;
        if !tool.active {
            return Err(AppError::InvalidArgument(format!(
                "Tool not available: {}",
                tool_id
            )));
        }
        amount = amount
            .checked_add(tool.monthly_price)
            .ok_or_else(|| AppError::InvalidArgument("Order amount overflow".into()))?;
    }

    let order_id = req
        .merchant_transaction_id
        .clone()
        .unwrap_or_else(|| merchant_transaction_id(&req.user_id, &req.tool_ids[0]));

    // Retry-safe: re-posting an initiated order does not create a second
    // remote order; a resolved order cannot be re-opened.
    if let Some(existing) = queries::get_order_by_id(&conn, &order_id)? {
        // A client-supplied id only resumes the caller's own checkout.
        if existing.user_id != req.user_id {
            return Err(AppError::PermissionDenied(format!(
                "Order {} belongs to another user",
                existing.id
            )));
        }
        if existing.gateway != gateway.as_str() || existing.tool_ids != req.tool_ids {
            return Err(AppError::InvalidArgument(format!(
                "Order {} was initiated with different parameters",
                existing.id
            )));
        }
        match existing.status {
            OrderStatus::Initiated if existing.gateway_order_id.is_some() => {
                return Ok(Json(CheckoutResponse {
                    merchant_transaction_id: existing.id,
                    gateway: existing.gateway,
                    amount: existing.amount,
                    currency: existing.currency,
                    gateway_order_id: existing.gateway_order_id,
                    redirect: None,
                }));
            }
            OrderStatus::Initiated => {
                // Local row exists but the remote create never landed;
                // fall through and retry the gateway call below.
            }
            _ => {
                return Err(AppError::Conflict(format!(
                    "Order {} already {}",
                    existing.id,
                    existing.status.as_str()
                )));
            }
        }
    } else {
        queries::create_order(
            &conn,
            &CreateOrder {
                id: order_id.clone(),
                user_id: req.user_id.clone(),
                tool_ids: req.tool_ids.clone(),
                amount,
                currency: "INR".to_string(),
                gateway: gateway.as_str().to_string(),
            },
        )?;
    }

    let customer = GatewayCustomer {
        id: user.id.clone(),
        email: Some(user.email.clone()),
        phone: user.phone.clone(),
    };
    let remote = create_remote_order(&state, gateway, &order_id, amount, &customer).await?;

    queries::set_order_gateway_ref(&conn, &order_id, &remote.gateway_order_id)?;

    tracing::info!(
        "checkout: order={}, user={}, gateway={}, amount={} INR",
        order_id,
        req.user_id,
        gateway,
        amount
    );

    Ok(Json(CheckoutResponse {
        merchant_transaction_id: order_id,
        gateway: gateway.as_str().to_string(),
        amount,
        currency: "INR".to_string(),
        gateway_order_id: Some(remote.gateway_order_id),
        redirect: Some(remote.redirect),
    }))
}

async fn create_remote_order(
    state: &AppState,
    gateway: Gateway,
    order_id: &str,
    amount: i64,
    customer: &GatewayCustomer,
) -> Result<GatewayOrder> {
    let return_url = format!("{}/payment/return?order_id={}", state.base_url, order_id);
    match gateway {
        Gateway::Cashfree => {
            let config = state
                .cashfree
                .as_ref()
                .ok_or_else(|| AppError::Gateway("Cashfree not configured".into()))?;
            CashfreeClient::new(config)
                .create_order(
                    order_id,
                    amount,
                    "INR",
                    customer,
                    &return_url,
                    &format!("{}/webhook/cashfree", state.base_url),
                )
                .await
        }
        Gateway::Razorpay => {
            let config = state
                .razorpay
                .as_ref()
                .ok_or_else(|| AppError::Gateway("Razorpay not configured".into()))?;
            RazorpayClient::new(config)
                .create_order(order_id, &customer.id, amount, "INR")
                .await
        }
        Gateway::PhonePe => {
            let config = state
                .phonepe
                .as_ref()
                .ok_or_else(|| AppError::Gateway("PhonePe not configured".into()))?;
            PhonePeClient::new(config)
                .create_order(
                    order_id,
                    &customer.id,
                    amount,
                    &return_url,
                    &format!("{}/webhook/phonepe", state.base_url),
                )
                .await
        }
    }
}

/// `ord_{user}_{tool}_{millis}` - stable, human-greppable, unique enough
/// when combined with the retry-safe create above.
fn merchant_transaction_id(user_id: &str, tool_id: &str) -> String {
    format!(
        "ord_{}_{}_{}",
        user_id,
        tool_id,
        chrono::Utc::now().timestamp_millis()
    )
}
