//! Read-side endpoints: order polling and entitlement discovery.

use axum::extract::State;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{OptionExt, Result};
use crate::extractors::{Json, Path};
use crate::models::{Entitlement, Order, PaymentRecord};

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub payments: Vec<PaymentRecord>,
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>> {
    let conn = state.db.get()?;
    let order = queries::get_order_by_id(&conn, &id)?.or_not_found("Order not found")?;
    let payments = queries::list_payment_records_for_order(&conn, &order.id)?;
    Ok(Json(OrderResponse { order, payments }))
}

#[derive(Debug, Serialize)]
pub struct EntitlementsResponse {
    pub user_id: String,
    pub entitlements: Vec<Entitlement>,
}

pub async fn list_user_entitlements(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<EntitlementsResponse>> {
    let conn = state.db.get()?;
    let entitlements = queries::list_entitlements_for_user(&conn, &user_id)?;
    Ok(Json(EntitlementsResponse {
        user_id,
        entitlements,
    }))
}
