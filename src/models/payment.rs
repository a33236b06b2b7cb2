use serde::{Deserialize, Serialize};

/// Append-only record of a confirmed payment. Written in the same
/// transaction as the order completion and entitlement upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub tool_ids: Vec<String>,
    pub amount: i64,
    pub currency: String,
    pub gateway: String,
    pub gateway_transaction_id: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRecord {
    pub order_id: String,
    pub user_id: String,
    pub tool_ids: Vec<String>,
    pub amount: i64,
    pub currency: String,
    pub gateway: String,
    pub gateway_transaction_id: Option<String>,
}
