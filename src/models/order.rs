use serde::{Deserialize, Serialize};

/// An order keyed by the merchant transaction id. Created when checkout
/// starts, moved to a terminal state exactly once, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Merchant transaction id (e.g. `ord_u1_tool1_1000`)
    pub id: String,
    pub user_id: String,
    /// Tools in this checkout; a bundle purchase carries several
    pub tool_ids: Vec<String>,
    /// Whole rupees (major unit)
    pub amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub gateway: String,
    /// Remote order id returned by the gateway at create time
    pub gateway_order_id: Option<String>,
    /// Gateway payment/transaction id captured at confirmation time
    pub gateway_transaction_id: Option<String>,
    /// Set by the reconciliation job when it completes an order whose
    /// confirmation was lost
    pub repaired: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    pub id: String,
    pub user_id: String,
    pub tool_ids: Vec<String>,
    pub amount: i64,
    pub currency: String,
    pub gateway: String,
}

/// Legal transitions: `initiated -> completed`, `initiated -> failed`.
/// Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Initiated,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
