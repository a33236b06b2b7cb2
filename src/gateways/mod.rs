pub mod cashfree;
pub mod phonepe;
pub mod razorpay;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gateway {
    Cashfree,
    Razorpay,
    PhonePe,
}

impl Gateway {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cashfree => "cashfree",
            Self::Razorpay => "razorpay",
            Self::PhonePe => "phonepe",
        }
    }
}

impl std::str::FromStr for Gateway {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cashfree" => Ok(Self::Cashfree),
            "razorpay" => Ok(Self::Razorpay),
            "phonepe" => Ok(Self::PhonePe),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Customer details forwarded to the gateway at order creation.
#[derive(Debug, Clone)]
pub struct GatewayCustomer {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Result of creating a remote order: the gateway's order id plus whatever
/// the client needs to proceed (a hosted-page URL or a session token).
#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
    pub redirect: String,
}

/// Final payment state as reported by a gateway status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Success,
    Pending,
    Failed,
}

/// Convert a whole-rupee amount to paise.
///
/// Exact integer arithmetic only - a float round-trip here would corrupt
/// real money. Overflow is a hard error, not a wrap.
pub fn to_minor_units(amount: i64) -> Result<i64> {
    if amount < 0 {
        return Err(AppError::InvalidArgument("amount must be non-negative".into()));
    }
    amount
        .checked_mul(100)
        .ok_or_else(|| AppError::InvalidArgument("amount too large".into()))
}
