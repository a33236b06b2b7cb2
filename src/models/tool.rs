use serde::{Deserialize, Serialize};

/// A resold premium tool in the storefront catalog (ChatGPT Plus, Canva Pro,
/// SEMrush, ...). Pricing is an integer rupee amount; gateways that bill in
/// paise get the converted value from the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    /// Monthly price in whole rupees (major unit)
    pub monthly_price: i64,
    pub active: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateTool {
    pub id: String,
    pub name: String,
    pub monthly_price: i64,
}
