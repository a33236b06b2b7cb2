use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Optional phone, passed through to gateways that require it (Cashfree)
    pub phone: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}
