use serde::{Deserialize, Serialize};

/// A user's active right to use one purchased tool.
///
/// Keyed by `{user_id}_{tool_id}`; at most one row per pair exists, enforced
/// by a unique index and a keyed upsert. Expiry is informational - nothing in
/// this service sweeps expired rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    /// `{user_id}_{tool_id}`
    pub id: String,
    pub user_id: String,
    pub tool_id: String,
    pub status: EntitlementStatus,
    pub granted_by: GrantedBy,
    /// Order that paid for this grant; absent for admin grants.
    /// A reference only - the order is owned by the order store.
    pub order_id: Option<String>,
    pub activated_at: i64,
    pub expires_at: i64,
}

impl Entitlement {
    pub fn key(user_id: &str, tool_id: &str) -> String {
        format!("{}_{}", user_id, tool_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
    Active,
    Expired,
}

impl EntitlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

impl std::str::FromStr for EntitlementStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantedBy {
    Payment,
    Admin,
}

impl GrantedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Admin => "admin",
        }
    }
}

impl std::str::FromStr for GrantedBy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(Self::Payment),
            "admin" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

/// Input for the keyed entitlement upsert.
#[derive(Debug, Clone)]
pub struct UpsertEntitlement {
    pub user_id: String,
    pub tool_id: String,
    pub granted_by: GrantedBy,
    pub order_id: Option<String>,
    pub expires_at: i64,
}
