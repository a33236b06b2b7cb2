//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Parse a TEXT column holding a JSON array of strings.
fn parse_json_list(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw).map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, phone, created_at";

pub const TOOL_COLS: &str = "id, name, monthly_price, active, created_at";

pub const ORDER_COLS: &str = "id, user_id, tool_ids, amount, currency, status, gateway, gateway_order_id, gateway_transaction_id, repaired, created_at, updated_at";

pub const ENTITLEMENT_COLS: &str =
    "id, user_id, tool_id, status, granted_by, order_id, activated_at, expires_at";

pub const PAYMENT_RECORD_COLS: &str =
    "id, order_id, user_id, tool_ids, amount, currency, gateway, gateway_transaction_id, created_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            phone: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Tool {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Tool {
            id: row.get(0)?,
            name: row.get(1)?,
            monthly_price: row.get(2)?,
            active: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            id: row.get(0)?,
            user_id: row.get(1)?,
            tool_ids: parse_json_list(row, 2, "tool_ids")?,
            amount: row.get(3)?,
            currency: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            gateway: row.get(6)?,
            gateway_order_id: row.get(7)?,
            gateway_transaction_id: row.get(8)?,
            repaired: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

impl FromRow for Entitlement {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Entitlement {
            id: row.get(0)?,
            user_id: row.get(1)?,
            tool_id: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            granted_by: parse_enum(row, 4, "granted_by")?,
            order_id: row.get(5)?,
            activated_at: row.get(6)?,
            expires_at: row.get(7)?,
        })
    }
}

impl FromRow for PaymentRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentRecord {
            id: row.get(0)?,
            order_id: row.get(1)?,
            user_id: row.get(2)?,
            tool_ids: parse_json_list(row, 3, "tool_ids")?,
            amount: row.get(4)?,
            currency: row.get(5)?,
            gateway: row.get(6)?,
            gateway_transaction_id: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}
