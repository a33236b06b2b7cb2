use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    query_all, query_one, ENTITLEMENT_COLS, ORDER_COLS, PAYMENT_RECORD_COLS, TOOL_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&input.id, &email, &input.name, &input.phone, now],
    )?;

    Ok(User {
        id: input.id.clone(),
        email,
        name: input.name.clone(),
        phone: input.phone.clone(),
        created_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

// ============ Tools ============

pub fn create_tool(conn: &Connection, input: &CreateTool) -> Result<Tool> {
    let now = now();

    conn.execute(
        "INSERT INTO tools (id, name, monthly_price, active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        params![&input.id, &input.name, input.monthly_price, now],
    )?;

    Ok(Tool {
        id: input.id.clone(),
        name: input.name.clone(),
        monthly_price: input.monthly_price,
        active: true,
        created_at: now,
    })
}

pub fn get_tool_by_id(conn: &Connection, id: &str) -> Result<Option<Tool>> {
    query_one(
        conn,
        &format!("SELECT {} FROM tools WHERE id = ?1", TOOL_COLS),
        &[&id],
    )
}

pub fn list_tools(conn: &Connection) -> Result<Vec<Tool>> {
    query_all(
        conn,
        &format!("SELECT {} FROM tools WHERE active = 1 ORDER BY id", TOOL_COLS),
        &[],
    )
}

// ============ Orders ============

pub fn create_order(conn: &Connection, input: &CreateOrder) -> Result<Order> {
    let now = now();
    let tool_ids_json = serde_json::to_string(&input.tool_ids)?;

    conn.execute(
        "INSERT INTO orders (id, user_id, tool_ids, amount, currency, status, gateway, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'initiated', ?6, ?7, ?7)",
        params![
            &input.id,
            &input.user_id,
            &tool_ids_json,
            input.amount,
            &input.currency,
            &input.gateway,
            now
        ],
    )
    .map_err(|e| match e {
        // Two concurrent checkouts with the same id: the loser gets a 409,
        // not a 500.
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            AppError::Conflict(format!("Order {} already exists", input.id))
        }
        other => AppError::Database(other),
    })?;

    Ok(Order {
        id: input.id.clone(),
        user_id: input.user_id.clone(),
        tool_ids: input.tool_ids.clone(),
        amount: input.amount,
        currency: input.currency.clone(),
        status: OrderStatus::Initiated,
        gateway: input.gateway.clone(),
        gateway_order_id: None,
        gateway_transaction_id: None,
        repaired: false,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_order_by_id(conn: &Connection, id: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLS),
        &[&id],
    )
}

/// Look up an order by the gateway's own order id. Used when a webhook only
/// carries the remote id (Razorpay's `payment.entity.order_id`).
pub fn get_order_by_gateway_order_id(
    conn: &Connection,
    gateway: &str,
    gateway_order_id: &str,
) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM orders WHERE gateway = ?1 AND gateway_order_id = ?2",
            ORDER_COLS
        ),
        &[&gateway, &gateway_order_id],
    )
}

/// Record the remote order id and redirect target after gateway order creation.
pub fn set_order_gateway_ref(
    conn: &Connection,
    id: &str,
    gateway_order_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET gateway_order_id = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, gateway_order_id, now()],
    )?;
    Ok(affected > 0)
}

/// Conditionally move an order from `initiated` to `completed`.
///
/// The WHERE clause is the compare-and-swap that makes confirmation
/// processing race-safe: of two concurrent confirmations, exactly one
/// observes an affected row. Returns false if the order was already in a
/// terminal state (or does not exist).
pub fn complete_order(
    conn: &Connection,
    id: &str,
    gateway_transaction_id: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders
         SET status = 'completed',
             gateway_transaction_id = COALESCE(?2, gateway_transaction_id),
             updated_at = ?3
         WHERE id = ?1 AND status = 'initiated'",
        params![id, gateway_transaction_id, now()],
    )?;
    Ok(affected > 0)
}

/// Reconciliation variant of [`complete_order`]: also sets the `repaired`
/// flag so operators can tell a repaired order from a normally confirmed one.
pub fn complete_order_repaired(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'completed', repaired = 1, updated_at = ?2
         WHERE id = ?1 AND status = 'initiated'",
        params![id, now()],
    )?;
    Ok(affected > 0)
}

/// Conditionally move an order from `initiated` to `failed`.
pub fn fail_order(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE orders SET status = 'failed', updated_at = ?2
         WHERE id = ?1 AND status = 'initiated'",
        params![id, now()],
    )?;
    Ok(affected > 0)
}

/// The reconciliation scan: orders still `initiated` whose checkout started
/// before `cutoff`. Relies on the (status, created_at) index.
pub fn list_stale_initiated_orders(conn: &Connection, cutoff: i64) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM orders
             WHERE status = 'initiated' AND created_at < ?1
             ORDER BY created_at",
            ORDER_COLS
        ),
        &[&cutoff],
    )
}

// ============ Entitlements ============

pub fn get_entitlement(conn: &Connection, user_id: &str, tool_id: &str) -> Result<Option<Entitlement>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM entitlements WHERE user_id = ?1 AND tool_id = ?2",
            ENTITLEMENT_COLS
        ),
        &[&user_id, &tool_id],
    )
}

pub fn has_active_entitlement(conn: &Connection, user_id: &str, tool_id: &str) -> Result<bool> {
    Ok(get_entitlement(conn, user_id, tool_id)?
        .map(|e| e.status == EntitlementStatus::Active)
        .unwrap_or(false))
}

/// Keyed upsert on `(user_id, tool_id)` - a set/merge, never an append.
///
/// Re-granting an existing pair refreshes status/expiry in place; the unique
/// index means even two racing writers cannot produce a duplicate row.
pub fn upsert_entitlement(conn: &Connection, input: &UpsertEntitlement) -> Result<Entitlement> {
    let id = Entitlement::key(&input.user_id, &input.tool_id);
    let now = now();

    conn.execute(
        "INSERT INTO entitlements (id, user_id, tool_id, status, granted_by, order_id, activated_at, expires_at)
         VALUES (?1, ?2, ?3, 'active', ?4, ?5, ?6, ?7)
         ON CONFLICT(user_id, tool_id) DO UPDATE SET
             status = 'active',
             granted_by = excluded.granted_by,
             order_id = excluded.order_id,
             activated_at = excluded.activated_at,
             expires_at = excluded.expires_at",
        params![
            &id,
            &input.user_id,
            &input.tool_id,
            input.granted_by.as_str(),
            &input.order_id,
            now,
            input.expires_at
        ],
    )?;

    Ok(Entitlement {
        id,
        user_id: input.user_id.clone(),
        tool_id: input.tool_id.clone(),
        status: EntitlementStatus::Active,
        granted_by: input.granted_by,
        order_id: input.order_id.clone(),
        activated_at: now,
        expires_at: input.expires_at,
    })
}

pub fn list_entitlements_for_user(conn: &Connection, user_id: &str) -> Result<Vec<Entitlement>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM entitlements WHERE user_id = ?1 ORDER BY tool_id",
            ENTITLEMENT_COLS
        ),
        &[&user_id],
    )
}

// ============ Payment history ============

pub fn create_payment_record(conn: &Connection, input: &CreatePaymentRecord) -> Result<PaymentRecord> {
    let id = gen_id();
    let now = now();
    let tool_ids_json = serde_json::to_string(&input.tool_ids)?;

    conn.execute(
        "INSERT INTO payment_history (id, order_id, user_id, tool_ids, amount, currency, gateway, gateway_transaction_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            &input.order_id,
            &input.user_id,
            &tool_ids_json,
            input.amount,
            &input.currency,
            &input.gateway,
            &input.gateway_transaction_id,
            now
        ],
    )?;

    Ok(PaymentRecord {
        id,
        order_id: input.order_id.clone(),
        user_id: input.user_id.clone(),
        tool_ids: input.tool_ids.clone(),
        amount: input.amount,
        currency: input.currency.clone(),
        gateway: input.gateway.clone(),
        gateway_transaction_id: input.gateway_transaction_id.clone(),
        created_at: now,
    })
}

pub fn list_payment_records_for_order(conn: &Connection, order_id: &str) -> Result<Vec<PaymentRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_history WHERE order_id = ?1 ORDER BY created_at",
            PAYMENT_RECORD_COLS
        ),
        &[&order_id],
    )
}
