//! The entitlement writer: turns a confirmed payment into tool access.
//!
//! All writes for one confirmation - order completion, entitlement upserts,
//! payment-history append - happen in a single rusqlite transaction. Partial
//! application (order completed but no entitlement) is the one failure mode
//! this module exists to prevent.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::{AppError, Result};
use crate::models::{
    CreatePaymentRecord, Entitlement, EntitlementStatus, GrantedBy, Order, OrderStatus,
    UpsertEntitlement,
};

/// 30-day access window per confirmed payment.
pub const GRANT_PERIOD_SECS: i64 = 30 * 86400;

/// Outcome of a grant attempt.
#[derive(Debug)]
pub enum GrantOutcome {
    /// Order completed, entitlements upserted, history appended
    Granted { entitlements: Vec<Entitlement> },
    /// The confirmation was already processed - success with zero mutation
    AlreadyGranted,
}

/// Grant tool access for a confirmed order.
///
/// Idempotence law: invoking this twice for the same confirmed order yields
/// exactly one active entitlement per `(user_id, tool_id)` and one payment
/// history row. The second call returns [`GrantOutcome::AlreadyGranted`]
/// without touching the database.
pub fn grant_for_order(
    conn: &mut Connection,
    order: &Order,
    gateway_transaction_id: Option<&str>,
) -> Result<GrantOutcome> {
    // Unknown user/tool is the caller's bug, not a payment problem.
    validate_references(conn, &order.user_id, &order.tool_ids)?;

    // Already confirmed - duplicate webhook or a verify racing a webhook.
    if order.status == OrderStatus::Completed {
        return Ok(GrantOutcome::AlreadyGranted);
    }
    if order.status == OrderStatus::Failed {
        return Err(AppError::Conflict(format!(
            "Order {} already failed; cannot grant",
            order.id
        )));
    }

    // If every pair is already active (e.g. an admin granted the tools while
    // the order sat initiated), succeed without mutation; reconciliation is
    // the path that flips such orders to completed.
    let mut all_active = true;
    for tool_id in &order.tool_ids {
        if !queries::has_active_entitlement(conn, &order.user_id, tool_id)? {
            all_active = false;
            break;
        }
    }
    if all_active && !order.tool_ids.is_empty() {
        return Ok(GrantOutcome::AlreadyGranted);
    }

    let now = chrono::Utc::now().timestamp();
    let expires_at = now + GRANT_PERIOD_SECS;

    let tx = conn.transaction()?;

    // Conditional completion is the real race guard: of two concurrent
    // confirmations, only one observes the initiated -> completed flip.
    // The loser takes the no-mutation path; its transaction is never
    // committed, so no duplicate history row can appear.
    if !queries::complete_order(&tx, &order.id, gateway_transaction_id)? {
        return Ok(GrantOutcome::AlreadyGranted);
    }

    let mut entitlements = Vec::with_capacity(order.tool_ids.len());
    for tool_id in &order.tool_ids {
        let entitlement = queries::upsert_entitlement(
            &tx,
            &UpsertEntitlement {
                user_id: order.user_id.clone(),
                tool_id: tool_id.clone(),
                granted_by: GrantedBy::Payment,
                order_id: Some(order.id.clone()),
                expires_at,
            },
        )?;
        entitlements.push(entitlement);
    }

    queries::create_payment_record(
        &tx,
        &CreatePaymentRecord {
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            tool_ids: order.tool_ids.clone(),
            amount: order.amount,
            currency: order.currency.clone(),
            gateway: order.gateway.clone(),
            gateway_transaction_id: gateway_transaction_id.map(str::to_string),
        },
    )?;

    // All or nothing. On failure the drop rolls back and the order stays
    // initiated, so the gateway's retry (or reconciliation) can land later.
    tx.commit()?;

    tracing::info!(
        "entitlements granted: order={}, user={}, tools={:?}, expires_at={}",
        order.id,
        order.user_id,
        order.tool_ids,
        expires_at
    );

    Ok(GrantOutcome::Granted { entitlements })
}

/// Manual grant by an operator. Same keyed upsert as the payment path,
/// no order involved.
pub fn grant_admin(
    conn: &Connection,
    user_id: &str,
    tool_id: &str,
    period_secs: i64,
) -> Result<Entitlement> {
    validate_references(conn, user_id, std::slice::from_ref(&tool_id.to_string()))?;

    let expires_at = chrono::Utc::now().timestamp() + period_secs;
    let entitlement = queries::upsert_entitlement(
        conn,
        &UpsertEntitlement {
            user_id: user_id.to_string(),
            tool_id: tool_id.to_string(),
            granted_by: GrantedBy::Admin,
            order_id: None,
            expires_at,
        },
    )?;

    tracing::info!(
        "admin grant: user={}, tool={}, expires_at={}",
        user_id,
        tool_id,
        expires_at
    );

    Ok(entitlement)
}

/// True when the user holds an active entitlement for every tool listed.
pub fn holds_all_active(conn: &Connection, user_id: &str, tool_ids: &[String]) -> Result<bool> {
    if tool_ids.is_empty() {
        return Ok(false);
    }
    for tool_id in tool_ids {
        match queries::get_entitlement(conn, user_id, tool_id)? {
            Some(e) if e.status == EntitlementStatus::Active => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn validate_references(conn: &Connection, user_id: &str, tool_ids: &[String]) -> Result<()> {
    if queries::get_user_by_id(conn, user_id)?.is_none() {
        return Err(AppError::InvalidArgument(format!("Unknown user: {}", user_id)));
    }
    if tool_ids.is_empty() {
        return Err(AppError::InvalidArgument("No tools on order".into()));
    }
    for tool_id in tool_ids {
        if queries::get_tool_by_id(conn, tool_id)?.is_none() {
            return Err(AppError::InvalidArgument(format!("Unknown tool: {}", tool_id)));
        }
    }
    Ok(())
}
