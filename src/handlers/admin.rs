//! Operator endpoints behind a shared bearer token.

use axum::{extract::State, http::HeaderMap};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::db::AppState;
use crate::entitlements::{self, GRANT_PERIOD_SECS};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::Entitlement;
use crate::reconcile::{self, ReconcileSummary};

/// Check the `Authorization: Bearer <token>` header against the configured
/// admin token. An unset token disables the admin surface entirely.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let expected = state.admin_token.as_deref().ok_or(AppError::Unauthenticated)?;

    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthenticated)?;

    let expected_bytes = expected.as_bytes();
    let provided_bytes = provided.as_bytes();
    if expected_bytes.len() != provided_bytes.len()
        || !bool::from(expected_bytes.ct_eq(provided_bytes))
    {
        return Err(AppError::Unauthenticated);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct AdminGrantRequest {
    pub user_id: String,
    pub tool_id: String,
    /// Access period in days; defaults to the standard 30.
    pub days: Option<i64>,
}

pub async fn admin_grant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AdminGrantRequest>,
) -> Result<Json<Entitlement>> {
    require_admin(&state, &headers)?;

    let period_secs = match req.days {
        Some(d) if d > 0 => d * 86400,
        Some(_) => return Err(AppError::InvalidArgument("days must be positive".into())),
        None => GRANT_PERIOD_SECS,
    };

    let conn = state.db.get()?;
    let entitlement = entitlements::grant_admin(&conn, &req.user_id, &req.tool_id, period_secs)?;
    Ok(Json(entitlement))
}

pub async fn admin_reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReconcileSummary>> {
    require_admin(&state, &headers)?;

    let conn = state.db.get()?;
    let summary = reconcile::run(&conn, state.reconcile_after_secs)?;
    Ok(Json(summary))
}
