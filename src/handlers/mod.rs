//! HTTP surface: public checkout/verify/read endpoints, gateway webhooks
//! and the token-guarded admin routes.

pub mod admin;
pub mod checkout;
pub mod orders;
pub mod verify;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use serde_json::json;

use crate::db::AppState;
use crate::extractors::Json;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/checkout", post(checkout::checkout))
        .route("/verify", post(verify::verify))
        .route("/orders/{id}", get(orders::get_order))
        .route(
            "/users/{user_id}/entitlements",
            get(orders::list_user_entitlements),
        )
        .route("/admin/grant", post(admin::admin_grant))
        .route("/admin/reconcile", post(admin::admin_reconcile))
        .merge(webhooks::router())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
