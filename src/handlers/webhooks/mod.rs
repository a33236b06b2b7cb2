//! Payment gateway webhook endpoints.

pub mod cashfree;
pub mod common;
pub mod phonepe;
pub mod razorpay;

use axum::{routing::post, Router};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook/cashfree", post(cashfree::cashfree_webhook))
        .route("/webhook/razorpay", post(razorpay::razorpay_webhook))
        .route("/webhook/phonepe", post(phonepe::phonepe_webhook))
}
