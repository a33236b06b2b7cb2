//! Test utilities and fixtures for RankBlaze integration tests

#![allow(dead_code)]

use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use rankblaze::config::{CashfreeConfig, PhonePeConfig, RazorpayConfig};
pub use rankblaze::db::{init_db, queries, AppState};
pub use rankblaze::handlers;
pub use rankblaze::models::*;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test user with default values
pub fn create_test_user(conn: &Connection, id: &str) -> User {
    let input = CreateUser {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        name: format!("Test User {}", id),
        phone: Some("9999999999".to_string()),
    };
    queries::create_user(conn, &input).expect("Failed to create test user")
}

/// Create a test tool with the given monthly price (whole rupees)
pub fn create_test_tool(conn: &Connection, id: &str, monthly_price: i64) -> Tool {
    let input = CreateTool {
        id: id.to_string(),
        name: format!("Test Tool {}", id),
        monthly_price,
    };
    queries::create_tool(conn, &input).expect("Failed to create test tool")
}

/// Create a test order in `initiated` state
pub fn create_test_order(
    conn: &Connection,
    id: &str,
    user_id: &str,
    tool_ids: &[&str],
    amount: i64,
    gateway: &str,
) -> Order {
    let input = CreateOrder {
        id: id.to_string(),
        user_id: user_id.to_string(),
        tool_ids: tool_ids.iter().map(|s| s.to_string()).collect(),
        amount,
        currency: "INR".to_string(),
        gateway: gateway.to_string(),
    };
    queries::create_order(conn, &input).expect("Failed to create test order")
}

/// Get the current timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Get a past timestamp (seconds ago)
pub fn past_timestamp(secs: i64) -> i64 {
    now() - secs
}

pub fn test_cashfree_config() -> CashfreeConfig {
    CashfreeConfig {
        client_id: "cf_test_client".to_string(),
        client_secret: "cf_test_secret".to_string(),
        api_base: "https://sandbox.cashfree.com/pg".to_string(),
    }
}

pub fn test_razorpay_config() -> RazorpayConfig {
    RazorpayConfig {
        key_id: "rzp_test_key".to_string(),
        key_secret: "rzp_test_key_secret".to_string(),
        webhook_secret: "rzp_test_webhook_secret".to_string(),
    }
}

pub fn test_phonepe_config() -> PhonePeConfig {
    PhonePeConfig {
        merchant_id: "TESTMERCHANT".to_string(),
        salt_key: "test-salt-key".to_string(),
        salt_index: "1".to_string(),
        api_base: "https://api-preprod.phonepe.com/apis/pg-sandbox".to_string(),
    }
}

/// Create an AppState for testing with an in-memory database.
///
/// The pool is capped at one connection: each connection to an anonymous
/// `:memory:` database gets its own independent store, so a larger pool
/// would silently hand out empty databases.
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        base_url: "http://localhost:8080".to_string(),
        admin_token: Some("test-admin-token".to_string()),
        reconcile_after_secs: 1800,
        cashfree: Some(test_cashfree_config()),
        razorpay: Some(test_razorpay_config()),
        phonepe: Some(test_phonepe_config()),
    }
}

/// Build the full application router over a test state
pub fn test_app(state: AppState) -> Router {
    handlers::router().with_state(state)
}
