mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::{CashfreeConfig, PhonePeConfig, RazorpayConfig};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state injected into every handler. Gateway credentials are
/// carried here rather than in process-wide singletons so tests can build a
/// state with doubles.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL for gateway return/notify callbacks
    pub base_url: String,
    /// Bearer token guarding the /admin surface (None = disabled)
    pub admin_token: Option<String>,
    /// Age threshold for the reconciliation scan, in seconds
    pub reconcile_after_secs: i64,
    pub cashfree: Option<CashfreeConfig>,
    pub razorpay: Option<RazorpayConfig>,
    pub phonepe: Option<PhonePeConfig>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
