use std::env;

/// Cashfree PG credentials. `client_secret` doubles as the webhook signing key.
#[derive(Debug, Clone)]
pub struct CashfreeConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct PhonePeConfig {
    pub merchant_id: String,
    pub salt_key: String,
    pub salt_index: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Bearer token for the /admin endpoints. Unset = admin surface disabled.
    pub admin_token: Option<String>,
    /// Orders still `initiated` after this many seconds are eligible for
    /// reconciliation.
    pub reconcile_after_secs: i64,
    pub dev_mode: bool,
    pub cashfree: Option<CashfreeConfig>,
    pub razorpay: Option<RazorpayConfig>,
    pub phonepe: Option<PhonePeConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("RANKBLAZE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let cashfree = match (env::var("CASHFREE_CLIENT_ID"), env::var("CASHFREE_CLIENT_SECRET")) {
            (Ok(client_id), Ok(client_secret)) => Some(CashfreeConfig {
                client_id,
                client_secret,
                api_base: env::var("CASHFREE_API_BASE")
                    .unwrap_or_else(|_| "https://sandbox.cashfree.com/pg".to_string()),
            }),
            _ => None,
        };

        let razorpay = match (env::var("RAZORPAY_KEY_ID"), env::var("RAZORPAY_KEY_SECRET")) {
            (Ok(key_id), Ok(key_secret)) => Some(RazorpayConfig {
                key_id,
                key_secret,
                webhook_secret: env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default(),
            }),
            _ => None,
        };

        let phonepe = match (env::var("PHONEPE_MERCHANT_ID"), env::var("PHONEPE_SALT_KEY")) {
            (Ok(merchant_id), Ok(salt_key)) => Some(PhonePeConfig {
                merchant_id,
                salt_key,
                salt_index: env::var("PHONEPE_SALT_INDEX").unwrap_or_else(|_| "1".to_string()),
                api_base: env::var("PHONEPE_API_BASE")
                    .unwrap_or_else(|_| "https://api-preprod.phonepe.com/apis/pg-sandbox".to_string()),
            }),
            _ => None,
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "rankblaze.db".to_string()),
            base_url,
            admin_token: env::var("ADMIN_TOKEN").ok(),
            reconcile_after_secs: env::var("RECONCILE_AFTER_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1800),
            dev_mode,
            cashfree,
            razorpay,
            phonepe,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
