use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (identity catalog; unknown user_id anywhere is invalid-argument)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            phone TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Tool catalog (the premium tools being resold)
        CREATE TABLE IF NOT EXISTS tools (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            monthly_price INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        -- Orders, keyed by merchant transaction id.
        -- Status only ever moves initiated -> completed or initiated -> failed,
        -- enforced by conditional UPDATEs in queries. Rows are never deleted.
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            tool_ids TEXT NOT NULL,              -- JSON array of tool ids
            amount INTEGER NOT NULL,             -- whole rupees
            currency TEXT NOT NULL DEFAULT 'INR',
            status TEXT NOT NULL CHECK (status IN ('initiated', 'completed', 'failed')),
            gateway TEXT NOT NULL CHECK (gateway IN ('cashfree', 'razorpay', 'phonepe')),
            gateway_order_id TEXT,
            gateway_transaction_id TEXT,
            repaired INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);
        -- The "orders by status" scan used by reconciliation
        CREATE INDEX IF NOT EXISTS idx_orders_status_created ON orders(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_orders_gateway_order ON orders(gateway, gateway_order_id);

        -- Entitlements, keyed {user_id}_{tool_id}. The unique pair index plus
        -- the keyed upsert guarantee at most one row per (user, tool).
        CREATE TABLE IF NOT EXISTS entitlements (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            tool_id TEXT NOT NULL REFERENCES tools(id),
            status TEXT NOT NULL CHECK (status IN ('active', 'expired')),
            granted_by TEXT NOT NULL CHECK (granted_by IN ('payment', 'admin')),
            order_id TEXT,                        -- reference only, never ownership
            activated_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            UNIQUE(user_id, tool_id)
        );
        CREATE INDEX IF NOT EXISTS idx_entitlements_user ON entitlements(user_id);

        -- Payment history (append-only, written with the order completion)
        CREATE TABLE IF NOT EXISTS payment_history (
            id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES orders(id),
            user_id TEXT NOT NULL,
            tool_ids TEXT NOT NULL,              -- JSON array of tool ids
            amount INTEGER NOT NULL,
            currency TEXT NOT NULL,
            gateway TEXT NOT NULL,
            gateway_transaction_id TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_payment_history_order ON payment_history(order_id);
        CREATE INDEX IF NOT EXISTS idx_payment_history_user ON payment_history(user_id);
        "#,
    )?;
    Ok(())
}
