use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rankblaze::config::Config;
use rankblaze::db::{create_pool, init_db, queries, AppState};
use rankblaze::models::{CreateTool, CreateUser};
use rankblaze::{handlers, reconcile};

#[derive(Parser, Debug)]
#[command(name = "rankblaze")]
#[command(about = "Storefront backend: orders, payment gateways, entitlements")]
struct Cli {
    /// Seed the database with dev data (tools and a test user)
    #[arg(long)]
    seed: bool,

    /// Run the reconciliation job once, print the summary, and exit
    #[arg(long)]
    reconcile: bool,
}

/// Seeds the database with dev data for local testing.
/// Only runs in dev mode and when the catalog is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let tools = queries::list_tools(&conn).expect("Failed to list tools");
    if !tools.is_empty() {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    let catalog = [
        ("chatgpt_plus", "ChatGPT Plus", 399),
        ("canva_pro", "Canva Pro", 149),
        ("semrush", "Semrush Guru", 799),
    ];
    for (id, name, monthly_price) in catalog {
        queries::create_tool(
            &conn,
            &CreateTool {
                id: id.to_string(),
                name: name.to_string(),
                monthly_price,
            },
        )
        .expect("Failed to create dev tool");
        tracing::info!("Tool: {} ({} INR/month)", id, monthly_price);
    }

    let user = queries::create_user(
        &conn,
        &CreateUser {
            id: "dev_user".to_string(),
            email: "dev@rankblaze.local".to_string(),
            name: "Dev User".to_string(),
            phone: Some("9999999999".to_string()),
        },
    )
    .expect("Failed to create dev user");
    tracing::info!("User: {} ({})", user.id, user.email);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rankblaze=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        admin_token: config.admin_token.clone(),
        reconcile_after_secs: config.reconcile_after_secs,
        cashfree: config.cashfree.clone(),
        razorpay: config.razorpay.clone(),
        phonepe: config.phonepe.clone(),
    };

    // One-shot reconciliation for cron use
    if cli.reconcile {
        let conn = state.db.get().expect("Failed to get connection");
        let summary = reconcile::run(&conn, state.reconcile_after_secs)
            .expect("Reconciliation failed");
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).expect("Failed to serialize summary")
        );
        return;
    }

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set RANKBLAZE_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("RankBlaze server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
