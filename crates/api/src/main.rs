//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use ledger::{
    IdempotencyStore, InMemoryIdempotencyStore, InMemoryLedger, Ledger, PostgresIdempotencyStore,
    PostgresLedger,
};
use search::{HttpSupplierClient, SupplierClient};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// PostgreSQL when `DATABASE_URL` is set, in-memory otherwise.
async fn open_stores(config: &Config) -> (Arc<dyn Ledger>, Arc<dyn IdempotencyStore>) {
    match &config.database_url {
        Some(url) => {
            let pool = sqlx::PgPool::connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let ledger = PostgresLedger::new(pool.clone());
            ledger
                .run_migrations()
                .await
                .expect("failed to run ledger migrations");
            tracing::info!("using PostgreSQL ledger");
            (Arc::new(ledger), Arc::new(PostgresIdempotencyStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, bookings are kept in memory");
            (
                Arc::new(InMemoryLedger::new()),
                Arc::new(InMemoryIdempotencyStore::new()),
            )
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("invalid configuration");

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Open the ledger and connect suppliers
    let (ledger, idempotency) = open_stores(&config).await;
    let suppliers: Vec<Arc<dyn SupplierClient>> = config
        .supplier_endpoints
        .iter()
        .map(|endpoint| {
            Arc::new(HttpSupplierClient::new(&endpoint.supplier_id, &endpoint.url))
                as Arc<dyn SupplierClient>
        })
        .collect();
    if suppliers.is_empty() {
        tracing::warn!("no SUPPLIER_ENDPOINTS configured, searches return no quotes");
    }

    // 4. Build the application
    let state = api::create_default_state(&config, ledger, idempotency, suppliers);
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
