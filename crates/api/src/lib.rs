//! HTTP API for hotel search, checkout and booking management.
//!
//! Exposes the quote search, the checkout saga and booking cancellation,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use ledger::{IdempotencyStore, Ledger};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    AgentCommissionService, CheckoutCoordinator, CheckoutServices, HandoffSigner,
    InMemoryCancellationService, InMemoryPaymentGateway,
};
use search::{QuoteAggregator, SearchSessions, SupplierClient};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub checkout: CheckoutCoordinator<Arc<dyn Ledger>>,
    pub search: SearchSessions,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/search", post(routes::search::search))
        .route("/search/{session_id}/more", post(routes::search::load_more))
        .route("/search/{session_id}/view", post(routes::search::view))
        .route("/checkouts/{booking_ref}", get(routes::checkouts::status))
        .route("/checkouts/{booking_ref}/reserve", post(routes::checkouts::reserve))
        .route(
            "/checkouts/{booking_ref}/financials",
            post(routes::checkouts::recompute_financials),
        )
        .route("/checkouts/{booking_ref}/pay", post(routes::checkouts::pay))
        .route("/checkouts/{booking_ref}/abandon", post(routes::checkouts::abandon))
        .route("/bookings/{booking_ref}", get(routes::bookings::get))
        .route("/bookings/{booking_ref}/cancel", post(routes::bookings::cancel))
        .route("/bookings/{booking_ref}/events", get(routes::bookings::events))
        .route("/handoff/{token}", get(routes::handoff::verify))
        .route("/reconciliations", get(routes::reconciliations::list))
        .route(
            "/reconciliations/{booking_ref}",
            post(routes::reconciliations::reconcile),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given stores and suppliers.
///
/// Payment and cancellation use the in-memory sandbox services; agent
/// repricing uses the configured commission.
pub fn create_default_state(
    config: &Config,
    ledger: Arc<dyn Ledger>,
    idempotency: Arc<dyn IdempotencyStore>,
    suppliers: Vec<Arc<dyn SupplierClient>>,
) -> Arc<AppState> {
    let services = CheckoutServices {
        gateway: Arc::new(InMemoryPaymentGateway::new()),
        financial: Arc::new(AgentCommissionService::new(config.agent_commission_bps)),
        cancellations: Arc::new(InMemoryCancellationService::new()),
        idempotency,
    };
    create_state(config, ledger, services, suppliers)
}

/// Creates the application state with explicit checkout collaborators.
pub fn create_state(
    config: &Config,
    ledger: Arc<dyn Ledger>,
    services: CheckoutServices,
    suppliers: Vec<Arc<dyn SupplierClient>>,
) -> Arc<AppState> {
    let checkout = CheckoutCoordinator::new(
        ledger,
        services,
        HandoffSigner::new(config.handoff_secret.as_bytes().to_vec()),
        config.checkout_config(),
    );

    let aggregator = QuoteAggregator::new(suppliers, config.supplier_timeout);

    Arc::new(AppState {
        checkout,
        search: SearchSessions::with_limits(
            Arc::new(aggregator),
            config.search_session_ttl,
            config.max_search_sessions,
        ),
    })
}
