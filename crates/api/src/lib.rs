//! HTTP server for the group order coordinator.
//!
//! Provides REST endpoints for the order command surface, a server-sent
//! stream of order changes, structured logging (tracing) and Prometheus
//! metrics. The auto-transition scheduler runs beside the server in the
//! same process.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use common::SystemClock;
use domain::{BroadcastNotifier, OrderConfig, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Buffered changes per change-stream subscriber.
const CHANGE_BUFFER: usize = 256;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/changes", get(routes::system::changes::<S>))
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).delete(routes::orders::delete::<S>),
        )
        .route("/orders/{id}/summary", get(routes::orders::summary::<S>))
        .route("/orders/{id}/infos", put(routes::orders::set_infos::<S>))
        .route(
            "/orders/{id}/positions",
            post(routes::orders::add_position::<S>),
        )
        .route(
            "/orders/{id}/positions/{position_id}",
            patch(routes::orders::update_position::<S>)
                .delete(routes::orders::remove_position::<S>),
        )
        .route(
            "/orders/{id}/transitions",
            post(routes::orders::transition::<S>),
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

/// Creates the application state around `store`, reading time from the
/// system clock and broadcasting every change.
pub fn create_state<S: OrderStore>(store: S, config: OrderConfig) -> Arc<AppState<S>> {
    let notifier = BroadcastNotifier::new(CHANGE_BUFFER);
    let service = OrderService::new(store, Arc::new(SystemClock), config)
        .with_notifier(Arc::new(notifier.clone()));

    Arc::new(AppState {
        service: Arc::new(service),
        notifier,
    })
}

/// Registers descriptions for the metrics the coordinator records.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "orders_mutations_total",
        "Successful order mutations by command"
    );
    metrics::describe_counter!(
        "orders_version_conflicts_total",
        "Writes rejected because the order had moved on"
    );
    metrics::describe_counter!(
        "orders_auto_transitions_total",
        "Transitions applied by the scheduler by trigger"
    );
    metrics::describe_counter!(
        "orders_scheduler_conflicts_total",
        "Scheduled transitions skipped after a concurrent change"
    );
    metrics::describe_histogram!(
        "orders_scheduler_tick_seconds",
        metrics::Unit::Seconds,
        "Duration of one scheduler tick"
    );
}
