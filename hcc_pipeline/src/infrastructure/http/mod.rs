//! # HTTP Gateway
//!
//! The thin axum facade over [`GatewayService`](crate::application::gateway_service::GatewayService)
//! described by §6.1: upload, list, get, download, reprocess, delete. Every
//! handler does extraction/validation and delegates the actual use case to
//! the service; none of them touch the registry, artifact store, or bus
//! directly.

mod caller;
mod error;
mod metrics;
mod routes;

pub use metrics::GatewayMetrics;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::application::gateway_service::GatewayService;

/// Shared state handed to every handler.
pub struct AppState {
    pub gateway: GatewayService,
    pub metrics: GatewayMetrics,
}

/// Builds the router described by §6.1. Callers own the `TcpListener` and
/// the `axum::serve` loop; this just wires routes to state.
pub fn router(gateway: GatewayService, metrics: GatewayMetrics) -> Router {
    let state = Arc::new(AppState { gateway, metrics });

    Router::new()
        .merge(routes::documents_router())
        .route("/metrics", axum::routing::get(routes::metrics_handler))
        .route("/health", axum::routing::get(routes::health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
