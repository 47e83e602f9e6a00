//! Route configuration for the HTTP API

use axum::Router;
use axum::extract::Request;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug_span;

use netsim_engine::NetworkEngine;
use netsim_logging::spans;

use crate::events::event_stream;
use crate::handlers::*;
use crate::state::AppState;

/// Create the full router with all API routes.
pub fn create_router(engine: NetworkEngine) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
        .with_state(AppState::new(engine))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                debug_span!(spans::HTTP_REQUEST, method = %request.method(), uri = %request.uri())
            }),
        )
        .layer(CorsLayer::permissive())
}

/// Create the `/api` router.
fn api_routes() -> Router<AppState> {
    Router::new()
        // Topology
        .route("/devices", get(list_devices).post(create_device))
        .route(
            "/devices/{id}",
            get(get_device)
                .put(update_device)
                .patch(update_device)
                .delete(delete_device),
        )
        .route("/devices/{id}/status", put(update_device_status))
        .route("/connections", get(list_connections).post(create_connection))
        .route("/connections/{id}", get(get_connection).delete(delete_connection))
        .route("/connections/{id}/status", put(update_connection_status))
        // Packets
        .route("/packets", get(list_packets).post(send_packet))
        .route("/packets/ping", post(ping))
        .route("/packets/traceroute", post(traceroute))
        .route("/packets/{id}", get(get_packet).delete(delete_packet))
        .route("/path", get(resolve_path))
        // Simulation control
        .route("/simulation", get(simulation_status))
        .route("/simulation/start", post(start_simulation))
        .route("/simulation/stop", post(stop_simulation))
        .route("/simulation/reset", post(reset_simulation))
        // Real-time events
        .route("/events", get(event_stream))
}
