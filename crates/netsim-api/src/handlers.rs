//! HTTP request handlers
//!
//! Each handler validates its input, calls exactly one engine operation,
//! and wraps the result in the response envelope.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use netsim_core::{
    Connection, ConnectionId, ConnectionSpec, ConnectionStatus, Device, DeviceId, DeviceSpec, DeviceUpdate,
    PacketFlow, PacketId, PacketSpec, SimulationStats,
};

use crate::response::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;
use crate::validation::{validate_device_spec, validate_device_update};

/// Unwrap a JSON body, turning a rejection into an enveloped error
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(value)| value).map_err(ApiError::from)
}

fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ApiResponse::ok(data)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Handler for `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Devices
// ═══════════════════════════════════════════════════════════════════════════

pub async fn list_devices(State(state): State<AppState>) -> Json<ApiResponse<Vec<Device>>> {
    Json(ApiResponse::ok(state.engine.devices().await))
}

pub async fn get_device(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ApiResponse<Device>>> {
    let device = state.engine.device(&DeviceId::new(id)).await?;
    Ok(Json(ApiResponse::ok(device)))
}

pub async fn create_device(
    State(state): State<AppState>,
    payload: Result<Json<DeviceSpec>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let spec = body(payload)?;
    validate_device_spec(&spec)?;
    let device = state.engine.add_device(spec).await?;
    Ok(created(device))
}

pub async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<DeviceUpdate>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Device>>> {
    let update = body(payload)?;
    validate_device_update(&update)?;
    let device = state.engine.update_device(&DeviceId::new(id), update).await?;
    Ok(Json(ApiResponse::ok(device)))
}

pub async fn delete_device(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ApiResponse<()>>> {
    state.engine.remove_device(&DeviceId::new(id)).await?;
    Ok(Json(ApiResponse::done("Device deleted")))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Handler for `PUT /api/devices/{id}/status`. The status string is
/// checked against the closed set by the engine.
pub async fn update_device_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Device>>> {
    let request = body(payload)?;
    let id = DeviceId::new(id);
    state.engine.update_device_status(&id, &request.status).await?;
    let device = state.engine.device(&id).await?;
    Ok(Json(ApiResponse::ok(device)))
}

// ═══════════════════════════════════════════════════════════════════════════
// Connections
// ═══════════════════════════════════════════════════════════════════════════

pub async fn list_connections(State(state): State<AppState>) -> Json<ApiResponse<Vec<Connection>>> {
    Json(ApiResponse::ok(state.engine.connections().await))
}

pub async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Connection>>> {
    let connection = state.engine.connection(&ConnectionId::new(id)).await?;
    Ok(Json(ApiResponse::ok(connection)))
}

pub async fn create_connection(
    State(state): State<AppState>,
    payload: Result<Json<ConnectionSpec>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let spec = body(payload)?;
    let connection = state.engine.add_connection(spec).await?;
    Ok(created(connection))
}

pub async fn delete_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    state.engine.remove_connection(&ConnectionId::new(id)).await?;
    Ok(Json(ApiResponse::done("Connection deleted")))
}

pub async fn update_connection_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Connection>>> {
    let request = body(payload)?;
    let status: ConnectionStatus = request.status.parse()?;
    let connection = state
        .engine
        .set_connection_status(&ConnectionId::new(id), status)
        .await?;
    Ok(Json(ApiResponse::ok(connection)))
}

// ═══════════════════════════════════════════════════════════════════════════
// Packets and paths
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct EndpointsRequest {
    pub source: String,
    pub destination: String,
}

pub async fn list_packets(State(state): State<AppState>) -> Json<ApiResponse<Vec<PacketFlow>>> {
    Json(ApiResponse::ok(state.engine.history().await))
}

pub async fn get_packet(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ApiResponse<PacketFlow>>> {
    let packet = state.engine.packet(&PacketId::new(id)).await?;
    Ok(Json(ApiResponse::ok(packet)))
}

pub async fn send_packet(
    State(state): State<AppState>,
    payload: Result<Json<PacketSpec>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let spec = body(payload)?;
    let packet = state.engine.send_packet(spec).await?;
    Ok(created(packet))
}

pub async fn ping(
    State(state): State<AppState>,
    payload: Result<Json<EndpointsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let request = body(payload)?;
    let packet = state
        .engine
        .ping(&request.source.into(), &request.destination.into())
        .await?;
    Ok(created(packet))
}

pub async fn traceroute(
    State(state): State<AppState>,
    payload: Result<Json<EndpointsRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let request = body(payload)?;
    let packets = state
        .engine
        .traceroute(&request.source.into(), &request.destination.into())
        .await?;
    Ok(created(packets))
}

pub async fn delete_packet(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ApiResponse<()>>> {
    state.engine.remove_packet(&PacketId::new(id)).await?;
    Ok(Json(ApiResponse::done("Packet deleted")))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResponse {
    pub path: Vec<DeviceId>,
    pub reachable: bool,
}

/// Handler for `GET /api/path?source=..&destination=..`
pub async fn resolve_path(
    State(state): State<AppState>,
    Query(query): Query<EndpointsRequest>,
) -> Json<ApiResponse<PathResponse>> {
    let path = state
        .engine
        .resolve_path(&query.source.into(), &query.destination.into())
        .await;
    let reachable = !path.is_empty();
    Json(ApiResponse::ok(PathResponse { path, reachable }))
}

// ═══════════════════════════════════════════════════════════════════════════
// Simulation control
// ═══════════════════════════════════════════════════════════════════════════

pub async fn simulation_status(State(state): State<AppState>) -> Json<ApiResponse<SimulationStats>> {
    Json(ApiResponse::ok(state.engine.stats().await))
}

pub async fn start_simulation(State(state): State<AppState>) -> Json<ApiResponse<SimulationStats>> {
    state.engine.start().await;
    Json(ApiResponse::ok(state.engine.stats().await).with_message("Simulation started"))
}

pub async fn stop_simulation(State(state): State<AppState>) -> Json<ApiResponse<SimulationStats>> {
    state.engine.stop().await;
    Json(ApiResponse::ok(state.engine.stats().await).with_message("Simulation stopped"))
}

pub async fn reset_simulation(State(state): State<AppState>) -> Json<ApiResponse<SimulationStats>> {
    state.engine.reset().await;
    Json(ApiResponse::ok(state.engine.stats().await).with_message("Simulation reset"))
}
