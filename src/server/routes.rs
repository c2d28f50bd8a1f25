//! HTTP routes for the control API
//!
//! Every handler is a thin translation between JSON and a [`RoutingEngine`]
//! call. Queries return full snapshots; clients poll and reconcile.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{
    AssignSourceRequest, ClearPointerResponse, CreateDestinationRequest, EnabledRequest,
    HealthResponse, MultipleRoutesRequest, ResetMonitorsResponse, RouteRemovalResponse,
    RouteRequest, RoutesRemovedResponse, SetSourceRequest, SourceRoutesResponse,
    VisibilityResponse,
};
use super::config::ServerConfig;
use crate::catalog::Source;
use crate::matrix::{
    BulkRouteOutcome, Destination, DestinationRemoval, MatrixError, Route, RouteCreation,
    RoutingEngine, SlotRelease, SourceSlot,
};
use crate::monitor::{PointerKind, PointerState};
use crate::stats::ServiceStats;

type Engine = State<Arc<RoutingEngine>>;
type ApiResult<T> = Result<Json<T>, MatrixError>;

/// Build the API router without middleware
pub fn router(engine: Arc<RoutingEngine>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/sources", get(list_sources))
        // studio monitor
        .route("/api/studio-monitors", get(list_studio_monitors))
        .route("/api/studio-monitors/reset", post(reset_monitors))
        .route("/api/studio-monitors/set-source", post(set_monitor_source))
        .route("/api/studio-monitors/current-source", get(monitor_source))
        .route("/api/studio-monitors/toggle", post(toggle_monitor))
        // matrix
        .route("/api/matrix/source-slots", get(list_source_slots))
        .route("/api/matrix/source-slots/assign", post(assign_source))
        .route("/api/matrix/source-slots/{slot}", delete(unassign_slot))
        .route(
            "/api/matrix/destinations",
            get(list_destinations).post(create_destination),
        )
        .route("/api/matrix/destinations/{slot}", delete(delete_destination))
        .route(
            "/api/matrix/destinations/{slot}/unassign",
            post(unassign_destination),
        )
        .route(
            "/api/matrix/destinations/{slot}/enabled",
            post(set_destination_enabled),
        )
        .route(
            "/api/matrix/routes",
            get(list_routes).post(create_route).delete(remove_route),
        )
        .route("/api/matrix/routes/multiple", post(create_multiple_routes))
        .route(
            "/api/matrix/routes/source/{slot}",
            get(routes_for_source).delete(remove_routes_from_source),
        )
        // preview
        .route("/api/preview/set-source", post(set_preview_source))
        .route("/api/preview/current-source", get(preview_source))
        .route("/api/preview/clear", post(clear_preview))
        .route("/api/preview/toggle", post(toggle_preview))
        .route("/api/preview/frame", get(preview_frame))
        .with_state(engine)
}

/// Build the API router with request tracing and optional CORS
pub fn app(engine: Arc<RoutingEngine>, config: &ServerConfig) -> Router {
    let app = router(engine).layer(TraceLayer::new_for_http());
    if config.cors_enabled {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn stats(State(engine): Engine) -> Json<ServiceStats> {
    Json(engine.stats().await)
}

async fn list_sources(State(engine): Engine) -> Json<Vec<Source>> {
    Json(engine.list_sources().await)
}

// ---- studio monitor ----------------------------------------------------

async fn list_studio_monitors(State(engine): Engine) -> Json<Vec<Source>> {
    Json(engine.studio_monitors().await)
}

async fn reset_monitors(State(engine): Engine) -> Json<ResetMonitorsResponse> {
    let monitors = engine.reset_monitors().await;
    Json(ResetMonitorsResponse {
        count: monitors.len(),
        monitors,
    })
}

async fn set_monitor_source(
    State(engine): Engine,
    Json(request): Json<SetSourceRequest>,
) -> ApiResult<PointerState> {
    set_pointer(&engine, PointerKind::Monitor, request).await
}

async fn monitor_source(State(engine): Engine) -> Json<PointerState> {
    Json(engine.pointer(PointerKind::Monitor))
}

async fn toggle_monitor(State(engine): Engine) -> Json<VisibilityResponse> {
    Json(VisibilityResponse {
        visible: engine.toggle_pointer(PointerKind::Monitor),
    })
}

// ---- source slots ------------------------------------------------------

async fn list_source_slots(State(engine): Engine) -> Json<Vec<SourceSlot>> {
    Json(engine.source_slots().await)
}

async fn assign_source(
    State(engine): Engine,
    Json(request): Json<AssignSourceRequest>,
) -> ApiResult<SourceSlot> {
    let slot = engine
        .assign_source(
            request.slot_number,
            &request.ndi_source_name,
            request.display_name,
        )
        .await?;
    Ok(Json(slot))
}

async fn unassign_slot(State(engine): Engine, Path(slot): Path<u32>) -> ApiResult<SlotRelease> {
    Ok(Json(engine.unassign_slot(slot).await?))
}

// ---- destinations ------------------------------------------------------

async fn list_destinations(State(engine): Engine) -> Json<Vec<Destination>> {
    Json(engine.destinations().await)
}

async fn create_destination(
    State(engine): Engine,
    Json(request): Json<CreateDestinationRequest>,
) -> Result<(StatusCode, Json<Destination>), MatrixError> {
    let destination = engine
        .create_destination(&request.name, request.description)
        .await?;
    Ok((StatusCode::CREATED, Json(destination)))
}

async fn delete_destination(
    State(engine): Engine,
    Path(slot): Path<u32>,
) -> ApiResult<DestinationRemoval> {
    Ok(Json(engine.delete_destination(slot).await?))
}

async fn unassign_destination(
    State(engine): Engine,
    Path(slot): Path<u32>,
) -> ApiResult<RouteRemovalResponse> {
    let removed = engine.unassign_destination(slot).await?;
    Ok(Json(RouteRemovalResponse { removed }))
}

async fn set_destination_enabled(
    State(engine): Engine,
    Path(slot): Path<u32>,
    Json(request): Json<EnabledRequest>,
) -> ApiResult<Destination> {
    Ok(Json(
        engine.set_destination_enabled(slot, request.enabled).await?,
    ))
}

// ---- routes ------------------------------------------------------------

async fn list_routes(State(engine): Engine) -> Json<Vec<Route>> {
    Json(engine.routes().await)
}

async fn create_route(
    State(engine): Engine,
    Json(request): Json<RouteRequest>,
) -> ApiResult<RouteCreation> {
    let created = engine
        .create_route(request.source_slot, request.destination_slot)
        .await?;
    Ok(Json(created))
}

async fn remove_route(
    State(engine): Engine,
    Json(request): Json<RouteRequest>,
) -> Json<RouteRemovalResponse> {
    let removed = engine
        .remove_route(request.source_slot, request.destination_slot)
        .await;
    Json(RouteRemovalResponse { removed })
}

async fn create_multiple_routes(
    State(engine): Engine,
    Json(request): Json<MultipleRoutesRequest>,
) -> ApiResult<BulkRouteOutcome> {
    let outcome = engine
        .create_multiple_routes(request.source_slot, &request.destination_slots)
        .await?;
    Ok(Json(outcome))
}

async fn routes_for_source(
    State(engine): Engine,
    Path(slot): Path<u32>,
) -> ApiResult<SourceRoutesResponse> {
    let destination_slots = engine.destinations_for_source(slot).await?;
    Ok(Json(SourceRoutesResponse {
        source_slot: slot,
        destination_slots,
    }))
}

async fn remove_routes_from_source(
    State(engine): Engine,
    Path(slot): Path<u32>,
) -> ApiResult<RoutesRemovedResponse> {
    let removed = engine.remove_all_routes_from_source(slot).await?;
    Ok(Json(RoutesRemovedResponse {
        count: removed.len(),
        removed,
    }))
}

// ---- preview -----------------------------------------------------------

async fn set_preview_source(
    State(engine): Engine,
    Json(request): Json<SetSourceRequest>,
) -> ApiResult<PointerState> {
    set_pointer(&engine, PointerKind::Preview, request).await
}

async fn preview_source(State(engine): Engine) -> Json<PointerState> {
    Json(engine.pointer(PointerKind::Preview))
}

async fn clear_preview(State(engine): Engine) -> Json<ClearPointerResponse> {
    Json(ClearPointerResponse {
        cleared: engine.clear_pointer(PointerKind::Preview).await,
    })
}

async fn toggle_preview(State(engine): Engine) -> Json<VisibilityResponse> {
    Json(VisibilityResponse {
        visible: engine.toggle_pointer(PointerKind::Preview),
    })
}

/// Latest preview frame in the wire format, or 204 if there is none yet
async fn preview_frame(State(engine): Engine) -> Response {
    match engine.frame(PointerKind::Preview) {
        Some(frame) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/octet-stream")],
            frame.encode(),
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn set_pointer(
    engine: &RoutingEngine,
    kind: PointerKind,
    request: SetSourceRequest,
) -> ApiResult<PointerState> {
    Ok(Json(engine.set_pointer(kind, &request.source_name).await?))
}
