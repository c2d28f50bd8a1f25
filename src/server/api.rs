//! Request and response bodies for the control API

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::matrix::{MatrixError, Route};
use crate::monitor::ClearedPointer;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignSourceRequest {
    pub slot_number: u32,
    pub ndi_source_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDestinationRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub source_slot: u32,
    pub destination_slot: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleRoutesRequest {
    pub source_slot: u32,
    #[serde(default)]
    pub destination_slots: Vec<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSourceRequest {
    pub source_name: String,
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
}

impl HealthResponse {
    pub fn ok() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            status: "ok",
            timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResetMonitorsResponse {
    pub monitors: Vec<ClearedPointer>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct VisibilityResponse {
    pub visible: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearPointerResponse {
    /// Source the pointer was showing, if it was bound
    pub cleared: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RouteRemovalResponse {
    /// The removed route; `null` when there was nothing to remove
    pub removed: Option<Route>,
}

#[derive(Debug, Serialize)]
pub struct RoutesRemovedResponse {
    pub removed: Vec<Route>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRoutesResponse {
    pub source_slot: u32,
    pub destination_slots: Vec<u32>,
}

/// Body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable kind, e.g. `unknown_destination`
    pub error: String,
    pub message: String,
}

/// HTTP status for each error kind
pub fn status_for(error: &MatrixError) -> StatusCode {
    match error {
        MatrixError::UnknownSlot(_)
        | MatrixError::UnknownSource(_)
        | MatrixError::UnknownDestination(_) => StatusCode::NOT_FOUND,
        MatrixError::DuplicateName(_) => StatusCode::CONFLICT,
        MatrixError::SourceNotBound(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MatrixError::NotConnected(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for MatrixError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
