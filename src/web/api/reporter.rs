use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::Permission;
use crate::reporter::{ReporterMode, ReporterStatus};
use crate::source::LocationSample;
use crate::web::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::auth::ApiCaller;
use crate::web::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct IntervalRequest {
    pub seconds: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PushResponse {
    /// False when the sample was dropped by the distance or spacing filter.
    pub accepted: bool,
}

#[utoipa::path(
    post,
    path = "/api/reporter/start",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Tracking active", body = ReporterMode),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Location permission denied, or the API key lacks the control permission", body = ErrorResponse)
    ),
    tag = "reporter"
)]
pub async fn start(
    State(state): State<AppState>,
    caller: ApiCaller,
) -> ApiResult<Json<ReporterMode>> {
    caller.require(Permission::Control)?;

    let mut reporter = state.reporter.lock().await;
    let mode = reporter.start()?;
    log::info!("Tracking started by {}", caller.name);
    Ok(Json(mode))
}

#[utoipa::path(
    post,
    path = "/api/reporter/stop",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Tracking stopped", body = ReporterMode),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "API key lacks the required permission", body = ErrorResponse)
    ),
    tag = "reporter"
)]
pub async fn stop(
    State(state): State<AppState>,
    caller: ApiCaller,
) -> ApiResult<Json<ReporterMode>> {
    caller.require(Permission::Control)?;

    let mut reporter = state.reporter.lock().await;
    reporter.stop().await;
    log::info!("Tracking stopped by {}", caller.name);
    Ok(Json(reporter.status().mode))
}

#[utoipa::path(
    get,
    path = "/api/reporter/status",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Reporter status", body = ReporterStatus),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "API key lacks the required permission", body = ErrorResponse)
    ),
    tag = "reporter"
)]
pub async fn status(
    State(state): State<AppState>,
    caller: ApiCaller,
) -> ApiResult<Json<ReporterStatus>> {
    caller.require(Permission::ViewStatus)?;

    let reporter = state.reporter.lock().await;
    Ok(Json(reporter.status()))
}

#[utoipa::path(
    put,
    path = "/api/reporter/interval",
    request_body = IntervalRequest,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Interval updated", body = ReporterStatus),
        (status = 400, description = "Interval out of range", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "API key lacks the required permission", body = ErrorResponse)
    ),
    tag = "reporter"
)]
pub async fn set_interval(
    State(state): State<AppState>,
    caller: ApiCaller,
    Json(request): Json<IntervalRequest>,
) -> ApiResult<Json<ReporterStatus>> {
    caller.require(Permission::Control)?;

    let mut reporter = state.reporter.lock().await;
    reporter.set_interval(request.seconds)?;
    Ok(Json(reporter.status()))
}

#[utoipa::path(
    post,
    path = "/api/reporter/location",
    request_body = LocationSample,
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 202, description = "Sample handed to the reporter", body = PushResponse),
        (status = 400, description = "Invalid sample", body = ErrorResponse),
        (status = 404, description = "Push source not configured", body = ErrorResponse),
        (status = 409, description = "Tracking is not active", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "API key lacks the required permission", body = ErrorResponse)
    ),
    tag = "reporter"
)]
pub async fn push_location(
    State(state): State<AppState>,
    caller: ApiCaller,
    Json(sample): Json<LocationSample>,
) -> ApiResult<(StatusCode, Json<PushResponse>)> {
    caller.require(Permission::PushLocation)?;

    let push = state
        .push
        .as_ref()
        .ok_or(ApiError::NotFound("push_source_disabled"))?;
    let accepted = push.push(sample)?;
    Ok((StatusCode::ACCEPTED, Json(PushResponse { accepted })))
}
