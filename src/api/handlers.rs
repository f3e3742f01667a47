use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};

use super::{
    dto::{
        BatteryDto, ConsumptionDto, CurrentReadingDto, CurrentResponse, EnvironmentDto,
        HealthResponse, HistoryReadingDto, HistoryResponse, NoDataResponse, RefreshResponse,
        SolarDto, StatsResponse, TodayStatsDto,
    },
    errors::{history_error, refresh_error, AppError},
};
use crate::{
    metrics::{DailyStats, TimeRemaining},
    query::QueryService,
};

const DEFAULT_HISTORY_HOURS: i64 = 24;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Window length in hours, 1..=168. Defaults to 24.
    pub hours: Option<i64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Latest reading with battery runway estimates, or
/// `{"error": "No data available"}` when nothing has been stored yet.
#[utoipa::path(
    get,
    path = "/api/current",
    responses(
        (status = 200, description = "Latest reading or no-data marker", body = CurrentResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn get_current(
    State(query): State<QueryService>,
) -> Result<Json<CurrentResponse>, AppError> {
    let current = query.current().await?;
    Ok(Json(current.into()))
}

/// Readings over the last `hours`, oldest first. Long windows are thinned to
/// about 1440 points.
#[utoipa::path(
    get,
    path = "/api/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Historical readings", body = HistoryResponse),
        (status = 422, description = "hours outside 1..=168"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn get_history(
    State(query): State<QueryService>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, AppError> {
    let rows = query
        .history(params.hours.unwrap_or(DEFAULT_HISTORY_HOURS))
        .await
        .map_err(history_error)?;
    Ok(Json(HistoryResponse {
        readings: rows.into_iter().map(Into::into).collect(),
    }))
}

/// Solar and consumption statistics for the current UTC day, or
/// `{"error": "No data for today"}`.
#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Today's statistics or no-data marker", body = StatsResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "readings"
)]
pub async fn get_stats(State(query): State<QueryService>) -> Result<Json<StatsResponse>, AppError> {
    let stats = query.stats().await?;
    Ok(Json(stats.into()))
}

/// Fetch from VRM now instead of waiting for the next scheduled cycle.
#[utoipa::path(
    post,
    path = "/api/refresh",
    responses(
        (status = 200, description = "Refresh cycle ran", body = RefreshResponse),
        (status = 503, description = "VRM client not configured"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "system"
)]
pub async fn refresh(State(query): State<QueryService>) -> Result<Json<RefreshResponse>, AppError> {
    let outcome = query.trigger_refresh().await.map_err(refresh_error)?;
    Ok(Json(outcome.into()))
}

/// Liveness check. `vrm_connected` is `false` in degraded mode.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(query): State<QueryService>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_owned(),
        vrm_connected: query.vrm_connected(),
    })
}

// ---------------------------------------------------------------------------
// OpenAPI document
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(get_current, get_history, get_stats, refresh, health),
    components(schemas(
        CurrentResponse,
        CurrentReadingDto,
        NoDataResponse,
        BatteryDto,
        SolarDto,
        ConsumptionDto,
        EnvironmentDto,
        TimeRemaining,
        HistoryReadingDto,
        HistoryResponse,
        StatsResponse,
        TodayStatsDto,
        DailyStats,
        RefreshResponse,
        HealthResponse,
    )),
    tags(
        (name = "readings", description = "Stored energy readings"),
        (name = "system",   description = "System endpoints"),
    ),
    info(
        title = "VRM Monitor API",
        version = "0.1.0",
        description = "REST API for Victron VRM battery and solar telemetry"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
