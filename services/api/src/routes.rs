use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use pool_scoring::error::AppError;
use pool_scoring::scoring::{
    scoring_router, BadgeRepository, HotelRepository, HotelScores, PoolCriteria, ScoreAggregator,
    ScoreAxis, ScoreBreakdown, ScoringService, ScoringWeight, WeightRepository, WeightTable,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Ad-hoc scoring request; nothing is persisted.
#[derive(Debug, Deserialize)]
pub(crate) struct ScorePreviewRequest {
    pub(crate) criteria: PoolCriteria,
    /// Weight rows to score against. Criteria without a row weigh 1.0.
    #[serde(default)]
    pub(crate) weights: Option<Vec<ScoringWeight>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScorePreviewResponse {
    pub(crate) scores: HotelScores,
    pub(crate) breakdowns: Vec<ScoreBreakdown>,
}

pub(crate) fn with_scoring_routes<H, W, B>(service: Arc<ScoringService<H, W, B>>) -> axum::Router
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    scoring_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/scores/preview",
            axum::routing::post(score_preview_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn score_preview_endpoint(
    Json(payload): Json<ScorePreviewRequest>,
) -> Result<Json<ScorePreviewResponse>, AppError> {
    Ok(Json(preview(payload)?))
}

pub(crate) fn preview(request: ScorePreviewRequest) -> Result<ScorePreviewResponse, AppError> {
    let ScorePreviewRequest { criteria, weights } = request;
    criteria
        .validate()
        .map_err(|err| AppError::Input(err.to_string()))?;

    let rows = weights.unwrap_or_default();
    for row in &rows {
        row.validate()?;
    }

    let aggregator = ScoreAggregator::new(WeightTable::from_rows(rows));
    Ok(ScorePreviewResponse {
        scores: aggregator.score_all(&criteria),
        breakdowns: ScoreAxis::ALL
            .into_iter()
            .map(|axis| aggregator.breakdown(&criteria, axis))
            .collect(),
    })
}
