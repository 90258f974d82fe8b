use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use super::batch::{RunError, RunId, RunKind, RunTicket};
use super::domain::{HotelId, PoolCriteria};
use super::engine::ScoringWeight;
use super::repository::{BadgeRepository, HotelRepository, RepositoryError, WeightRepository};
use super::service::{ScoringService, ScoringServiceError};

type SharedService<H, W, B> = Arc<ScoringService<H, W, B>>;

/// Optional body narrowing a batch run to specific hotels.
#[derive(Debug, Default, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub hotel_ids: Option<BTreeSet<HotelId>>,
}

/// Router builder exposing scoring, badge and progress endpoints.
pub fn scoring_router<H, W, B>(service: SharedService<H, W, B>) -> Router
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    Router::new()
        .route("/api/v1/hotels/:hotel_id", get(hotel_handler::<H, W, B>))
        .route(
            "/api/v1/hotels/:hotel_id/pool-criteria",
            put(criteria_handler::<H, W, B>),
        )
        .route(
            "/api/v1/hotels/:hotel_id/score-breakdown",
            get(breakdown_handler::<H, W, B>),
        )
        .route(
            "/api/v1/hotels/:hotel_id/scores/recalculate",
            post(recalculate_hotel_handler::<H, W, B>),
        )
        .route(
            "/api/v1/scores/recalculate",
            post(recalculate_all_handler::<H, W, B>),
        )
        .route("/api/v1/badges/apply", post(apply_badges_handler::<H, W, B>))
        .route(
            "/api/v1/runs/:kind/progress",
            get(progress_handler::<H, W, B>),
        )
        .route("/api/v1/runs/:kind/cancel", post(cancel_handler::<H, W, B>))
        .route(
            "/api/v1/run-status/:run_id",
            get(run_status_handler::<H, W, B>),
        )
        .route(
            "/api/v1/scoring-weights",
            get(weights_handler::<H, W, B>).put(upsert_weight_handler::<H, W, B>),
        )
        .with_state(service)
}

pub(crate) async fn hotel_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    Path(hotel_id): Path<String>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    match service.hotel(&HotelId(hotel_id)) {
        Ok(hotel) => (StatusCode::OK, Json(hotel)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn criteria_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    Path(hotel_id): Path<String>,
    Json(criteria): Json<PoolCriteria>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    match service.upsert_pool_criteria(&HotelId(hotel_id), criteria) {
        Ok(update) => (StatusCode::OK, Json(update)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn breakdown_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    Path(hotel_id): Path<String>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    match service.score_breakdown(&HotelId(hotel_id)) {
        Ok(breakdowns) => (StatusCode::OK, Json(breakdowns)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recalculate_hotel_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    Path(hotel_id): Path<String>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    let hotel_id = HotelId(hotel_id);
    match service.calculate_and_update_scores(&hotel_id) {
        Ok(Some(scores)) => (
            StatusCode::OK,
            Json(json!({ "hotel_id": hotel_id, "scores": scores })),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::OK,
            Json(json!({
                "hotel_id": hotel_id,
                "scores": serde_json::Value::Null,
                "skipped": "hotel has no pool criteria",
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recalculate_all_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    body: Option<Json<BatchRequest>>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let ticket = match service.begin_recalculation() {
        Ok(ticket) => ticket,
        Err(err) => return error_response(err),
    };

    let worker = service.clone();
    enqueue(ticket, move |ticket| {
        worker.execute_recalculation(ticket, request.hotel_ids.as_ref())
    })
}

pub(crate) async fn apply_badges_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    body: Option<Json<BatchRequest>>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let ticket = match service.begin_badge_application() {
        Ok(ticket) => ticket,
        Err(err) => return error_response(err),
    };

    let worker = service.clone();
    enqueue(ticket, move |ticket| {
        worker.execute_badge_application(ticket, request.hotel_ids.as_ref())
    })
}

/// Execute a claimed run on the blocking pool and answer 202 with its id.
fn enqueue<F>(ticket: RunTicket, job: F) -> Response
where
    F: FnOnce(RunTicket) -> Result<super::batch::RunReport, ScoringServiceError> + Send + 'static,
{
    let run_id = ticket.run_id();
    let kind = ticket.kind();

    tokio::task::spawn_blocking(move || {
        if let Err(err) = job(ticket) {
            error!(%run_id, %kind, error = %err, "batch run failed");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "run_id": run_id,
            "kind": kind,
            "status": "pending",
        })),
    )
        .into_response()
}

pub(crate) async fn progress_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    Path(kind): Path<String>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    let Some(kind) = RunKind::from_key(&kind) else {
        return unknown_run_kind(&kind);
    };

    match service.progress(kind) {
        Some(progress) => (StatusCode::OK, Json(progress)).into_response(),
        None => (
            StatusCode::OK,
            Json(json!({ "kind": kind, "status": "idle" })),
        )
            .into_response(),
    }
}

pub(crate) async fn cancel_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    Path(kind): Path<String>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    let Some(kind) = RunKind::from_key(&kind) else {
        return unknown_run_kind(&kind);
    };

    if service.cancel(kind) {
        (
            StatusCode::ACCEPTED,
            Json(json!({ "kind": kind, "cancellation": "requested" })),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no {kind} run in progress") })),
        )
            .into_response()
    }
}

pub(crate) async fn run_status_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    Path(run_id): Path<String>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    let Ok(uuid) = Uuid::parse_str(run_id.trim()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("'{run_id}' is not a run id") })),
        )
            .into_response();
    };

    match service.run_progress(&RunId(uuid)) {
        Some(progress) => (StatusCode::OK, Json(progress)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "run not found" })),
        )
            .into_response(),
    }
}

pub(crate) async fn weights_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    match service.weights() {
        Ok(weights) => (StatusCode::OK, Json(weights)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn upsert_weight_handler<H, W, B>(
    State(service): State<SharedService<H, W, B>>,
    Json(weight): Json<ScoringWeight>,
) -> Response
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    let criterion = weight.criterion;
    match service.upsert_weight(weight) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "criterion": criterion, "status": "saved" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

fn unknown_run_kind(raw: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("unknown run kind '{raw}'") })),
    )
        .into_response()
}

pub(crate) fn error_response(err: ScoringServiceError) -> Response {
    let status = match &err {
        ScoringServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ScoringServiceError::Repository(RepositoryError::Conflict)
        | ScoringServiceError::Repository(RepositoryError::Modified)
        | ScoringServiceError::Run(RunError::AlreadyRunning(_)) => StatusCode::CONFLICT,
        ScoringServiceError::Criteria(_) | ScoringServiceError::Weight(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ScoringServiceError::Repository(RepositoryError::Unavailable(_))
        | ScoringServiceError::Run(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
