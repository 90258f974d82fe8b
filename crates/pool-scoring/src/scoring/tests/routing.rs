use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::scoring::router::{run_status_handler, scoring_router};
use crate::scoring::service::ScoringService;

type TestService = ScoringService<MemoryHotels, MemoryWeights, MemoryBadges>;

fn router_for(hotels: MemoryHotels) -> (Router, Arc<TestService>) {
    let service = Arc::new(build_service(hotels, &scoring_config(1)));
    (scoring_router(service.clone()), service)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

/// Poll the run-status endpoint until the run reaches a terminal status.
async fn wait_for_finish(router: &Router, run_id: &str) -> Value {
    let mut status = Value::Null;
    for _ in 0..100 {
        let response = router
            .clone()
            .oneshot(empty_request(
                Method::GET,
                &format!("/api/v1/run-status/{run_id}"),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        status = read_json_body(response).await;
        if matches!(status["status"].as_str(), Some("completed" | "failed" | "cancelled")) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    status
}

#[tokio::test]
async fn unknown_hotel_is_not_found() {
    let (router, _) = router_for(MemoryHotels::default());

    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/hotels/ghost"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload["error"].as_str().is_some());
}

#[tokio::test]
async fn criteria_then_single_hotel_recalculation() {
    let hotels = MemoryHotels::default().with_hotel("resort", None);
    let (router, _) = router_for(hotels.clone());

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/hotels/resort/pool-criteria",
            serde_json::to_value(resort_criteria()).expect("criteria serialises"),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["hotel_id"], "resort");
    assert!(payload.get("scores").is_none());

    let response = router
        .clone()
        .oneshot(empty_request(
            Method::POST,
            "/api/v1/hotels/resort/scores/recalculate",
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["scores"]["overall_score"], 9.0);

    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/hotels/resort"))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["quiet_score"], 9.0);
    assert!(payload["scores_updated_at"].is_string());
}

#[tokio::test]
async fn invalid_criteria_are_unprocessable() {
    let hotels = MemoryHotels::default().with_hotel("resort", None);
    let (router, _) = router_for(hotels);

    let response = router
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/hotels/resort/pool-criteria",
            json!({ "sunbed_to_guest_ratio": -1.0 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn recalculating_hotel_without_criteria_reports_skip() {
    let hotels = MemoryHotels::default().with_hotel("bare", None);
    let (router, _) = router_for(hotels);

    let response = router
        .oneshot(empty_request(
            Method::POST,
            "/api/v1/hotels/bare/scores/recalculate",
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert!(payload["scores"].is_null());
    assert!(payload["skipped"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_recalculation_is_accepted_and_observable() {
    let hotels = MemoryHotels::default()
        .with_hotel("a", Some(resort_criteria()))
        .with_hotel("b", None)
        .with_hotel("c", Some(party_criteria(true)));
    let (router, _) = router_for(hotels.clone());

    let response = router
        .clone()
        .oneshot(empty_request(Method::POST, "/api/v1/scores/recalculate"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    let run_id = payload["run_id"]
        .as_str()
        .expect("run id returned")
        .to_string();

    let status = wait_for_finish(&router, &run_id).await;
    assert_eq!(status["status"], "completed");
    assert_eq!(status["total"], 3);
    assert_eq!(status["processed"], 2);
    assert_eq!(status["skipped"], 1);
    assert_eq!(hotels.hotel("a").overall_score, Some(9.0));

    let response = router
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/runs/recalculation/progress",
        ))
        .await
        .expect("route executes");
    let latest = read_json_body(response).await;
    assert_eq!(latest["run_id"], run_id.as_str());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn running_batch_is_cancelled_over_http() {
    let hotels = MemoryHotels::default()
        .with_hotel("a", Some(resort_criteria()))
        .with_hotel("b", Some(resort_criteria()))
        .with_hotel("c", Some(resort_criteria()));
    let (router, _) = router_for(hotels.clone());
    let gate = hotels.pause_write_for("b");

    let response = router
        .clone()
        .oneshot(empty_request(Method::POST, "/api/v1/scores/recalculate"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let run_id = read_json_body(response).await["run_id"]
        .as_str()
        .expect("run id returned")
        .to_string();

    let gate = tokio::task::spawn_blocking(move || {
        gate.wait_until_parked();
        gate
    })
    .await
    .expect("gate task");

    let response = router
        .clone()
        .oneshot(empty_request(Method::POST, "/api/v1/runs/recalculation/cancel"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["cancellation"], "requested");
    gate.release();

    let status = wait_for_finish(&router, &run_id).await;
    assert_eq!(status["status"], "cancelled");
    assert_eq!(status["processed"], 2);
    assert!(hotels.hotel("c").scores().is_none());

    let response = router
        .oneshot(empty_request(Method::POST, "/api/v1/runs/recalculation/cancel"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_with_subset_body_is_accepted() {
    let hotels = MemoryHotels::default().with_hotel("a", Some(resort_criteria()));
    let (router, service) = router_for(hotels);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/badges/apply",
            json!({ "hotel_ids": ["a"] }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], "badge_application");
    assert!(service
        .progress(crate::scoring::batch::RunKind::BadgeApplication)
        .is_some());
}

#[tokio::test]
async fn second_batch_while_running_conflicts() {
    let hotels = MemoryHotels::default().with_hotel("a", Some(resort_criteria()));
    let (router, service) = router_for(hotels);

    let _held = service.begin_recalculation().expect("lock claimed");

    let response = router
        .oneshot(empty_request(Method::POST, "/api/v1/scores/recalculate"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn progress_reports_idle_and_rejects_unknown_kinds() {
    let (router, _) = router_for(MemoryHotels::default());

    let response = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/runs/badges/progress"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "idle");

    let response = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/runs/imports/progress"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(empty_request(Method::POST, "/api/v1/runs/recalculation/cancel"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn run_status_validates_run_ids() {
    let service = Arc::new(build_service(MemoryHotels::default(), &scoring_config(10)));

    let response = run_status_handler::<MemoryHotels, MemoryWeights, MemoryBadges>(
        State(service.clone()),
        Path("not-a-uuid".to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = run_status_handler::<MemoryHotels, MemoryWeights, MemoryBadges>(
        State(service),
        Path(uuid::Uuid::new_v4().to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn weight_updates_are_validated() {
    let (router, _) = router_for(MemoryHotels::default());

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/scoring-weights",
            json!({
                "criterion": "sunbed_ratio",
                "weight": -1.0,
                "family_weight": 1.0,
                "quiet_weight": 1.0,
                "party_weight": 1.0,
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/scoring-weights",
            json!({
                "criterion": "sunbed_ratio",
                "weight": 2.0,
                "family_weight": 1.0,
                "quiet_weight": 1.0,
                "party_weight": 0.5,
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/scoring-weights"))
        .await
        .expect("route executes");
    let rows = read_json_body(response).await;
    let sunbed = rows
        .as_array()
        .expect("weight rows")
        .iter()
        .find(|row| row["criterion"] == "sunbed_ratio")
        .cloned()
        .expect("sunbed row");
    assert_eq!(sunbed["weight"], 2.0);
    assert_eq!(sunbed["party_weight"], 0.5);
}
