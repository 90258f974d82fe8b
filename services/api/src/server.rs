use crate::cli::ServeArgs;
use crate::infra::{default_badges, load_weights, sample_hotels, AppState, InMemoryStore};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use pool_scoring::config::AppConfig;
use pool_scoring::error::AppError;
use pool_scoring::scoring::{RepositoryError, ScoringService};
use pool_scoring::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryStore::with_weights(load_weights(&config.scoring)?));
    store
        .define_badges(default_badges())
        .map_err(store_error)?;
    if args.seed_demo {
        let seeded = store.seed_hotels(sample_hotels()).map_err(store_error)?;
        info!(hotels = seeded, "seeded sample hotels");
    }

    let scoring_service = Arc::new(ScoringService::new(
        store.clone(),
        store.clone(),
        store,
        &config.scoring,
    ));

    let app = with_scoring_routes(scoring_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        progress_interval = config.scoring.progress_interval,
        recompute_on_save = config.scoring.recompute_on_save,
        "pool scoring service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) fn store_error(err: RepositoryError) -> AppError {
    AppError::Scoring(err.into())
}
