use axum::{
    body::Bytes,
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    engine::PhishEngine,
    error::AppError,
    types::{HealthResponse, PredictRequest, PredictionResult},
};

pub struct AppState {
    pub engine: PhishEngine,
    pub metrics: Option<PrometheusHandle>,
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn predict(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<PredictionResult>, AppError> {
    let request = PredictRequest::from_body(&body);
    info!("Received predict request for url: {:?}", request.url);

    let result = state.engine.predict(request.url.as_deref()).await?;
    Ok(Json(result))
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(state.engine.loader().health())
}

pub async fn metrics(State(state): State<SharedState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
