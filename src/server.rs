use axum::{
    Json, Router,
    extract::{FromRequest, State},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    error::ServiceError,
    model::{GenerationRequest, GenerationResponse, GenerationService, HealthResponse},
};

/// `Json` extractor whose rejections use the service's `{"detail": ...}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct AppJson<T>(pub T);

#[derive(Clone)]
pub struct AppState {
    pub service: GenerationService,
}

pub fn build_router(service: GenerationService) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/healthz", get(health))
        .route("/generate", post(generate))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(state.service.health())
}

async fn generate(
    State(state): State<AppState>,
    AppJson(request): AppJson<GenerationRequest>,
) -> Result<Json<GenerationResponse>, ServiceError> {
    let response = state.service.generate(request).await?;
    Ok(Json(response))
}
