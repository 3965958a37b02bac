use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    modules,
    web::{AppState, auth},
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/login", post(auth::login))
        .merge(modules::gallery::router())
        .merge(modules::hero::router())
        .merge(modules::services::router())
        .merge(modules::about::router())
        .merge(modules::contact::router())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
