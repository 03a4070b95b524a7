use service_core::axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{dtos::auth::HealthResponse, AppState};

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            service: state.config.service_name.clone(),
            version: state.config.service_version.clone(),
        }),
    )
}
