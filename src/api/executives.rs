//! Executive API endpoints
//!
//! - GET /api/v1/executives
//! - /api/v1/admin/executives

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppJson, AppPath, AppState};
use crate::models::{CreateExecutiveInput, Executive, UpdateExecutiveInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_active))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_executive))
        .route(
            "/{id}",
            get(get_executive).put(update_executive).delete(delete_executive),
        )
}

async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<Executive>>, ApiError> {
    Ok(Json(state.executives.list_active().await?))
}

async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Executive>>, ApiError> {
    Ok(Json(state.executives.list_all().await?))
}

async fn create_executive(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateExecutiveInput>,
) -> Result<impl IntoResponse, ApiError> {
    let executive = state.executives.create(body).await?;
    Ok((StatusCode::CREATED, Json(executive)))
}

async fn get_executive(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Executive>, ApiError> {
    Ok(Json(state.executives.get(id).await?))
}

async fn update_executive(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateExecutiveInput>,
) -> Result<Json<Executive>, ApiError> {
    Ok(Json(state.executives.update(id, body).await?))
}

async fn delete_executive(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.executives.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
