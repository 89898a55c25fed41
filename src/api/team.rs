//! Team API endpoints
//!
//! - GET /api/v1/team - Active members in display order
//! - /api/v1/admin/team - CRUD for editors

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppJson, AppPath, AppState};
use crate::models::{CreateTeamMemberInput, TeamMember, UpdateTeamMemberInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_active))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_member))
        .route("/{id}", get(get_member).put(update_member).delete(delete_member))
}

async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<TeamMember>>, ApiError> {
    Ok(Json(state.team.list_active().await?))
}

async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<TeamMember>>, ApiError> {
    Ok(Json(state.team.list_all().await?))
}

async fn create_member(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateTeamMemberInput>,
) -> Result<impl IntoResponse, ApiError> {
    let member = state.team.create(body).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn get_member(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<TeamMember>, ApiError> {
    Ok(Json(state.team.get(id).await?))
}

async fn update_member(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateTeamMemberInput>,
) -> Result<Json<TeamMember>, ApiError> {
    Ok(Json(state.team.update(id, body).await?))
}

async fn delete_member(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.team.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
