//! User administration endpoints (admin only)
//!
//! - GET /api/v1/admin/users - Paginated account list
//! - PUT /api/v1/admin/users/{id}/role - Change a role
//! - DELETE /api/v1/admin/users/{id} - Delete an account
//!
//! Admins cannot change their own role or delete themselves.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::auth::UserResponse;
use crate::api::common::PageQuery;
use crate::api::middleware::{ApiError, AppJson, AppPath, AppQuery, AppState, AuthenticatedUser};
use crate::models::{PagedResult, UserRole};

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}/role", put(set_role))
        .route("/{id}", delete(delete_user))
}

async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<PagedResult<UserResponse>>, ApiError> {
    let page = state.auth.list_users(&query.params()).await?;
    Ok(Json(PagedResult {
        items: page.items.into_iter().map(Into::into).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        total_pages: page.total_pages,
    }))
}

async fn set_role(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth.set_role(&actor, id, body.role).await?;
    Ok(Json(user.into()))
}

async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.auth.delete_user(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
