//! Blog API endpoints
//!
//! - GET /api/v1/blog - Published posts, newest first
//! - GET /api/v1/blog/{slug} - A published post
//! - /api/v1/admin/blog - Full CRUD for editors, drafts included

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::common::PageQuery;
use crate::api::middleware::{ApiError, AppJson, AppPath, AppQuery, AppState, AuthenticatedUser};
use crate::models::{BlogPost, CreateBlogPostInput, PagedResult, UpdateBlogPostInput};

/// Build public blog routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{slug}", get(get_published))
}

/// Build editor routes (requires auth and editor middleware)
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_post))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
}

async fn list_published(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<PagedResult<BlogPost>>, ApiError> {
    Ok(Json(state.blog.list_published(&query.params()).await?))
}

async fn get_published(
    State(state): State<AppState>,
    AppPath(slug): AppPath<String>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog.get_published_by_slug(&slug).await?))
}

async fn list_all(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<Json<PagedResult<BlogPost>>, ApiError> {
    Ok(Json(state.blog.list_all(&query.params()).await?))
}

async fn create_post(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<CreateBlogPostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.blog.create(user.id, body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog.get_by_id(id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateBlogPostInput>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog.update(id, body).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
