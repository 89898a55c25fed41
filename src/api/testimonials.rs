//! Testimonial API endpoints
//!
//! - GET /api/v1/testimonials
//! - /api/v1/admin/testimonials

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppJson, AppPath, AppState};
use crate::models::{CreateTestimonialInput, Testimonial, UpdateTestimonialInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_active))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_testimonial))
        .route(
            "/{id}",
            get(get_testimonial)
                .put(update_testimonial)
                .delete(delete_testimonial),
        )
}

async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<Testimonial>>, ApiError> {
    Ok(Json(state.testimonials.list_active().await?))
}

async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Testimonial>>, ApiError> {
    Ok(Json(state.testimonials.list_all().await?))
}

async fn create_testimonial(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateTestimonialInput>,
) -> Result<impl IntoResponse, ApiError> {
    let testimonial = state.testimonials.create(body).await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

async fn get_testimonial(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Testimonial>, ApiError> {
    Ok(Json(state.testimonials.get(id).await?))
}

async fn update_testimonial(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateTestimonialInput>,
) -> Result<Json<Testimonial>, ApiError> {
    Ok(Json(state.testimonials.update(id, body).await?))
}

async fn delete_testimonial(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.testimonials.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
