//! API layer - HTTP handlers and routing
//!
//! JSON endpoints live under `/api/v1`:
//! - Auth and account endpoints
//! - Public content (blog, team, executives, testimonials)
//! - Editor content management and uploads
//! - Admin user management
//! - Relay events (SSE) and health
//!
//! Everything else is the server-rendered site, embedded `/static` assets and
//! uploaded files under `/uploads`.

pub mod auth;
pub mod blog;
pub mod common;
pub mod events;
pub mod executives;
pub mod health;
pub mod middleware;
pub mod pages;
pub mod static_files;
pub mod team;
pub mod testimonials;
pub mod upload;
pub mod users;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin/users", users::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Content management (editor or admin)
    let editor_routes = Router::new()
        .nest("/admin/blog", blog::admin_router())
        .nest("/admin/team", team::admin_router())
        .nest("/admin/executives", executives::admin_router())
        .nest("/admin/testimonials", testimonials::admin_router())
        .nest("/upload", upload::router(state.upload_config.max_file_size))
        .route_layer(axum_middleware::from_fn(middleware::require_editor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but no particular role)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/blog", blog::public_router())
        .nest("/team", team::public_router())
        .nest("/executives", executives::public_router())
        .nest("/testimonials", testimonials::public_router())
        .nest("/events", events::router())
        .nest("/health", health::router())
        .merge(admin_routes)
        .merge(editor_routes)
        .merge(protected_routes)
        .fallback(middleware::api_not_found)
        .method_not_allowed_fallback(middleware::api_method_not_allowed)
}

fn cors_layer(cors_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match HeaderValue::from_str(cors_origin) {
        Ok(origin) => cors.allow_origin(origin).allow_credentials(true),
        Err(_) => {
            tracing::warn!(
                "Invalid CORS origin {:?}; cross-origin requests will be rejected",
                cors_origin
            );
            cors
        }
    }
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let uploads = ServeDir::new(&state.upload_config.path);

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(pages::router())
        .route("/static/{*path}", get(static_files::serve_static))
        .nest_service("/uploads", uploads)
        .fallback(pages::not_found)
        // Must wrap handlers directly: it rewrites error bodies
        .layer(axum_middleware::from_fn(middleware::error_envelope))
        .layer(CompressionLayer::new())
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
