//! Server-rendered site pages
//!
//! - `/` home: recent posts, leadership, testimonials
//! - `/blog`, `/blog/{slug}`
//! - `/team`, `/about`, `/testimonials`
//! - `/admin` dashboard shell
//!
//! Unknown paths render the 404 template.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tera::Context as TeraContext;

use crate::api::common::PageQuery;
use crate::api::middleware::{current_user, AppState};
use crate::models::ListParams;
use crate::services::ContentError;
use crate::theme::{StandardTemplateVars, NOT_FOUND_TEMPLATE};

/// Number of posts shown on the home page
const HOME_POST_COUNT: u32 = 3;

/// Build the site page routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/blog", get(blog_index))
        .route("/blog/{slug}", get(blog_post))
        .route("/team", get(team))
        .route("/about", get(about))
        .route("/testimonials", get(testimonials))
        .route("/admin", get(admin))
}

/// Failure while building a page
#[derive(Debug)]
pub struct PageError(String);

impl From<ContentError> for PageError {
    fn from(err: ContentError) -> Self {
        PageError(err.to_string())
    }
}

impl From<anyhow::Error> for PageError {
    fn from(err: anyhow::Error) -> Self {
        PageError(format!("{:#}", err))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        tracing::error!("Page rendering failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html("<h1>Internal Server Error</h1>"),
        )
            .into_response()
    }
}

async fn render(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    template: &str,
    context: &TeraContext,
) -> Result<String, PageError> {
    let user = current_user(state, headers).await;
    let vars = StandardTemplateVars::new(&state.site, path).with_user(user.as_ref());
    Ok(state.theme.render_with_standard_vars(template, context, &vars)?)
}

async fn home(State(state): State<AppState>, headers: HeaderMap) -> Result<Html<String>, PageError> {
    let posts = state
        .blog
        .list_published(&ListParams::new(1, HOME_POST_COUNT))
        .await?;

    let mut context = TeraContext::new();
    context.insert("posts", &posts.items);
    context.insert("executives", &state.executives.list_active().await?);
    context.insert("testimonials", &state.testimonials.list_active().await?);
    Ok(Html(render(&state, &headers, "/", "home.html", &context).await?))
}

async fn blog_index(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Html<String>, PageError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let page = state.blog.list_published(&query.params()).await?;

    let mut context = TeraContext::new();
    context.insert("posts", &page.items);
    context.insert("pagination", &page);
    Ok(Html(render(&state, &headers, "/blog", "blog.html", &context).await?))
}

async fn blog_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Path(slug): Path<String>,
) -> Result<Response, PageError> {
    let post = match state.blog.get_published_by_slug(&slug).await {
        Ok(post) => post,
        Err(ContentError::NotFound(_)) => return not_found_page(&state, &headers, uri.path()).await,
        Err(e) => return Err(e.into()),
    };

    let mut context = TeraContext::new();
    context.insert("post", &post);
    let html = render(&state, &headers, uri.path(), "blog_post.html", &context).await?;
    Ok(Html(html).into_response())
}

async fn team(State(state): State<AppState>, headers: HeaderMap) -> Result<Html<String>, PageError> {
    let mut context = TeraContext::new();
    context.insert("team", &state.team.list_active().await?);
    Ok(Html(render(&state, &headers, "/team", "team.html", &context).await?))
}

async fn about(State(state): State<AppState>, headers: HeaderMap) -> Result<Html<String>, PageError> {
    let mut context = TeraContext::new();
    context.insert("executives", &state.executives.list_active().await?);
    context.insert("team", &state.team.list_active().await?);
    Ok(Html(render(&state, &headers, "/about", "about.html", &context).await?))
}

async fn testimonials(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, PageError> {
    let mut context = TeraContext::new();
    context.insert("testimonials", &state.testimonials.list_active().await?);
    Ok(Html(
        render(&state, &headers, "/testimonials", "testimonials.html", &context).await?,
    ))
}

/// The dashboard itself talks to the REST API; the page only needs the user
async fn admin(State(state): State<AppState>, headers: HeaderMap) -> Result<Html<String>, PageError> {
    Ok(Html(
        render(&state, &headers, "/admin", "admin.html", &TeraContext::new()).await?,
    ))
}

async fn not_found_page(state: &AppState, headers: &HeaderMap, path: &str) -> Result<Response, PageError> {
    let html = render(state, headers, path, NOT_FOUND_TEMPLATE, &TeraContext::new()).await?;
    Ok((StatusCode::NOT_FOUND, Html(html)).into_response())
}

/// Fallback for every unknown non-API path
pub async fn not_found(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, PageError> {
    not_found_page(&state, &headers, uri.path()).await
}
