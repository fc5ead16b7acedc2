//! HTTP surface: the HTML page and a small JSON API.

mod page;

pub use page::{escape_html, HtmlRenderer, PageRenderer};

use crate::error::GlanceError;
use crate::service::{PageState, QueryRequest, QueryService};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueryService>,
    pub renderer: Arc<dyn PageRenderer>,
}

impl AppState {
    /// State with the default HTML renderer.
    pub fn new(service: QueryService) -> Self {
        Self {
            service: Arc::new(service),
            renderer: Arc::new(HtmlRenderer),
        }
    }
}

/// A failure that aborts the request with HTTP 500.
///
/// Only discovery failures and rendering failures end up here; query
/// rejections and engine errors are shown on the page instead.
#[derive(Debug)]
pub struct WebError(GlanceError);

impl From<GlanceError> for WebError {
    fn from(e: GlanceError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        error!("{}: {}", self.0.category(), self.0.message());
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct DatabasesBody {
    databases: Vec<String>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/api/databases", get(list_databases))
        .route("/api/query", post(run_query))
        .with_state(state)
}

/// Serves until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

fn render(state: &AppState, page: &PageState) -> Result<Html<String>, WebError> {
    Ok(Html(state.renderer.render(page)?))
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, WebError> {
    let page = state.service.list_page().await?;
    render(&state, &page)
}

async fn submit(
    State(state): State<AppState>,
    Form(request): Form<QueryRequest>,
) -> Result<Html<String>, WebError> {
    let page = state.service.submit(request).await?;
    render(&state, &page)
}

async fn list_databases(State(state): State<AppState>) -> Result<Json<DatabasesBody>, WebError> {
    let page = state.service.list_page().await?;
    Ok(Json(DatabasesBody {
        databases: page.databases,
    }))
}

async fn run_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<PageState>, WebError> {
    Ok(Json(state.service.submit(request).await?))
}
