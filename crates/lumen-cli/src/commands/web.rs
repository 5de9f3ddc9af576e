//! Web server - serves the web page and its question API.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lumen_assistant::{Assistant, AssistantConfig, AssistantError, OllamaError};
use lumen_supervisor::{ReadOnlyChecker, ReadinessChecker};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::assistant_report;
use super::ollama::supervisor_for;

/// Default port for the web server.
pub const DEFAULT_WEB_PORT: u16 = 3000;

#[derive(Clone)]
pub(crate) struct AppState {
    assistant: Arc<Assistant>,
    checker: Arc<dyn ReadinessChecker>,
}

impl AppState {
    pub(crate) fn new(assistant: Assistant, checker: impl ReadinessChecker + 'static) -> Self {
        Self {
            assistant: Arc::new(assistant),
            checker: Arc::new(checker),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    ready: bool,
    can_launch: bool,
    instructions: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExplainRequest {
    code: String,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnswerResponse {
    response: String,
}

/// Assistant failure mapped to an HTTP response.
struct ApiError(AssistantError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AssistantError::EmptyInput(_) => StatusCode::BAD_REQUEST,
            AssistantError::Ollama(OllamaError::ServerNotRunning(_))
            | AssistantError::Supervisor(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        ready: state.checker.is_ready().await,
        can_launch: state.checker.can_launch(),
        instructions: state.checker.instructions().to_string(),
        model: state.assistant.model().to_string(),
    })
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let response = state
        .assistant
        .ask(&request.question, request.context.as_deref())
        .await
        .map_err(ApiError)?;
    Ok(Json(AnswerResponse { response }))
}

async fn explain(
    State(state): State<AppState>,
    Json(request): Json<ExplainRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let response = state
        .assistant
        .explain(&request.code, request.language.as_deref())
        .await
        .map_err(ApiError)?;
    Ok(Json(AnswerResponse { response }))
}

/// Build the API routes plus the static page from `web_root`.
pub(crate) fn build_router(state: AppState, web_root: &Path) -> Router {
    let app = Router::new()
        .route("/api/status", get(status))
        .route("/api/ask", post(ask))
        .route("/api/explain", post(explain))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let index_html = web_root.join("index.html");
    if index_html.is_file() {
        let serve_dir = ServeDir::new(web_root).fallback(ServeFile::new(index_html));
        app.fallback_service(serve_dir)
    } else {
        app.route(
            "/",
            get(|| async { "Lumen web page not found. Pass --web-root <dir> containing index.html." }),
        )
    }
}

pub(crate) async fn run(config: AssistantConfig, port: u16, web_root: &Path) -> miette::Result<()> {
    let assistant = Assistant::new(config).map_err(assistant_report)?;

    // Kept alive for the server's lifetime; a service it starts outlives us.
    let supervisor = supervisor_for(assistant.config());
    if let Err(e) = assistant.prepare(&supervisor).await {
        warn!("{}. The page will show setup instructions.", e);
    }

    let checker = ReadOnlyChecker::new(assistant.config().ollama_port());
    let app = build_router(AppState::new(assistant, checker), web_root);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| miette::miette!("Failed to bind {}: {}", addr, e))?;

    info!("Serving {} on http://{}", web_root.display(), addr);
    println!("Lumen is available at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| miette::miette!("Web server failed: {}", e))?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
