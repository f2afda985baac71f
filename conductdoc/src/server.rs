//! HTTP surface for documentation generation.
//!
//! - `POST /generate-docs`: generate (or fetch from cache) docs for a GitHub repository
//! - `GET /`: liveness message
//! - `GET /health`: static per-component status
//! - `GET /docs/*`: the rendered pages in the output directory

use std::path::Path;
use std::sync::{Arc, LazyLock};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use conductdoc_core::generate::{GenerationError, Generator};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

static GITHUB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://github\.com/").unwrap_or_else(|e| panic!("invalid GitHub URL pattern: {e}"))
});

/// Whether the API accepts `repo_url` for generation.
pub fn is_github_url(repo_url: &str) -> bool {
    GITHUB_URL.is_match(repo_url)
}

#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<Generator>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateDocsRequest {
    pub repo_url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerateDocsResponse {
    pub status: String,
    pub doc_url: Option<String>,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    InvalidRepositoryUrl(String),
    Generation(GenerationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidRepositoryUrl(url) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid GitHub repository URL: {url}"),
            ),
            ApiError::Generation(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        let body = GenerateDocsResponse {
            status: "error".to_string(),
            doc_url: None,
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the router. `output_dir` is served under `/docs`.
pub fn create_router(state: AppState, output_dir: &Path) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/generate-docs", post(handle_generate_docs))
        .nest_service("/docs", ServeDir::new(output_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "ConductDoc API is running" }))
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "services": {
            "repo_processor": "active",
            "doc_generator": "active",
            "cache_manager": "active",
        }
    }))
}

async fn handle_generate_docs(
    State(state): State<AppState>,
    Json(request): Json<GenerateDocsRequest>,
) -> Result<Json<GenerateDocsResponse>, ApiError> {
    if !is_github_url(&request.repo_url) {
        info!(repo_url = %request.repo_url, "[SERVE] Rejecting non-GitHub repository URL");
        return Err(ApiError::InvalidRepositoryUrl(request.repo_url));
    }

    info!(repo_url = %request.repo_url, "[SERVE] Processing repository");
    let outcome = state
        .generator
        .generate(&request.repo_url)
        .await
        .map_err(|e| {
            error!(repo_url = %request.repo_url, error = %e, "[SERVE] Generation failed");
            ApiError::Generation(e)
        })?;

    let message = if outcome.from_cache {
        "Documentation retrieved from cache"
    } else {
        "Documentation generated successfully"
    };
    Ok(Json(GenerateDocsResponse {
        status: "success".to_string(),
        doc_url: outcome.artifact.doc_url,
        message: message.to_string(),
    }))
}

/// Binds `host:port` and serves until ctrl-c.
pub async fn serve(state: AppState, output_dir: &Path, host: &str, port: u16) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(output_dir).await?;
    let router = create_router(state, output_dir);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(address = %listener.local_addr()?, "[SERVE] ConductDoc API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("[SERVE] Shutdown signal received");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_github_urls_are_accepted() {
        assert!(is_github_url("https://github.com/psf/requests"));
        assert!(is_github_url("http://github.com/psf/requests.git"));
        assert!(!is_github_url("https://gitlab.com/group/project"));
        assert!(!is_github_url("git@github.com:psf/requests.git"));
        assert!(!is_github_url("https://github.com.evil.io/x"));
    }
}
