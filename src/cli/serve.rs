//! HTTP server command handler.

use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use color_eyre::Result;
use serde::Deserialize;
use serde_json::json;

use crate::context::Context;
use crate::error::AppError;
use crate::models::{GraphMode, GraphRequest};
use crate::services::{GraphService, StatsService};

use super::App;

/// Error body returned by the API.
struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::InvalidMode(_) => StatusCode::BAD_REQUEST,
            AppError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_configuration() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct GraphQuery {
    mode: Option<String>,
    category: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
struct StatsQuery {
    #[serde(default)]
    refresh: bool,
}

async fn graph(
    State(ctx): State<Context>,
    Query(query): Query<GraphQuery>,
) -> Result<Response, ApiError> {
    let mode = match query.mode.as_deref() {
        Some(mode) => mode.parse::<GraphMode>()?,
        None => GraphMode::default(),
    };
    let request = GraphRequest {
        mode,
        category: query.category,
        limit: query.limit,
    };
    let graph = ctx
        .resolve::<GraphService>()
        .graph(&request, query.refresh)
        .await;
    Ok(Json(graph).into_response())
}

async fn stats(State(ctx): State<Context>, Query(query): Query<StatsQuery>) -> Response {
    Json(ctx.resolve::<StatsService>().summarize(query.refresh).await).into_response()
}

async fn project(State(ctx): State<Context>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let details = ctx.resolve::<GraphService>().project(&id).await?;
    Ok(Json(details).into_response())
}

async fn refresh_cache(State(ctx): State<Context>) -> Response {
    Json(ctx.resolve::<GraphService>().refresh().await).into_response()
}

async fn clear_cache(State(ctx): State<Context>) -> Response {
    ctx.resolve::<GraphService>().invalidate().await;
    Json(json!({ "cleared": true })).into_response()
}

/// Routes of the HTTP API.
pub fn router(ctx: Context) -> Router {
    Router::new()
        .route("/api/graph", get(graph))
        .route("/api/stats", get(stats))
        .route("/api/project/:id", get(project))
        .route("/api/cache/refresh", post(refresh_cache))
        .route("/api/cache/clear", post(clear_cache))
        .with_state(ctx)
}

impl App {
    /// Run the HTTP server.
    pub async fn run_serve(&self, host: Option<&str>, port: Option<u16>) -> Result<()> {
        tracing::info!("Starting ecomap HTTP server");

        let ctx = self.context()?;
        let host = host.unwrap_or(&ctx.config.server.host).to_string();
        let port = port.unwrap_or(ctx.config.server.port);

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e| color_eyre::eyre::eyre!("Invalid address {}:{}: {}", host, port, e))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| color_eyre::eyre::eyre!("Failed to bind to {}: {}", addr, e))?;

        tracing::info!("ecomap HTTP server listening on http://{}", addr);

        axum::serve(listener, router(ctx)).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            color_eyre::eyre::eyre!("HTTP server error: {}", e)
        })?;

        tracing::info!("HTTP server shutting down");
        Ok(())
    }
}
