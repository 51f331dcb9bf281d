//! HTTP server exposing the ragbot endpoint.
//!
//! The server is organized into separate concerns:
//! - `types`: JSON bodies for requests and responses
//! - `handler`: the `/ragbot` pipeline and its error mapping

mod handler;
mod types;

pub use handler::{ragbot, AppState, HandlerError};
pub use types::{ErrorBody, RagbotQuery, RagbotResponse};

use crate::answer::Answerer;
use crate::config::Config;
use crate::knowledge::model_documents;
use crate::provider::{OllamaProvider, Provider};
use crate::rag::{RagError, Retriever};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::any::Any;
use std::sync::Arc;
use tokio::signal;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Builds the application router around `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ragbot", get(ragbot))
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    error!("Request handler panicked: {}", detail);

    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::unknown())).into_response()
}

/// HTTP server wiring the retriever and answerer to the router.
pub struct Server {
    port: u16,
    state: AppState,
}

impl Server {
    /// Creates a server talking to Ollama at the configured address.
    pub fn new(config: &Config) -> Result<Self, RagError> {
        let provider: Arc<dyn Provider> = Arc::new(OllamaProvider::from_config(config));
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: &Config, provider: Arc<dyn Provider>) -> Result<Self, RagError> {
        let retriever = Retriever::from_config(config, provider.clone())?;
        let answerer = Answerer::from_config(config, provider);

        info!(collection = retriever.collection_name(), "Using collection");

        let state = AppState::new(
            Arc::new(retriever),
            answerer,
            model_documents(),
            config.server.default_prompt.as_str(),
        );

        Ok(Self {
            port: config.server.port,
            state,
        })
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Binds `0.0.0.0:<port>` and serves until Ctrl-C.
    pub async fn start(self) -> std::io::Result<()> {
        let app = self.router();
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(addr = %addr, "Ragbot server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
