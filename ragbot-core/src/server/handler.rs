use super::types::{ErrorBody, RagbotQuery, RagbotResponse};
use crate::answer::Answerer;
use crate::rag::{RagError, RetrievalOutcome, Retriever};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Everything a request needs, shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<Retriever>,
    pub answerer: Answerer,
    pub documents: Arc<Vec<String>>,
    pub default_prompt: Arc<str>,
}

impl AppState {
    pub fn new(
        retriever: Arc<Retriever>,
        answerer: Answerer,
        documents: Vec<String>,
        default_prompt: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            retriever,
            answerer,
            documents: Arc::new(documents),
            default_prompt: default_prompt.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Retrieval(#[from] RagError),

    #[error("Invalid query string: {0}")]
    BadQuery(#[from] QueryRejection),
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let body = ErrorBody::internal(self.to_string());
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// `GET /ragbot` - answers `prompt` using the nearest stored document.
pub async fn ragbot(
    State(state): State<AppState>,
    query: Result<Query<RagbotQuery>, QueryRejection>,
) -> Result<Json<RagbotResponse>, HandlerError> {
    let Query(query) = query?;
    let prompt = match query.prompt {
        Some(prompt) if !prompt.trim().is_empty() => prompt,
        _ => state.default_prompt.to_string(),
    };
    let question = prompt.trim();
    info!(prompt = %question, "Handling ragbot request");

    let context = match state.retriever.retrieve(question, &state.documents).await {
        RetrievalOutcome::Found(text) => text,
        RetrievalOutcome::NotFound => {
            debug!("No stored document matched, answering without context");
            String::new()
        }
        RetrievalOutcome::Failed(e) => return Err(e.into()),
    };

    let response = state.answerer.answer(question, &context).await;

    Ok(Json(RagbotResponse::new(prompt, response)))
}
