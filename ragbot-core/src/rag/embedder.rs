//! Embedding generation using LLM providers.
//!
//! This module provides functionality to convert text into vector embeddings
//! using provider embedding models.

use crate::provider::{Provider, ProviderError};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The API response contained no embeddings.
    ///
    /// This typically indicates a problem with the model or request format.
    #[error("No embeddings returned")]
    NoEmbeddings,
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates vector embeddings for text using provider embedding models.
///
/// The embedder plays the role of a collection's embedding function: it is
/// used both when documents are inserted and when a prompt is looked up, so
/// the two sides always share one model.
///
/// # Supported Models
///
/// Common embedding models:
/// - `nomic-embed-text` - 768-dimensional embeddings, good general purpose
/// - `mxbai-embed-large` - 1024-dimensional embeddings, higher quality
///
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The provider is unreachable
    /// - The model is not available
    /// - The API returns an empty vector
    ///
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.provider
            .embed(text, &self.model)
            .await
            .map_err(EmbedderError::Provider)?;

        if embedding.is_empty() {
            return Err(EmbedderError::NoEmbeddings);
        }

        Ok(embedding)
    }
}
