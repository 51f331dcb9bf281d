use std::collections::HashMap;

use super::RagError;

/// A document stored in the vector database.
///
/// Each document carries its text, the embedding used for similarity search,
/// and string metadata. Documents inserted by the bot are tagged with their
/// own text under the `name` key.
///
/// # Example
///
/// ```no_run
/// # use ragbot_core::rag::Document;
/// let embedding = vec![0.1, 0.2, 0.3];
/// let doc = Document::new("3f2c...", "Llamas are vegetarians", embedding)
///     .with_metadata("name", "Llamas are vegetarians");
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            embedding,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A search result containing a document and its similarity score.
///
/// Higher scores indicate better matches. Backends that report distances
/// convert them so that `1.0` is an identical vector.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

/// Handle to a named collection inside a vector store.
///
/// `id` is the backend's own identifier (Chroma uses a UUID distinct from the
/// name; Qdrant and the in-memory store reuse the name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

impl Collection {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Result of looking up the nearest document for a prompt.
#[derive(Debug)]
pub enum RetrievalOutcome {
    /// Text of the single nearest document.
    Found(String),
    /// The collection answered but held nothing to return.
    NotFound,
    /// Embedding, lookup or initialization failed.
    Failed(RagError),
}

impl RetrievalOutcome {
    /// The text to feed the model as context: the document, or an empty string.
    pub fn context(&self) -> &str {
        match self {
            RetrievalOutcome::Found(text) => text,
            RetrievalOutcome::NotFound | RetrievalOutcome::Failed(_) => "",
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, RetrievalOutcome::Found(_))
    }

    /// Converts to a `Result`, keeping "no match" distinct from failure.
    pub fn into_result(self) -> Result<Option<String>, RagError> {
        match self {
            RetrievalOutcome::Found(text) => Ok(Some(text)),
            RetrievalOutcome::NotFound => Ok(None),
            RetrievalOutcome::Failed(err) => Err(err),
        }
    }
}

/// Per-document outcome of a bulk insertion.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Identifiers of the documents that were stored.
    pub inserted: Vec<String>,
    /// Documents that could not be stored, with the reason.
    pub failed: Vec<(String, RagError)>,
}

impl BatchReport {
    /// Fails the whole batch when any single insertion failed.
    pub fn into_result(self) -> Result<Vec<String>, RagError> {
        if self.failed.is_empty() {
            return Ok(self.inserted);
        }

        let total = self.inserted.len() + self.failed.len();
        let first = self
            .failed
            .into_iter()
            .next()
            .map(|(_, err)| err.to_string())
            .unwrap_or_default();

        Err(RagError::BatchInsert {
            failed: total - self.inserted.len(),
            total,
            first,
        })
    }
}
