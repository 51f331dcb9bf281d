//! Collections bound to an embedding function.

use super::embedder::Embedder;
use super::store::VectorStore;
use super::types::{BatchReport, Collection, Document, SearchResult};
use super::{RagError, Result};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Metadata key under which every document stores its own text.
pub const NAME_METADATA_KEY: &str = "name";

/// Pairs a vector store with the embedder used for everything put into it.
///
/// Documents added through this client are embedded with the same model that
/// later embeds prompts, so queries and stored vectors are comparable.
#[derive(Clone)]
pub struct EmbeddingStore {
    store: Arc<dyn VectorStore>,
    embedder: Embedder,
    dimensions: usize,
}

impl EmbeddingStore {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Embedder, dimensions: usize) -> Self {
        Self {
            store,
            embedder,
            dimensions,
        }
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    /// Looks up `name`, returning `None` when the collection does not exist.
    pub async fn get_collection(&self, name: &str) -> Result<Option<Collection>> {
        self.store.get_collection(name).await.map_err(RagError::Store)
    }

    /// Creates `name` sized for the embedder's vectors.
    pub async fn create_collection(&self, name: &str) -> Result<Collection> {
        info!(collection = name, model = self.embedder.model(), "Creating collection");
        self.store
            .create_collection(name, self.dimensions)
            .await
            .map_err(RagError::Store)
    }

    pub async fn delete_collection(&self, collection: &Collection) -> Result<()> {
        info!(collection = %collection.name, "Deleting collection");
        self.store
            .delete_collection(collection)
            .await
            .map_err(RagError::Store)
    }

    /// Returns the existing collection, creating it first if needed.
    pub async fn ensure_collection(&self, name: &str) -> Result<Collection> {
        match self.get_collection(name).await? {
            Some(collection) => Ok(collection),
            None => self.create_collection(name).await,
        }
    }

    /// Embeds and inserts every document concurrently.
    ///
    /// Each document gets a fresh UUID and `{"name": <text>}` as metadata.
    /// All insertions are awaited; the report says which ones went through.
    /// Calling this twice with the same documents stores them twice.
    pub async fn add_documents(&self, collection: &Collection, documents: &[String]) -> BatchReport {
        let inserts = documents.iter().map(|text| async move {
            let id = Uuid::new_v4().to_string();
            let result = self.add_document(collection, &id, text).await;
            (id, text, result)
        });

        let mut report = BatchReport::default();
        for (id, text, result) in join_all(inserts).await {
            match result {
                Ok(()) => report.inserted.push(id),
                Err(e) => report.failed.push((text.clone(), e)),
            }
        }

        debug!(
            collection = %collection.name,
            inserted = report.inserted.len(),
            failed = report.failed.len(),
            "Batch insert finished"
        );

        report
    }

    async fn add_document(&self, collection: &Collection, id: &str, text: &str) -> Result<()> {
        let embedding = self.embedder.embed(text).await?;
        let document = Document::new(id, text, embedding)
            .with_metadata(NAME_METADATA_KEY, text);

        self.store
            .add(collection, document)
            .await
            .map_err(RagError::Store)
    }

    /// Nearest-neighbor search with an already computed embedding.
    pub async fn query(
        &self,
        collection: &Collection,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<SearchResult>> {
        self.store
            .query(collection, embedding, n_results)
            .await
            .map_err(RagError::Store)
    }

    pub async fn count(&self, collection: &Collection) -> Result<usize> {
        self.store.count(collection).await.map_err(RagError::Store)
    }
}
