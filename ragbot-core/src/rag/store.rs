//! Vector store abstraction and factory.
//!
//! This module provides a unified interface for different vector database implementations.

use super::chroma_store::ChromaStore;
use super::memory_store::MemoryStore;
use super::qdrant_store::QdrantStore;
use super::types::{Collection, Document, SearchResult};
use crate::config::StorageMode;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Unified interface for vector database operations.
///
/// Implementations manage named collections and support insertion and
/// nearest-neighbor search. Embeddings are computed by the caller; stores only
/// persist and compare vectors.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Looks a collection up by name.
    ///
    /// A collection that does not exist is `Ok(None)`, not an error.
    async fn get_collection(&self, name: &str) -> Result<Option<Collection>>;

    /// Creates a collection for vectors of `dimensions` components.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<Collection>;

    /// Drops a collection and everything stored in it.
    async fn delete_collection(&self, collection: &Collection) -> Result<()>;

    /// Inserts a single document. No deduplication is performed.
    async fn add(&self, collection: &Collection, document: Document) -> Result<()>;

    /// Searches for the most similar documents using vector similarity.
    ///
    /// # Arguments
    ///
    /// * `query_embedding` - The embedding vector to search for
    /// * `n_results` - Maximum number of results to return
    ///
    /// # Returns
    ///
    /// A vector of search results, sorted by descending similarity score.
    async fn query(
        &self,
        collection: &Collection,
        query_embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Returns the number of documents in the collection.
    async fn count(&self, collection: &Collection) -> Result<usize>;
}

/// Creates a vector store instance based on the storage mode.
///
/// - `Chroma` talks to a Chroma server over HTTP
/// - `Qdrant` talks to a Qdrant server over gRPC
/// - `Memory` keeps everything in the process
pub fn create_vector_store(storage_mode: &StorageMode) -> Result<Arc<dyn VectorStore>> {
    match storage_mode {
        StorageMode::Chroma { url } => Ok(Arc::new(ChromaStore::new(url))),
        StorageMode::Qdrant { url } => Ok(Arc::new(QdrantStore::new(url)?)),
        StorageMode::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
