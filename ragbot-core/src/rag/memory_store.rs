//! In-memory vector storage and search.
//!
//! This module provides a simple vector database implementation using
//! in-memory storage and cosine similarity for search.

use super::store::VectorStore;
use super::types::{Collection, Document, SearchResult};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-memory vector store for document embeddings.
///
/// Collections are kept in a map from name to documents and searched with a
/// linear cosine-similarity scan. Data is lost when the process ends.
///
/// # When to Use
///
/// - Running the bot without a Chroma or Qdrant server
/// - Tests
///
/// The document set this bot works with is tiny, so the O(n) scan is never
/// the bottleneck.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn get_collection(&self, name: &str) -> Result<Option<Collection>> {
        let collections = self.collections.read().await;
        Ok(collections
            .contains_key(name)
            .then(|| Collection::new(name, name)))
    }

    async fn create_collection(&self, name: &str, _dimensions: usize) -> Result<Collection> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(anyhow!("Collection {} already exists", name));
        }
        collections.insert(name.to_string(), Vec::new());
        Ok(Collection::new(name, name))
    }

    async fn delete_collection(&self, collection: &Collection) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .remove(&collection.id)
            .map(|_| ())
            .ok_or_else(|| anyhow!("Collection {} does not exist", collection.name))
    }

    async fn add(&self, collection: &Collection, document: Document) -> Result<()> {
        let mut collections = self.collections.write().await;
        let docs = collections
            .get_mut(&collection.id)
            .ok_or_else(|| anyhow!("Collection {} does not exist", collection.name))?;
        docs.push(document);
        Ok(())
    }

    /// Searches for the most similar documents using cosine similarity.
    ///
    /// Results are sorted by similarity score in descending order (best
    /// matches first) and may be fewer than `n_results`.
    async fn query(
        &self,
        collection: &Collection,
        query_embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let docs = collections
            .get(&collection.id)
            .ok_or_else(|| anyhow!("Collection {} does not exist", collection.name))?;

        let mut results: Vec<SearchResult> = docs
            .iter()
            .map(|doc| SearchResult {
                document: doc.clone(),
                score: cosine_similarity(query_embedding, &doc.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(n_results);

        Ok(results)
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let collections = self.collections.read().await;
        collections
            .get(&collection.id)
            .map(Vec::len)
            .ok_or_else(|| anyhow!("Collection {} does not exist", collection.name))
    }
}

/// Computes cosine similarity between two vectors.
///
/// Returns values from -1.0 (opposite) to 1.0 (identical), with 0.0 indicating
/// orthogonal vectors. Returns 0.0 for mismatched lengths or zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
