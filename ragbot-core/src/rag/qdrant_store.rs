//! Qdrant vector database storage implementation.
//!
//! This module provides integration with a Qdrant server over gRPC.

use super::store::VectorStore;
use super::types::{Collection, Document, SearchResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::{
    Payload, Qdrant,
    qdrant::{
        vectors_config::Config, CreateCollectionBuilder, Distance, PointStruct,
        SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, VectorsConfig,
    },
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Qdrant-based vector store for document embeddings.
///
/// Point ids are the documents' UUIDs, so they are accepted by Qdrant as-is.
/// The text and original id travel in the payload next to the metadata.
#[derive(Clone)]
pub struct QdrantStore {
    client: Arc<Qdrant>,
}

impl QdrantStore {
    /// Creates a client for the Qdrant server at `url`
    /// (e.g. `http://localhost:6334`).
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .context("Failed to connect to Qdrant server")?;

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn get_collection(&self, name: &str) -> Result<Option<Collection>> {
        let exists = self
            .client
            .collection_exists(name)
            .await
            .context("Failed to check collection")?;

        Ok(exists.then(|| Collection::new(name, name)))
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<Collection> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorsConfig {
                        config: Some(Config::Params(
                            VectorParamsBuilder::new(dimensions as u64, Distance::Cosine).build()
                        )),
                    })
            )
            .await
            .context("Failed to create collection")?;

        Ok(Collection::new(name, name))
    }

    async fn delete_collection(&self, collection: &Collection) -> Result<()> {
        self.client
            .delete_collection(&collection.id)
            .await
            .context("Failed to delete collection")?;

        Ok(())
    }

    async fn add(&self, collection: &Collection, document: Document) -> Result<()> {
        let mut payload = serde_json::Map::new();
        for (k, v) in &document.metadata {
            payload.insert(k.clone(), json!(v));
        }
        payload.insert("content".to_string(), json!(document.content));
        payload.insert("id".to_string(), json!(document.id));

        let payload = Payload::try_from(serde_json::Value::Object(payload))
            .context("Failed to build payload")?;

        let point = PointStruct::new(document.id.clone(), document.embedding, payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(&collection.id, vec![point]).wait(true))
            .await
            .context("Failed to upsert points")?;

        Ok(())
    }

    async fn query(
        &self,
        collection: &Collection,
        query_embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<SearchResult>> {
        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(&collection.id, query_embedding.to_vec(), n_results as u64)
                    .with_payload(true)
            )
            .await
            .context("Failed to search points")?;

        let results = search_result
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let content = payload
                    .get("content")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();

                // Get the original ID from metadata
                let id = payload
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();

                let metadata: HashMap<String, String> = payload
                    .iter()
                    .filter(|(k, _)| k.as_str() != "content" && k.as_str() != "id")
                    .filter_map(|(k, v)| {
                        v.as_str().map(|s| (k.clone(), s.to_string()))
                    })
                    .collect();

                let document = Document {
                    id,
                    content,
                    embedding: vec![], // Don't return embeddings in search results
                    metadata,
                };

                SearchResult {
                    document,
                    score: point.score,
                }
            })
            .collect();

        Ok(results)
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let info = self
            .client
            .collection_info(&collection.id)
            .await
            .context("Failed to get collection info")?;

        Ok(info.result.map(|r| r.points_count.unwrap_or(0) as usize).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Qdrant server running
    async fn test_qdrant_store_grpc() {
        let store = QdrantStore::new("http://localhost:6334").unwrap();
        let name = format!("ragbot-test-{}", uuid::Uuid::new_v4());

        assert!(store.get_collection(&name).await.unwrap().is_none());
        let collection = store.create_collection(&name, 3).await.unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let doc = Document::new(id, "Hello world", vec![1.0, 0.0, 0.0])
            .with_metadata("name", "Hello world");
        store.add(&collection, doc).await.unwrap();

        assert_eq!(store.count(&collection).await.unwrap(), 1);

        let results = store.query(&collection, &[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].document.content, "Hello world");
        assert_eq!(results[0].document.metadata.get("name").map(String::as_str), Some("Hello world"));

        store.delete_collection(&collection).await.unwrap();
        assert!(store.get_collection(&name).await.unwrap().is_none());
    }
}
