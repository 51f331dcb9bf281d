//! Chroma vector database storage implementation.
//!
//! Talks to a Chroma server through its REST API (`/api/v1`). Collections are
//! created with cosine distance; embeddings are always supplied by the caller,
//! so the server never needs an embedding function of its own.

use super::store::VectorStore;
use super::types::{Collection, Document, SearchResult};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

/// Chroma-backed vector store.
#[derive(Debug, Clone)]
pub struct ChromaStore {
    base_url: String,
    http_client: reqwest::Client,
}

impl ChromaStore {
    /// Creates a store for the Chroma server at `base_url`
    /// (e.g. `http://localhost:8000`). No request is made until first use.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    fn collections_url(&self) -> String {
        format!("{}/api/v1/collections", self.base_url)
    }

    async fn error_text(response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("{}: {}", status, body)
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn get_collection(&self, name: &str) -> Result<Option<Collection>> {
        let url = format!("{}/{}", self.collections_url(), name);

        let response = self.http_client
            .get(&url)
            .send()
            .await
            .context("Failed to reach Chroma")?;

        let status = response.status();
        if status.is_success() {
            let collection = response
                .json::<ChromaCollection>()
                .await
                .context("Failed to parse collection")?;
            return Ok(Some(collection.into()));
        }

        let body = response.text().await.unwrap_or_default();
        if is_missing_collection(status, &body) {
            debug!(collection = name, "Collection does not exist");
            return Ok(None);
        }

        bail!("Failed to get collection {}: {}: {}", name, status, body)
    }

    async fn create_collection(&self, name: &str, _dimensions: usize) -> Result<Collection> {
        let request = CreateCollectionRequest {
            name: name.to_string(),
            metadata: HashMap::from([("hnsw:space".to_string(), json!("cosine"))]),
            get_or_create: false,
        };

        let response = self.http_client
            .post(self.collections_url())
            .json(&request)
            .send()
            .await
            .context("Failed to reach Chroma")?;

        if !response.status().is_success() {
            bail!("Failed to create collection {}: {}", name, Self::error_text(response).await);
        }

        let collection = response
            .json::<ChromaCollection>()
            .await
            .context("Failed to parse created collection")?;

        Ok(collection.into())
    }

    async fn delete_collection(&self, collection: &Collection) -> Result<()> {
        let url = format!("{}/{}", self.collections_url(), collection.name);

        let response = self.http_client
            .delete(&url)
            .send()
            .await
            .context("Failed to reach Chroma")?;

        if !response.status().is_success() {
            bail!("Failed to delete collection {}: {}", collection.name, Self::error_text(response).await);
        }

        Ok(())
    }

    async fn add(&self, collection: &Collection, document: Document) -> Result<()> {
        let url = format!("{}/{}/add", self.collections_url(), collection.id);

        let request = AddRequest {
            ids: vec![document.id],
            embeddings: vec![document.embedding],
            documents: vec![document.content],
            metadatas: vec![document.metadata],
        };

        let response = self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to reach Chroma")?;

        if !response.status().is_success() {
            bail!("Failed to add document: {}", Self::error_text(response).await);
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &Collection,
        query_embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<SearchResult>> {
        let url = format!("{}/{}/query", self.collections_url(), collection.id);

        let request = QueryRequest {
            query_embeddings: vec![query_embedding.to_vec()],
            n_results,
            include: vec!["documents", "metadatas", "distances"],
        };

        let response = self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to reach Chroma")?;

        if !response.status().is_success() {
            bail!("Failed to query collection: {}", Self::error_text(response).await);
        }

        let query_response = response
            .json::<QueryResponse>()
            .await
            .context("Failed to parse query response")?;

        Ok(query_response.into_search_results())
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let url = format!("{}/{}/count", self.collections_url(), collection.id);

        let response = self.http_client
            .get(&url)
            .send()
            .await
            .context("Failed to reach Chroma")?;

        if !response.status().is_success() {
            bail!("Failed to count collection: {}", Self::error_text(response).await);
        }

        response.json::<usize>().await.context("Failed to parse count")
    }
}

/// Chroma reports a missing collection as 404 on recent servers and as a
/// 400/500 carrying a "does not exist" message on older ones.
fn is_missing_collection(status: StatusCode, body: &str) -> bool {
    status == StatusCode::NOT_FOUND || body.contains("does not exist")
}

#[derive(Debug, Deserialize)]
struct ChromaCollection {
    id: String,
    name: String,
}

impl From<ChromaCollection> for Collection {
    fn from(c: ChromaCollection) -> Self {
        Collection::new(c.id, c.name)
    }
}

#[derive(Debug, Serialize)]
struct CreateCollectionRequest {
    name: String,
    metadata: HashMap<String, serde_json::Value>,
    get_or_create: bool,
}

#[derive(Debug, Serialize)]
struct AddRequest {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadatas: Vec<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: Vec<&'static str>,
}

/// Column-oriented query result: one row per query embedding.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<HashMap<String, serde_json::Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

impl QueryResponse {
    /// Flattens the first row into search results, best match first.
    ///
    /// Entries without a stored document text are dropped. Cosine distance is
    /// turned into a similarity score (`1 - distance`).
    fn into_search_results(self) -> Vec<SearchResult> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let documents = self.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
        let metadatas = self.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();
        let distances = self.distances.and_then(|d| d.into_iter().next()).unwrap_or_default();

        ids.into_iter()
            .enumerate()
            .filter_map(|(i, id)| {
                let content = documents.get(i).cloned().flatten()?;

                let metadata: HashMap<String, String> = metadatas
                    .get(i)
                    .cloned()
                    .flatten()
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
                    .collect();

                let score = distances.get(i).map(|d| 1.0 - d).unwrap_or(0.0);

                let document = Document {
                    id,
                    content,
                    embedding: vec![],
                    metadata,
                };

                Some(SearchResult { document, score })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_collection_detection() {
        assert!(is_missing_collection(StatusCode::NOT_FOUND, ""));
        assert!(is_missing_collection(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"ValueError('Collection ollama-embeddings-1 does not exist.')"}"#
        ));
        assert!(!is_missing_collection(StatusCode::INTERNAL_SERVER_ERROR, "disk full"));
    }

    #[test]
    fn test_query_response_first_row() {
        let raw = r#"{
            "ids": [["a", "b"]],
            "documents": [["Llamas are vegetarians", null]],
            "metadatas": [[{"name": "Llamas are vegetarians"}, null]],
            "distances": [[0.25, 0.5]],
            "embeddings": null
        }"#;

        let results = serde_json::from_str::<QueryResponse>(raw)
            .unwrap()
            .into_search_results();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, "a");
        assert_eq!(results[0].document.content, "Llamas are vegetarians");
        assert_eq!(
            results[0].document.metadata.get("name").map(String::as_str),
            Some("Llamas are vegetarians")
        );
        assert!((results[0].score - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_query_response_empty() {
        let raw = r#"{"ids": [[]], "documents": [[]], "metadatas": [[]], "distances": [[]]}"#;
        let results = serde_json::from_str::<QueryResponse>(raw)
            .unwrap()
            .into_search_results();
        assert!(results.is_empty());
    }

    #[test]
    fn test_add_request_shape() {
        let doc = Document::new("id-1", "text", vec![0.5, 0.5])
            .with_metadata("name", "text");
        let request = AddRequest {
            ids: vec![doc.id],
            embeddings: vec![doc.embedding],
            documents: vec![doc.content],
            metadatas: vec![doc.metadata],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["ids"], json!(["id-1"]));
        assert_eq!(value["documents"], json!(["text"]));
        assert_eq!(value["metadatas"], json!([{"name": "text"}]));
    }
}
