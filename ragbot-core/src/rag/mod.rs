//! Retrieval Augmented Generation (RAG) system.
//!
//! This module finds the stored document closest to a prompt so it can be
//! handed to the language model as context.
//!
//! # Architecture
//!
//! - [`Retriever`]: lazily initializes the collection and runs lookups
//! - [`EmbeddingStore`]: a vector store paired with the embedder used for it
//! - [`Embedder`]: converts text to vector embeddings via the provider
//! - [`VectorStore`]: Chroma, Qdrant or in-memory storage with similarity search
//!
//! # How It Works
//!
//! 1. **Initialization** (first lookup only):
//!    - The collection named at construction is looked up
//!    - If missing, it is created and every document is embedded and stored
//!
//! 2. **Retrieval**:
//!    - The prompt is converted to a vector embedding
//!    - The single most similar document is returned

mod chroma_store;
mod embedder;
mod embedding_store;
mod memory_store;
mod qdrant_store;
mod store;
mod types;

pub use chroma_store::ChromaStore;
pub use embedder::{Embedder, EmbedderError};
pub use embedding_store::{EmbeddingStore, NAME_METADATA_KEY};
pub use memory_store::{cosine_similarity, MemoryStore};
pub use qdrant_store::QdrantStore;
pub use store::{create_vector_store, VectorStore};
pub use types::{BatchReport, Collection, Document, RetrievalOutcome, SearchResult};

use crate::config::Config;
use crate::provider::Provider;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("Vector store error: {0:#}")]
    Store(anyhow::Error),

    #[error("Failed to insert {failed} of {total} documents: {first}")]
    BatchInsert {
        failed: usize,
        total: usize,
        first: String,
    },

    #[error("Collection {0} is missing after initialization")]
    CollectionMissing(String),
}

pub type Result<T> = std::result::Result<T, RagError>;

/// Number of documents returned per lookup.
const NEAREST_K: usize = 1;

/// Looks up the single stored document closest to a prompt.
///
/// The collection name is fixed at construction and owned by the retriever
/// for its whole lifetime. The collection itself is re-resolved from the
/// store on every call; only its creation is serialized, so concurrent first
/// requests cannot insert the documents twice.
pub struct Retriever {
    store: EmbeddingStore,
    collection_name: String,
    init_lock: Mutex<()>,
}

impl Retriever {
    pub fn new(store: EmbeddingStore, collection_name: impl Into<String>) -> Self {
        Self {
            store,
            collection_name: collection_name.into(),
            init_lock: Mutex::new(()),
        }
    }

    /// Builds the retriever described by `config` on top of `provider`.
    ///
    /// Resolves the collection name here, so a generated name lives exactly
    /// as long as the returned retriever.
    pub fn from_config(config: &Config, provider: Arc<dyn Provider>) -> Result<Self> {
        let vector_store = create_vector_store(&config.storage.backend).map_err(RagError::Store)?;
        let embedder = Embedder::new(provider, config.rag.embedding_model.clone());
        let store = EmbeddingStore::new(vector_store, embedder, config.rag.embedding_dim);

        Ok(Self::new(store, config.storage.resolve_collection_name()))
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Returns the stored document nearest to `prompt`.
    ///
    /// `documents` seed the collection if it does not exist yet and are
    /// ignored otherwise. Failures are logged and reported as
    /// [`RetrievalOutcome::Failed`].
    pub async fn retrieve(&self, prompt: &str, documents: &[String]) -> RetrievalOutcome {
        match self.try_retrieve(prompt, documents).await {
            Ok(Some(text)) => RetrievalOutcome::Found(text),
            Ok(None) => RetrievalOutcome::NotFound,
            Err(e) => {
                error!(collection = %self.collection_name, "Error retrieving context: {}", e);
                RetrievalOutcome::Failed(e)
            }
        }
    }

    async fn try_retrieve(&self, prompt: &str, documents: &[String]) -> Result<Option<String>> {
        let collection = match self.store.get_collection(&self.collection_name).await? {
            Some(collection) => collection,
            None => self.initialize(documents).await?,
        };

        debug!("Generating query embedding for: {}", prompt);
        let query_embedding = self.store.embedder().embed(prompt).await?;
        debug!("Query embedding generated, dimension: {}", query_embedding.len());

        let results = self.store.query(&collection, &query_embedding, NEAREST_K).await?;

        Ok(results.into_iter().next().map(|r| {
            debug!(score = r.score, id = %r.document.id, "Nearest document");
            r.document.content
        }))
    }

    /// Creates the collection and inserts `documents`, unless another caller
    /// got there first. Returns the collection as fetched afterwards.
    async fn initialize(&self, documents: &[String]) -> Result<Collection> {
        let _guard = self.init_lock.lock().await;

        if let Some(collection) = self.store.get_collection(&self.collection_name).await? {
            return Ok(collection);
        }

        let collection = self.store.create_collection(&self.collection_name).await?;
        let inserted = match self.store.add_documents(&collection, documents).await.into_result() {
            Ok(inserted) => inserted,
            Err(e) => {
                // Drop the partial collection so the next lookup seeds again.
                if let Err(cleanup) = self.store.delete_collection(&collection).await {
                    warn!(collection = %self.collection_name, "Failed to drop partial collection: {}", cleanup);
                }
                return Err(e);
            }
        };

        info!(
            collection = %self.collection_name,
            documents = inserted.len(),
            "Initialized embeddings"
        );

        self.store
            .get_collection(&self.collection_name)
            .await?
            .ok_or_else(|| RagError::CollectionMissing(self.collection_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::model_documents;
    use crate::test_support::ScriptedProvider;

    fn retriever_with(provider: Arc<ScriptedProvider>, store: Arc<dyn VectorStore>) -> Retriever {
        let embedder = Embedder::new(provider, "nomic-embed-text:latest");
        Retriever::new(EmbeddingStore::new(store, embedder, 16), "ollama-embeddings-test")
    }

    #[tokio::test]
    async fn test_first_retrieval_initializes_collection() {
        let store = Arc::new(MemoryStore::new());
        let retriever = retriever_with(Arc::new(ScriptedProvider::new()), store.clone());

        let outcome = retriever
            .retrieve("What animals are llamas related to?", &model_documents())
            .await;

        let collection = store.get_collection("ollama-embeddings-test").await.unwrap().unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), 6);
        assert!(outcome.is_found());
    }

    #[tokio::test]
    async fn test_returns_single_stored_document() {
        let documents = model_documents();
        let retriever = retriever_with(Arc::new(ScriptedProvider::new()), Arc::new(MemoryStore::new()));

        for prompt in ["How long do llamas live?", "quantum chromodynamics", "x"] {
            match retriever.retrieve(prompt, &documents).await {
                RetrievalOutcome::Found(text) => assert!(documents.contains(&text)),
                other => panic!("unexpected outcome for {:?}: {:?}", prompt, other),
            }
        }
    }

    #[tokio::test]
    async fn test_nearest_document_is_chosen() {
        let retriever = retriever_with(Arc::new(ScriptedProvider::new()), Arc::new(MemoryStore::new()));

        let outcome = retriever
            .retrieve("Llamas are vegetarians", &model_documents())
            .await;

        assert_eq!(outcome.context(), "Llamas are vegetarians and have very efficient digestive systems");
    }

    #[tokio::test]
    async fn test_repeated_retrieval_does_not_reinsert() {
        let store = Arc::new(MemoryStore::new());
        let retriever = retriever_with(Arc::new(ScriptedProvider::new()), store.clone());
        let documents = model_documents();

        for _ in 0..3 {
            retriever.retrieve("How tall are llamas?", &documents).await;
        }

        let collection = store.get_collection("ollama-embeddings-test").await.unwrap().unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), documents.len());
    }

    #[tokio::test]
    async fn test_concurrent_first_retrievals_insert_once() {
        let store = Arc::new(MemoryStore::new());
        let retriever = Arc::new(retriever_with(Arc::new(ScriptedProvider::new()), store.clone()));
        let documents = model_documents();

        let lookups = (0..8).map(|_| {
            let retriever = retriever.clone();
            let documents = documents.clone();
            tokio::spawn(async move { retriever.retrieve("llama weight", &documents).await })
        });
        for lookup in futures::future::join_all(lookups).await {
            assert!(lookup.unwrap().is_found());
        }

        let collection = store.get_collection("ollama-embeddings-test").await.unwrap().unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), documents.len());
    }

    #[tokio::test]
    async fn test_existing_collection_is_reused() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::new());
        let embedder = Embedder::new(provider.clone(), "nomic-embed-text:latest");
        let client = EmbeddingStore::new(store.clone(), embedder, 16);

        let collection = client.create_collection("ollama-embeddings-test").await.unwrap();
        client
            .add_documents(&collection, &["Llamas hum".to_string()])
            .await
            .into_result()
            .unwrap();

        let retriever = Retriever::new(client, "ollama-embeddings-test");
        let outcome = retriever.retrieve("hum", &model_documents()).await;

        assert_eq!(outcome.context(), "Llamas hum");
        assert_eq!(store.count(&collection).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_document_set_is_not_found() {
        let retriever = retriever_with(Arc::new(ScriptedProvider::new()), Arc::new(MemoryStore::new()));
        let outcome = retriever.retrieve("anything", &[]).await;
        assert!(matches!(outcome, RetrievalOutcome::NotFound));
        assert_eq!(outcome.context(), "");
    }

    #[tokio::test]
    async fn test_embedding_failure_is_reported() {
        let provider = Arc::new(ScriptedProvider::new().failing_embeddings());
        let retriever = retriever_with(provider, Arc::new(MemoryStore::new()));

        let outcome = retriever.retrieve("llamas", &model_documents()).await;

        assert!(matches!(outcome, RetrievalOutcome::Failed(RagError::BatchInsert { failed: 6, total: 6, .. })));
        assert_eq!(outcome.context(), "");
        match outcome {
            RetrievalOutcome::Failed(RagError::BatchInsert { first, .. }) => {
                assert_eq!(first, "Embedder error: Provider error: embedding model unavailable");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_seeding_is_retried() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider::new().failing_embeddings());
        let retriever = retriever_with(provider.clone(), store.clone());
        let documents = model_documents();

        let outcome = retriever.retrieve("How tall are llamas?", &documents).await;
        assert!(matches!(outcome, RetrievalOutcome::Failed(RagError::BatchInsert { .. })));
        assert!(store.get_collection("ollama-embeddings-test").await.unwrap().is_none());

        provider.set_embeddings_failing(false);

        for _ in 0..3 {
            let outcome = retriever.retrieve("How tall are llamas?", &documents).await;
            assert!(outcome.is_found());
        }

        let collection = store.get_collection("ollama-embeddings-test").await.unwrap().unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), documents.len());
    }

    #[tokio::test]
    async fn test_add_documents_is_not_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let embedder = Embedder::new(Arc::new(ScriptedProvider::new()), "nomic-embed-text:latest");
        let client = EmbeddingStore::new(store.clone(), embedder, 16);

        let collection = client.ensure_collection("dupes").await.unwrap();
        let docs = vec!["one".to_string(), "two".to_string()];

        let first = client.add_documents(&collection, &docs).await.into_result().unwrap();
        let second = client.add_documents(&collection, &docs).await.into_result().unwrap();

        assert_eq!(client.count(&collection).await.unwrap(), 4);
        assert!(first.iter().all(|id| !second.contains(id)));
    }

    #[tokio::test]
    async fn test_documents_are_tagged_with_their_text() {
        let store = Arc::new(MemoryStore::new());
        let embedder = Embedder::new(Arc::new(ScriptedProvider::new()), "nomic-embed-text:latest");
        let client = EmbeddingStore::new(store.clone(), embedder.clone(), 16);

        let collection = client.ensure_collection("tagged").await.unwrap();
        client
            .add_documents(&collection, &["Llamas hum".to_string()])
            .await
            .into_result()
            .unwrap();

        let query = embedder.embed("Llamas hum").await.unwrap();
        let results = client.query(&collection, &query, 1).await.unwrap();

        assert_eq!(results[0].document.metadata.get(NAME_METADATA_KEY).map(String::as_str), Some("Llamas hum"));
        assert!(uuid::Uuid::parse_str(&results[0].document.id).is_ok());
    }
}
