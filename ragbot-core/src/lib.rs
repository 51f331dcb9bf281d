//! ragbot-core - Retrieval augmented question answering over a small corpus
//!
//! Provides the components behind the ragbot service:
//! - LLM provider abstraction (Ollama)
//! - RAG retrieval over Chroma, Qdrant or an in-memory store
//! - Answer generation from retrieved context
//! - Configuration management
//! - HTTP server and interactive chat session
//!
//! ## Primary API
//!
//! Users should interact with ragbot via the `Server` API or `ChatSession`.

// Public modules
pub mod answer;
pub mod config;
pub mod knowledge;
pub mod provider;
pub mod rag;
pub mod server;
pub mod session;

#[cfg(test)]
mod test_support;

// Public exports
pub use answer::{compose_prompt, Answerer};
pub use config::{Config, ConfigError, StorageMode};
pub use rag::{RagError, RetrievalOutcome, Retriever};
pub use server::{build_router, AppState, Server};
pub use session::{ChatSession, SessionState};

// Provider exports
pub use provider::{ChatRequest, ChatResponse, Message, OllamaProvider, Provider, ProviderError};
