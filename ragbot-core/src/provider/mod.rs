//! LLM provider abstraction layer.
//!
//! This module defines a common interface for LLM backends to provide chat
//! completions and embeddings.

mod types;
pub mod ollama;

// Re-export common types
pub use types::{
    Provider,
    ProviderError,
    Result,
    ChatRequest,
    ChatResponse,
    Message,
    Tool,
    ToolFunction,
    EmbedRequest,
    EmbedResponse,
    ModelInfo,
};

// Re-export provider implementations
pub use ollama::OllamaProvider;
