//! In-process provider used by unit tests.

use crate::provider::{ChatRequest, ChatResponse, Provider, ProviderError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

const DIM: usize = 256;

/// Provider with bag-of-words embeddings and canned chat replies.
///
/// Texts sharing words get similar vectors, which is enough for nearest
/// neighbor tests over the llama documents.
pub struct ScriptedProvider {
    chunks: Vec<String>,
    fail_embeddings: AtomicBool,
    fail_chat: bool,
    pub requests: Mutex<Vec<ChatRequest>>,
    pub stream_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            chunks: vec!["Llamas ".to_string(), "are ".to_string(), "camelids.".to_string()],
            fail_embeddings: AtomicBool::new(false),
            fail_chat: false,
            requests: Mutex::new(Vec::new()),
            stream_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_embeddings(self) -> Self {
        self.set_embeddings_failing(true);
        self
    }

    pub fn set_embeddings_failing(&self, failing: bool) {
        self.fail_embeddings.store(failing, Ordering::SeqCst);
    }

    pub fn failing_chat(mut self) -> Self {
        self.fail_chat = true;
        self
    }

    pub fn recorded(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn stream_count(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }
}

pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
        vector[(hash % DIM as u64) as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if self.fail_chat {
            return Err(ProviderError::Api("model not found".to_string()));
        }

        for chunk in &self.chunks {
            callback(ChatResponse::assistant(&request.model, chunk, false));
        }
        callback(ChatResponse::assistant(&request.model, "", true));
        Ok(())
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());

        if self.fail_chat {
            return Err(ProviderError::Api("model not found".to_string()));
        }

        Ok(ChatResponse::assistant(&request.model, self.chunks.concat(), true))
    }

    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>> {
        if self.fail_embeddings.load(Ordering::SeqCst) {
            return Err(ProviderError::Other("embedding model unavailable".to_string()));
        }
        Ok(bag_of_words(text))
    }
}
