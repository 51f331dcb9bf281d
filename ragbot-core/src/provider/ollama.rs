//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements the Provider trait.

use super::types::*;
use async_trait::async_trait;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a new Ollama provider talking to `base_url`
    /// (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self::new(&config.llm.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let tags = response.json::<OllamaTagsResponse>().await?;
        Ok(tags.models)
    }

    async fn post_chat(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);
        let ollama_request = OllamaChatRequest::from_request(request, stream);

        debug!(model = %request.model, stream, "Sending chat request");

        let response = self.http_client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        Ok(response)
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::from_config(&crate::Config::default())
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        let response = self.post_chat(&request, true).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            for ollama_response in drain_complete_lines(&mut buffer) {
                callback(ollama_response.into());
            }
        }

        // A final object without a trailing newline
        if !buffer.is_empty() {
            buffer.push(b'\n');
            for ollama_response in drain_complete_lines(&mut buffer) {
                callback(ollama_response.into());
            }
        }

        Ok(())
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let response = self.post_chat(&request, false).await?;
        let ollama_response = response.json::<OllamaChatResponse>().await?;
        Ok(ollama_response.into())
    }

    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);

        let embed_request = EmbedRequest {
            model: model.to_string(),
            input: text.to_string(),
        };

        let response = self.http_client
            .post(&url)
            .json(&embed_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let embed_response = response.json::<EmbedResponse>().await?;

        embed_response.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No embeddings returned".to_string()))
    }
}

/// Removes every newline-terminated line from `buffer` and parses it.
///
/// A trailing partial line stays in the buffer for the next network chunk.
/// Lines that are not valid chat responses are skipped.
fn drain_complete_lines(buffer: &mut Vec<u8>) -> Vec<OllamaChatResponse> {
    let mut responses = Vec::new();

    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
        let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();

        if line.len() <= 1 {
            continue;
        }

        let line_str = String::from_utf8_lossy(&line[..line.len() - 1]);

        match serde_json::from_str::<OllamaChatResponse>(&line_str) {
            Ok(response) => responses.push(response),
            Err(e) => debug!("Skipping unparseable stream line: {}", e),
        }
    }

    responses
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<String, serde_json::Value>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

impl OllamaChatRequest {
    fn from_request(request: &ChatRequest, stream: bool) -> Self {
        let mut options = HashMap::new();
        options.insert("temperature".to_string(), serde_json::json!(request.temperature));

        Self {
            model: request.model.clone(),
            messages: request.messages.iter().map(|m| OllamaMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            }).collect(),
            options: Some(options),
            stream,
            tools: request.tools.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaChatResponse {
    model: String,
    #[serde(default)]
    created_at: String,
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    done_reason: Option<String>,
}

impl From<OllamaChatResponse> for ChatResponse {
    fn from(response: OllamaChatResponse) -> Self {
        ChatResponse {
            model: response.model,
            content: response.message.content.clone(),
            done: response.done,
            message: Message {
                role: response.message.role,
                content: response.message.content,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_tools_or_stream() {
        let request = ChatRequest::new("llama3.1:latest", vec![Message::user("hi")])
            .with_tools(Vec::new());

        let value = serde_json::to_value(OllamaChatRequest::from_request(&request, false)).unwrap();

        assert_eq!(value["model"], "llama3.1:latest");
        assert_eq!(value["stream"], false);
        assert_eq!(value["tools"], serde_json::json!([]));
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_tools_omitted_when_unset() {
        let request = ChatRequest::new("llama3.1:latest", vec![Message::user("hi")]);
        let value = serde_json::to_value(OllamaChatRequest::from_request(&request, true)).unwrap();

        assert!(value.get("tools").is_none());
        assert_eq!(value["stream"], true);
    }

    #[test]
    fn test_drain_keeps_partial_line() {
        let mut buffer = concat!(
            r#"{"model":"m","message":{"role":"assistant","content":"Hel"},"done":false}"#,
            "\n",
            r#"{"model":"m","message":{"role":"assistant","content":"lo"},"done":false}"#,
            "\n",
            r#"{"model":"m","message":{"role":"assis"#,
        )
        .as_bytes()
        .to_vec();

        let responses = drain_complete_lines(&mut buffer);

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].message.content, "Hel");
        assert_eq!(responses[1].message.content, "lo");
        assert!(buffer.starts_with(br#"{"model":"m""#));
    }

    #[test]
    fn test_final_chunk_conversion() {
        let raw = r#"{"model":"m","created_at":"2024-01-01T00:00:00Z","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#;
        let response: ChatResponse = serde_json::from_str::<OllamaChatResponse>(raw).unwrap().into();

        assert!(response.done);
        assert_eq!(response.message.role, "assistant");
        assert!(response.content.is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = OllamaProvider::new("http://rag_ollama:11434/");
        assert_eq!(provider.base_url(), "http://rag_ollama:11434");
    }
}
