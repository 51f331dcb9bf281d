//! Answer generation from a question and retrieved context.

use crate::provider::{ChatRequest, Message, Provider, ProviderError};
use std::sync::Arc;
use tracing::{debug, error};

/// Builds the single prompt sent to the model.
pub fn compose_prompt(question: &str, context: &str) -> String {
    format!("Using this data: {}. Respond to this prompt: {}", context, question)
}

/// Asks the chat model to answer a question using retrieved context.
#[derive(Clone)]
pub struct Answerer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
}

impl Answerer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.8,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn from_config(config: &crate::Config, provider: Arc<dyn Provider>) -> Self {
        Self::new(provider, config.llm.model.clone()).with_temperature(config.llm.temperature)
    }

    /// Returns the model's reply, or `None` if the call failed.
    ///
    /// Failures are logged here and never reach the caller.
    pub async fn answer(&self, question: &str, context: &str) -> Option<String> {
        match self.try_answer(question, context).await {
            Ok(content) => Some(content),
            Err(e) => {
                error!(model = %self.model, "Error getting chat response: {}", e);
                None
            }
        }
    }

    /// Like [`answer`](Self::answer) but surfaces the provider error.
    pub async fn try_answer(&self, question: &str, context: &str) -> Result<String, ProviderError> {
        let prompt = compose_prompt(question, context);
        debug!("Composed prompt: {}", prompt);

        // No tools: the model answers from the context alone.
        let request = ChatRequest::new(&self.model, vec![Message::user(prompt)])
            .with_temperature(self.temperature)
            .with_tools(Vec::new());

        let response = self.provider.complete(request).await?;
        Ok(response.message.content)
    }
}
