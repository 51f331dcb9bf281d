//! Interactive chat loop over a line-oriented input.

use crate::provider::{ChatRequest, Message, Provider};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Input that ends the session.
pub const EXIT_COMMAND: &str = "/bye";

const INPUT_PROMPT: &str = ">>> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Terminated,
}

/// What a single line of input asks the session to do.
#[derive(Debug, PartialEq, Eq)]
enum Turn<'a> {
    Exit,
    Skip,
    Ask(&'a str),
}

fn classify(line: &str) -> Turn<'_> {
    let text = line.trim();
    if text == EXIT_COMMAND {
        Turn::Exit
    } else if text.is_empty() {
        Turn::Skip
    } else {
        Turn::Ask(text)
    }
}

/// Streams a model reply for every line read until EOF or `/bye`.
///
/// Turns are independent: no history is sent with a request.
pub struct ChatSession {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f64,
    state: SessionState,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.8,
            state: SessionState::AwaitingInput,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn from_config(config: &crate::Config, provider: Arc<dyn Provider>) -> Self {
        Self::new(provider, config.llm.model.clone()).with_temperature(config.llm.temperature)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the loop and returns the number of generation calls made.
    ///
    /// A failed generation is reported on `output` and the loop goes on.
    /// Only I/O errors on `input` or `output` end it early.
    pub async fn run<R, W>(&mut self, mut input: R, output: &mut W) -> std::io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: Write + Send,
    {
        let mut turns = 0;
        let mut line = String::new();

        while self.state == SessionState::AwaitingInput {
            write!(output, "{}", INPUT_PROMPT)?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line).await? == 0 {
                writeln!(output)?;
                self.state = SessionState::Terminated;
                break;
            }

            match classify(&line) {
                Turn::Exit => self.state = SessionState::Terminated,
                Turn::Skip => continue,
                Turn::Ask(text) => {
                    turns += 1;
                    self.stream_reply(text, output).await?;
                }
            }
        }

        debug!(turns, "Chat session ended");
        Ok(turns)
    }

    async fn stream_reply<W: Write + Send>(&self, text: &str, output: &mut W) -> std::io::Result<()> {
        let request = ChatRequest::new(&self.model, vec![Message::user(text)])
            .with_temperature(self.temperature);

        let mut write_error = None;
        let result = self
            .provider
            .chat(
                request,
                Box::new(|response| {
                    if write_error.is_some() || response.message.content.is_empty() {
                        return;
                    }
                    let written = output
                        .write_all(response.message.content.as_bytes())
                        .and_then(|_| output.flush());
                    if let Err(e) = written {
                        write_error = Some(e);
                    }
                }),
            )
            .await;

        if let Some(e) = write_error {
            return Err(e);
        }

        match result {
            Ok(()) => writeln!(output),
            Err(e) => {
                warn!(model = %self.model, "Chat request failed: {}", e);
                writeln!(output)?;
                writeln!(output, "Error: {}", e)
            }
        }
    }
}
