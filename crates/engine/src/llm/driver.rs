use std::time::Duration;

use anyhow::Result;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::Message;
use crate::llm::parse::parse_json_response;
use crate::llm::{ChatBackend, ChatRequest};
use chronicler_shared::{ToolInvoker, Toolbelt};

/// Hard ceiling on model round trips for one request. A model that keeps
/// asking for tools past this point gets cut off and the last content wins.
const MAX_ITERATIONS: usize = 20;

const TEMPERATURE: f32 = 1.0;

/// What the caller wants back from the final assistant message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug)]
pub enum ChatOutcome {
    Text(String),
    Json(Value),
}

impl ChatOutcome {
    pub fn into_text(self) -> String {
        match self {
            ChatOutcome::Text(text) => text,
            ChatOutcome::Json(value) => value.to_string(),
        }
    }
}

/// Drives one multi-turn exchange: send the conversation, execute whatever
/// tool calls come back, feed the results in, repeat until the model stops.
pub struct Driver<'a, B: ChatBackend + ?Sized> {
    backend: &'a B,
    model: String,
    timeout: Duration,
}

impl<'a, B: ChatBackend + ?Sized> Driver<'a, B> {
    pub fn new(backend: &'a B, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            backend,
            model: model.into(),
            timeout,
        }
    }

    /// Plain exchange with no tools on offer.
    pub async fn run(&self, prompt: &str, format: OutputFormat) -> Result<ChatOutcome> {
        self.exchange(prompt, None, format).await
    }

    /// Exchange with a toolbelt advertised; the model decides whether and
    /// when to call into it.
    pub async fn run_with_tools(
        &self,
        prompt: &str,
        toolbelt: &dyn Toolbelt,
        format: OutputFormat,
    ) -> Result<ChatOutcome> {
        self.exchange(prompt, Some(toolbelt), format).await
    }

    async fn exchange(
        &self,
        prompt: &str,
        toolbelt: Option<&dyn Toolbelt>,
        format: OutputFormat,
    ) -> Result<ChatOutcome> {
        let mut messages = vec![Message::user(prompt)];

        let tools = toolbelt
            .map(|belt| belt.tools())
            .filter(|tools| !tools.is_empty());

        let mut last_content = None;

        for iteration in 1..=MAX_ITERATIONS {
            let request = ChatRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: TEMPERATURE,
                tools: tools.clone(),
                tool_choice: tools.as_ref().map(|_| "auto".to_string()),
                max_tokens: None,
            };

            let response = self.backend.complete(&request, self.timeout).await?;
            let choice = response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| anyhow::anyhow!("chat response contained no choices"))?;

            if let Some(content) = &choice.message.content {
                last_content = Some(content.clone());
            }

            match choice.finish_reason.as_deref() {
                Some("stop") => {
                    let content = choice.message.content.unwrap_or_default();
                    if format == OutputFormat::Json && !content.is_empty() {
                        return Ok(match parse_json_response(&content) {
                            Ok(value) => ChatOutcome::Json(value),
                            // A malformed payload is still an answer; the
                            // caller decides what to do with raw text.
                            Err(e) => {
                                debug!(error = %e, "structured decode failed, returning raw text");
                                ChatOutcome::Text(content)
                            }
                        });
                    }
                    return Ok(ChatOutcome::Text(content));
                }
                Some("tool_calls") if choice.message.tool_calls.is_some() => {
                    let calls = choice.message.tool_calls.clone().unwrap_or_default();
                    messages.push(choice.message.to_message());

                    debug!(iteration, calls = calls.len(), "executing requested tool calls");
                    for call in calls {
                        let content = match toolbelt {
                            Some(belt) => match serde_json::from_str::<Value>(&call.function.arguments) {
                                Ok(args) => ToolInvoker::new(belt).invoke(&call.function.name, &args),
                                Err(e) => json!({
                                    "error": format!(
                                        "Error executing {}: invalid arguments: {e}",
                                        call.function.name
                                    )
                                })
                                .to_string(),
                            },
                            None => json!({
                                "error": format!("Function {} not found", call.function.name)
                            })
                            .to_string(),
                        };
                        messages.push(Message::tool(call.id, call.function.name, content));
                    }
                }
                other => {
                    warn!(finish_reason = ?other, "unexpected finish signal, ending exchange");
                    break;
                }
            }
        }

        // Loop bound exhausted or the model sent something unrecognized:
        // return whatever content exists rather than failing the turn.
        Ok(ChatOutcome::Text(last_content.unwrap_or_default()))
    }
}
