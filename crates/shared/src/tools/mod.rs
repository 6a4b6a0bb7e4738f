use anyhow::Result;
use serde_json::{Value, json};
use tracing::warn;

use crate::schemas::{Tool, ToolSchema};

/// A set of named tools dispatched over `&self`. State a tool needs (such as
/// the document currently under analysis) lives in the implementing struct,
/// so two documents in flight can never share a toolbelt.
pub trait Toolbelt: Send + Sync {
    fn schemas(&self) -> Vec<ToolSchema>;

    fn has_tool(&self, name: &str) -> bool;

    fn dispatch(&self, name: &str, args: &Value) -> Result<String>;

    fn tools(&self) -> Vec<Tool> {
        self.schemas().iter().map(|s| s.to_tool()).collect()
    }
}

/// Executes requested tool calls against a toolbelt. Failures never escape:
/// an unknown name or a failed handler produces a `{"error": ...}` payload
/// the model can read and react to.
pub struct ToolInvoker<'a> {
    belt: &'a dyn Toolbelt,
}

const TRACE_EXCERPT_LIMIT: usize = 200;

impl<'a> ToolInvoker<'a> {
    pub fn new(belt: &'a dyn Toolbelt) -> Self {
        Self { belt }
    }

    /// Run one requested call and return the tool message content.
    pub fn invoke(&self, name: &str, args: &Value) -> String {
        if !self.belt.has_tool(name) {
            warn!(tool = name, "requested tool is not registered");
            return json!({ "error": format!("Function {name} not found") }).to_string();
        }

        match self.belt.dispatch(name, args) {
            Ok(content) => content,
            Err(e) => {
                let detail = excerpt(&format!("{e:#}"), TRACE_EXCERPT_LIMIT);
                warn!(tool = name, error = %detail, "tool execution failed");
                json!({ "error": format!("Error executing {name}: {detail}") }).to_string()
            }
        }
    }
}

fn excerpt(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((at, _)) => text[..at].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::ParameterSchema;

    struct EchoBelt;

    impl Toolbelt for EchoBelt {
        fn schemas(&self) -> Vec<ToolSchema> {
            vec![ToolSchema {
                name: "echo",
                description: "Echo the input back",
                parameters: vec![ParameterSchema {
                    name: "text",
                    type_name: "string",
                    items: None,
                    description: "Text to echo",
                    required: true,
                }],
            }]
        }

        fn has_tool(&self, name: &str) -> bool {
            name == "echo" || name == "broken"
        }

        fn dispatch(&self, name: &str, args: &Value) -> Result<String> {
            match name {
                "echo" => Ok(args["text"].as_str().unwrap_or_default().to_string()),
                "broken" => Err(anyhow::anyhow!("the handler blew up")),
                _ => Err(anyhow::anyhow!("Tool '{}' not found", name)),
            }
        }
    }

    #[test]
    fn unknown_tool_returns_not_found_payload() {
        let invoker = ToolInvoker::new(&EchoBelt);
        let content = invoker.invoke("missing_tool", &json!({}));
        let payload: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(payload["error"], "Function missing_tool not found");
    }

    #[test]
    fn handler_error_is_captured_not_propagated() {
        let invoker = ToolInvoker::new(&EchoBelt);
        let content = invoker.invoke("broken", &json!({}));
        let payload: Value = serde_json::from_str(&content).unwrap();
        let message = payload["error"].as_str().unwrap();
        assert!(message.starts_with("Error executing broken:"));
        assert!(message.contains("the handler blew up"));
    }

    #[test]
    fn successful_dispatch_passes_content_through() {
        let invoker = ToolInvoker::new(&EchoBelt);
        assert_eq!(invoker.invoke("echo", &json!({"text": "hi"})), "hi");
    }

    #[test]
    fn error_excerpt_is_bounded() {
        struct NoisyBelt;
        impl Toolbelt for NoisyBelt {
            fn schemas(&self) -> Vec<ToolSchema> {
                vec![]
            }
            fn has_tool(&self, _name: &str) -> bool {
                true
            }
            fn dispatch(&self, _name: &str, _args: &Value) -> Result<String> {
                Err(anyhow::anyhow!("x".repeat(1000)))
            }
        }

        let invoker = ToolInvoker::new(&NoisyBelt);
        let content = invoker.invoke("noisy", &json!({}));
        let payload: Value = serde_json::from_str(&content).unwrap();
        let message = payload["error"].as_str().unwrap();
        assert!(message.len() < 300);
    }
}
