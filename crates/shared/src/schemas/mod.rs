// crates/shared/src/schemas
use serde::Serialize;
use serde_json::{Value, json};

/// Declarative description of one model-invokable tool. Declared once per
/// toolbelt (usually through `register_toolbelt!`) and never mutated.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterSchema>,
}

/// One parameter of a tool. `type_name` is a JSON-schema type tag
/// ("string", "integer", "number", "boolean", "object", "array");
/// `items` carries the element type tag when `type_name` is "array".
#[derive(Debug, Clone)]
pub struct ParameterSchema {
    pub name: &'static str,
    pub type_name: &'static str,
    pub items: Option<&'static str>,
    pub description: &'static str,
    pub required: bool,
}

/// Wire form sent to the chat backend.
#[derive(Serialize, Clone, Debug)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Serialize, Clone, Debug)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn to_tool(&self) -> Tool {
        let mut properties = json!({});
        let mut required = vec![];

        for param in &self.parameters {
            let description = if param.description.is_empty() {
                format!("The {} parameter", param.name)
            } else {
                param.description.to_string()
            };

            let mut schema = json!({
                "type": param.type_name,
                "description": description,
            });
            if let Some(items) = param.items {
                schema["items"] = json!({ "type": items });
            }
            properties[param.name] = schema;

            if param.required {
                required.push(param.name);
            }
        }

        let description = if self.description.is_empty() {
            self.name.to_string()
        } else {
            self.description.to_string()
        };

        Tool {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.to_string(),
                description,
                parameters: json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                }),
            },
        }
    }
}
