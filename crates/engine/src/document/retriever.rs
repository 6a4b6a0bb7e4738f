use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

use crate::document::index::DocumentIndex;
use chronicler_shared::register_toolbelt;

/// The retrieval toolbelt the model works with during extraction. Holds the
/// index of exactly one document; a new `Retriever` is built for every
/// document, so overlapping extractions can never read each other's
/// sections.
pub struct Retriever {
    index: Arc<DocumentIndex>,
}

impl Retriever {
    pub fn new(index: Arc<DocumentIndex>) -> Self {
        Self { index }
    }
}

register_toolbelt! {
    Retriever {
        tools: {
            "get_section_by_index" => get_section_by_index {
                description: "Retrieve a specific section from the document by its index.",
                params: ["section_index": "integer" => "The index number of the section to retrieve (starting from 1)"]
            },
            "get_section_by_heading" => get_section_by_heading {
                description: "Search for and retrieve a section by heading name or keyword.",
                params: ["heading_keyword": "string" => "A keyword or phrase to search for in section headings"]
            },
            "get_multiple_sections" => get_multiple_sections {
                description: "Retrieve multiple sections at once by their indices.",
                params: ["section_indices": "array" ["integer"] => "List of section index numbers to retrieve"]
            },
        }
    }
}

impl Retriever {
    fn get_section_by_index(&self, args: &Value) -> Result<String> {
        let section_index = args["section_index"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("missing required parameter 'section_index'"))?;

        info!(section_index, "tool call: get_section_by_index");
        let result = self.index.section_by_index(section_index);
        debug!(result = %first_line(&result), "retrieved");
        Ok(result)
    }

    fn get_section_by_heading(&self, args: &Value) -> Result<String> {
        let heading_keyword = args["heading_keyword"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("missing required parameter 'heading_keyword'"))?;

        info!(heading_keyword, "tool call: get_section_by_heading");
        let result = self.index.section_by_heading(heading_keyword);
        debug!(result = %first_line(&result), "retrieved");
        Ok(result)
    }

    fn get_multiple_sections(&self, args: &Value) -> Result<String> {
        let section_indices: Vec<i64> = args["section_indices"]
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("missing required parameter 'section_indices'"))?
            .iter()
            .filter_map(|v| v.as_i64())
            .collect();

        info!(?section_indices, "tool call: get_multiple_sections");
        let result = self.index.multiple_sections(&section_indices);
        debug!(result = %first_line(&result), "retrieved");
        Ok(result)
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
