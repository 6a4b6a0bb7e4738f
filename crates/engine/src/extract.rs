// crates/engine/src/extract.rs
//! Per-document extraction pipeline: profile the document, then synthesize
//! product articles, reference materials, and client files through
//! tool-driven retrieval. Every step degrades to a usable default instead
//! of aborting the document batch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{Config, MODEL_FAST, MODEL_SMART};
use crate::document;
use crate::document::index::DocumentIndex;
use crate::document::retriever::Retriever;
use crate::kb;
use crate::llm::ChatBackend;
use crate::llm::driver::{ChatOutcome, Driver, OutputFormat};

const FAST_TIMEOUT: Duration = Duration::from_secs(120);
const SMART_TIMEOUT: Duration = Duration::from_secs(300);

const METADATA_SAMPLE_CHARS: usize = 15_000;
const CLIENT_SAMPLE_CHARS: usize = 20_000;

/// The model returns this marker instead of a stub article when a product
/// is only mentioned in passing.
const INSUFFICIENT_INFORMATION: &str = "INSUFFICIENT_INFORMATION";

/// What kind of document this is and who it concerns.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentProfile {
    #[serde(default)]
    pub products: Vec<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default = "default_document_type")]
    pub document_type: String,
    #[serde(default = "default_document_category")]
    pub document_category: String,
}

fn default_document_type() -> String {
    "Specification".to_string()
}

fn default_document_category() -> String {
    "General".to_string()
}

impl DocumentProfile {
    /// Used when profiling itself failed; processing continues with no
    /// products and no client.
    fn unknown() -> Self {
        Self {
            products: Vec::new(),
            client_name: None,
            document_type: "Unknown".to_string(),
            document_category: "General".to_string(),
        }
    }
}

/// One reusable knowledge item (guide, template, procedure, ...) the model
/// lifted out of a document.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceMaterial {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub struct Extractor<'a> {
    backend: &'a dyn ChatBackend,
    config: &'a Config,
}

impl<'a> Extractor<'a> {
    pub fn new(backend: &'a dyn ChatBackend, config: &'a Config) -> Self {
        Self { backend, config }
    }

    /// Run the full pipeline for one document and persist the results.
    pub async fn process_document(&self, doc_path: &Path, base_dir: &Path) -> Result<()> {
        info!(document = %doc_path.display(), "processing document");

        let existing_structure = kb::scan_existing_structure(base_dir);

        let loaded = document::load(doc_path)?;
        let index = Arc::new(DocumentIndex::build(&loaded, doc_path));
        info!(
            sections = index.section_count(),
            author = %index.metadata().author,
            modified = index.metadata().modified.as_deref().unwrap_or("Unknown"),
            "document indexed"
        );

        let profile = self
            .extract_metadata(index.full_content(), &existing_structure)
            .await;
        info!(
            products = ?profile.products,
            client = profile.client_name.as_deref().unwrap_or("None"),
            doc_type = %profile.document_type,
            category = %profile.document_category,
            "document analysis"
        );

        for product in &profile.products {
            info!(product = %product, "extracting product knowledge");
            let knowledge = self
                .extract_product_knowledge(product, &index, &existing_structure)
                .await;

            if knowledge.contains(INSUFFICIENT_INFORMATION) {
                info!(product = %product, "skipping, insufficient information in document");
                continue;
            }

            let materials = self
                .extract_reference_materials(product, &index, &existing_structure)
                .await;

            kb::save_product_knowledge(
                base_dir,
                product,
                &knowledge,
                &materials,
                &profile.document_type,
                &profile.document_category,
                index.metadata(),
            )?;
        }

        if let Some(client_name) = profile.client_name.as_deref() {
            if is_real_client_name(client_name) {
                info!(client = client_name, "extracting client information");
                let client_data = self
                    .extract_client_info(client_name, index.full_content(), &existing_structure)
                    .await;
                if !client_data.is_empty() {
                    kb::save_client_info(base_dir, client_name, &client_data)?;
                }
            }
        }

        info!(document = %doc_path.display(), "completed");
        Ok(())
    }

    /// Identify products, client, and document type from a content sample.
    pub async fn extract_metadata(
        &self,
        content: &str,
        existing_structure: &str,
    ) -> DocumentProfile {
        let sample = sample(content, METADATA_SAMPLE_CHARS);
        let company_context = self.config.company.preamble();
        let us = self.config.company.name_or_us();

        let prompt = format!(
            r#"{company_context}Analyze this document intelligently and extract all relevant metadata.

{existing_structure}

DOCUMENT CONTENT:
{sample}

INSTRUCTIONS:
1. **Products/Systems**: Identify products/systems that are SUBSTANTIALLY discussed
   - ONLY include if: The document provides technical details, procedures, or configuration info
   - EXCLUDE if: Just mentioned in passing, listed in a table, or used as an example
   - Look for: Product names, software systems, equipment models, platforms, tools
   - If products already exist in structure above, use EXACT same name
   - Quality over quantity - better to miss a minor mention than create useless stubs

2. **Client**: Identify the client/customer this document is for
   - Look for: Company names, project names, client references
   - Distinguish between: our company ({us}), the client, and vendors
   - If client exists in structure above, use EXACT same name
   - Return null if this is internal documentation (no specific client)

3. **Document Type**: What kind of document is this?
   - Examples: "User Manual", "Technical Specification", "How-To Guide",
     "Installation Guide", "Configuration Guide", "Process Document",
     "Technical Guide", "Reference Manual", "Standard Operating Procedure"

4. **Document Category**: What technical area does this cover?
   - Examples: "Version Control", "Controls Systems", "Electrical",
     "Installation", "Configuration", "Maintenance", "Safety", "Engineering"

Return ONLY valid JSON in this exact format:
{{
    "products": ["Product1", "Product2"],
    "client_name": "ClientName or null",
    "document_type": "DocumentType",
    "document_category": "Category"
}}
"#
        );

        let driver = Driver::new(self.backend, MODEL_FAST, FAST_TIMEOUT);
        match driver
            .run(&prompt, OutputFormat::Json)
            .await
        {
            Ok(ChatOutcome::Json(value)) => match serde_json::from_value(value) {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(error = %e, "document profile had an unexpected shape");
                    DocumentProfile::unknown()
                }
            },
            Ok(ChatOutcome::Text(_)) => {
                warn!("document profile response was not JSON");
                DocumentProfile::unknown()
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to extract document metadata");
                DocumentProfile::unknown()
            }
        }
    }

    /// Write a wiki article about one product, letting the model pull
    /// sections through the retrieval tools.
    pub async fn extract_product_knowledge(
        &self,
        product_name: &str,
        index: &Arc<DocumentIndex>,
        existing_structure: &str,
    ) -> String {
        let retriever = Retriever::new(Arc::clone(index));
        let structure_summary = index.outline();
        let company_context = self.config.company.preamble();

        let prompt = format!(
            r###"{company_context}You are analyzing a technical document to extract knowledge about {product_name}.

{existing_structure}

NOTE: If {product_name} already exists in the structure above, this content will be ADDED to existing knowledge.
Focus on extracting NEW information that complements what might already exist.

{structure_summary}

TASK: Write a professional wiki article about {product_name}.

CRITICAL - INSUFFICIENT INFORMATION DETECTION:
- If {product_name} is only mentioned in passing (1-2 brief mentions)
- If there's no technical information about {product_name}
- If {product_name} is just listed as an example or in a table
- Then return ONLY this text: "INSUFFICIENT_INFORMATION"
- Do NOT create a stub article - just return the marker

CRITICAL - WIKI STYLE REQUIREMENTS (when sufficient information exists):
- Write DIRECTLY as a wiki article - ABSOLUTELY NO meta-commentary
- NEVER say: "after reviewing", "based on the document", "this document", "let me", "I now have", "I will write", etc.
- Do NOT explain your analysis process or what you're doing
- Start IMMEDIATELY with "## Overview" - no preamble text before it
- Write in present tense, factual, encyclopedic style

Create a wiki article with these sections (only include sections with actual content):

## Overview
What {product_name} is, its purpose, and how it's used in our industry.

## Features & Capabilities
List features, technical specifications, and key functionalities.

## Integration & Interfaces
How it integrates with other systems, data exchanges, connected systems.

## Configuration & Setup
Configuration options, settings, setup requirements, installation.

## Usage & Operations
How to use it, common operations, workflows, procedures.

## Technical Details
Architecture, design, database schema, APIs, technical specs.

## Engineering Notes
How we configure/customize it, common issues, solutions, best practices.

INSTRUCTIONS:
1. Use the tools to retrieve sections about {product_name}
2. Write clean, direct wiki content
3. Use present tense (e.g., "Git is...", not "The document describes Git as...")
4. Include tables, lists, code blocks where appropriate
5. Be specific and technical - avoid generic statements
6. If minimal information exists, write brief article and stop

CRITICAL: Your response must START with "## Overview" immediately.
NO text before it. NO explanations. Return ONLY pure wiki article markdown.
"###
        );

        let driver = Driver::new(self.backend, MODEL_SMART, SMART_TIMEOUT);
        match driver
            .run_with_tools(&prompt, &retriever, OutputFormat::Text)
            .await
        {
            Ok(outcome) => {
                let article = outcome.into_text();
                info!(product = product_name, chars = article.len(), "extracted knowledge");
                article
            }
            Err(e) => {
                warn!(product = product_name, error = %format!("{e:#}"), "failed to extract product knowledge");
                format!("# {product_name}\n\nError extracting knowledge: {e:#}")
            }
        }
    }

    /// Lift reusable reference materials (guides, templates, procedures)
    /// out of the document as structured items.
    pub async fn extract_reference_materials(
        &self,
        product_name: &str,
        index: &Arc<DocumentIndex>,
        existing_structure: &str,
    ) -> Vec<ReferenceMaterial> {
        let retriever = Retriever::new(Arc::clone(index));
        let structure_summary = index.outline();
        let company_context = self.config.company.preamble();

        let prompt = format!(
            r###"{company_context}We are building a comprehensive technical knowledge base. Analyze this document intelligently and extract ALL valuable knowledge for future reference.

{existing_structure}

{structure_summary}

TASK: Identify 1-3 different ways this document provides valuable knowledge. Think beyond just the document itself - extract the KNOWLEDGE it contains.

INSTRUCTIONS:
1. Review the document structure above
2. Use the provided tools to retrieve relevant sections
3. Extract knowledge that would be useful to engineers, technicians, and project teams

KNOWLEDGE CATEGORIES TO CONSIDER:

**DOCUMENT_TEMPLATE** - Document structure/format for creating similar documents
**ENGINEERING** - Technical configuration, setup, or design knowledge
**HOW_TO** - Step-by-step instructions to accomplish specific tasks
**INSTALLATION** - Installation and setup procedures
**CONFIGURATION** - Configuration guides and settings
**SETUP** - Initial setup and initialization procedures
**PROCEDURE** - Standard operating procedures or processes
**REFERENCE** - Reference information, standards, specifications
**BEST_PRACTICES** - Recommended approaches and methodologies

For EACH piece of valuable knowledge, return a JSON object with:
- type: One of the types above (DOCUMENT_TEMPLATE, ENGINEERING, HOW_TO, etc.)
- title: Clear, descriptive title (e.g., "How to Configure Git Repositories")
- category: Technical category (e.g., "Version Control", "Controls Systems", "Installation")
- content: The extracted knowledge in complete markdown format (not just a summary!)
- tags: 3-5 relevant tags (lowercase, hyphenated: e.g., "git", "version-control", "azure-devops")

Return a JSON array of 1-3 knowledge items:
[
    {{
        "type": "HOW_TO",
        "title": "How to Configure Git Repositories",
        "category": "Version Control",
        "content": "# How to Configure Git Repositories\n\n## Overview\n...full content...",
        "tags": ["git", "version-control", "configuration", "repository"]
    }}
]

CRITICAL - WIKI CONTENT REQUIREMENTS:
- Write content as clean, professional wiki articles
- ABSOLUTELY NO meta-commentary in the content field
- NEVER say: "this guide covers", "we will show", "based on the document", "I now have", etc.
- Start directly with the heading - NO explanatory text before it
- Use present tense, factual, encyclopedic style
- Extract COMPLETE content, not summaries
- Be specific to {product_name} where relevant
- Include code blocks, tables, lists as appropriate

Return ONLY valid JSON array, no preamble or explanation before it.
"###
        );

        let driver = Driver::new(self.backend, MODEL_SMART, SMART_TIMEOUT);
        let outcome = driver
            .run_with_tools(&prompt, &retriever, OutputFormat::Json)
            .await;

        let materials = match outcome {
            Ok(ChatOutcome::Json(value)) => {
                // A single object instead of an array still counts as one item.
                let normalized = match value {
                    Value::Array(_) => value,
                    other => Value::Array(vec![other]),
                };
                match serde_json::from_value::<Vec<ReferenceMaterial>>(normalized) {
                    Ok(materials) => materials,
                    Err(e) => {
                        warn!(error = %e, "reference materials had an unexpected shape");
                        Vec::new()
                    }
                }
            }
            Ok(ChatOutcome::Text(_)) => {
                warn!(product = product_name, "reference material response was not JSON");
                Vec::new()
            }
            Err(e) => {
                warn!(product = product_name, error = %format!("{e:#}"), "failed to extract reference materials");
                Vec::new()
            }
        };

        info!(
            product = product_name,
            count = materials.len(),
            "identified reference materials"
        );
        materials
    }

    /// Extract client information as an open-ended category map.
    pub async fn extract_client_info(
        &self,
        client_name: &str,
        content: &str,
        existing_structure: &str,
    ) -> serde_json::Map<String, Value> {
        let sample = sample(content, CLIENT_SAMPLE_CHARS);

        let prompt = format!(
            r#"Extract information about {client_name} from this document and organize into categories.

{existing_structure}

NOTE: Check if {client_name} already exists in the structure above.
If they do, check what categories already exist (e.g., overview.md, locations.md, hardware.md).
You can use existing categories OR suggest new ones that fit the pattern.

DOCUMENT CONTENT:
{sample}

Return ONLY valid JSON in this exact format:
{{
    "overview": "Brief overview of the client and project",
    "locations": ["Location 1 with details", "Location 2 with details"],
    "hardware": ["Hardware item 1", "Hardware item 2"],
    "configuration": ["Config detail 1", "Config detail 2"],
    "contacts": ["Contact 1", "Contact 2"]
}}

You can add additional categories if needed (e.g., "software", "network", "security").
Be comprehensive and extract all relevant details.
"#
        );

        let driver = Driver::new(self.backend, MODEL_FAST, FAST_TIMEOUT);
        match driver
            .run(&prompt, OutputFormat::Json)
            .await
        {
            Ok(ChatOutcome::Json(Value::Object(map))) => map,
            Ok(_) => {
                warn!(client = client_name, "client info response was not a JSON object");
                serde_json::Map::new()
            }
            Err(e) => {
                warn!(client = client_name, error = %format!("{e:#}"), "failed to extract client info");
                serde_json::Map::new()
            }
        }
    }
}

/// Placeholder names the model uses when no client applies.
fn is_real_client_name(name: &str) -> bool {
    !name.is_empty() && !matches!(name.to_lowercase().as_str(), "none" | "unknown" | "n/a")
}

fn sample(content: &str, limit: usize) -> &str {
    match content.char_indices().nth(limit) {
        Some((at, _)) => &content[..at],
        None => content,
    }
}
