// crates/engine/src/kb.rs
//! On-disk knowledge base: Products/<name>/ with an overview and reference
//! materials, Clients/<name>/ with one file per category. Every file gets
//! YAML front matter so downstream wikis can index it.

use std::path::{Path, PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::document::index::DocumentMetadata;
use crate::extract::ReferenceMaterial;

static SOURCE_MODIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"source_document_modified:\s*"?([^"\n]+)"?"#).unwrap());

/// Summarize what already exists so prompts can steer the model toward the
/// same product/client names and categories instead of inventing variants.
pub fn scan_existing_structure(base_dir: &Path) -> String {
    if !base_dir.exists() {
        return "EXISTING KNOWLEDGE BASE STRUCTURE: Empty (this is the first document)".to_string();
    }

    let mut lines = vec!["EXISTING KNOWLEDGE BASE STRUCTURE:".to_string()];

    let products_dir = base_dir.join("Products");
    if products_dir.exists() {
        lines.push("\nProducts:".to_string());
        for product_dir in sorted_dirs(&products_dir) {
            lines.push(format!("  - {}", dir_name(&product_dir)));
            let ref_dir = product_dir.join("Reference Materials");
            if ref_dir.exists() {
                for category_dir in sorted_dirs(&ref_dir) {
                    lines.push(format!(
                        "      Reference Materials/{}/",
                        dir_name(&category_dir)
                    ));
                }
            }
        }
    }

    let clients_dir = base_dir.join("Clients");
    if clients_dir.exists() {
        lines.push("\nClients:".to_string());
        for client_dir in sorted_dirs(&clients_dir) {
            lines.push(format!("  - {}", dir_name(&client_dir)));
            let files: Vec<String> = sorted_files(&client_dir)
                .iter()
                .map(|f| dir_name(f))
                .collect();
            if !files.is_empty() {
                lines.push(format!("      Files: {}", files.join(", ")));
            }
        }
    }

    lines.join("\n")
}

/// Write the product overview article and its reference materials. An
/// existing overview sourced from a newer or equal document revision is
/// left alone; reference materials are always (re)written.
pub fn save_product_knowledge(
    base_dir: &Path,
    product_name: &str,
    knowledge: &str,
    reference_materials: &[ReferenceMaterial],
    doc_type: &str,
    doc_category: &str,
    doc_metadata: &DocumentMetadata,
) -> Result<()> {
    let product_dir = base_dir.join("Products").join(product_name);
    std::fs::create_dir_all(&product_dir)?;

    let knowledge_file = product_dir.join("overview.md");
    if overview_is_up_to_date(&knowledge_file, doc_metadata) {
        info!(
            file = %knowledge_file.display(),
            "skipping overview, existing article is sourced from a newer document"
        );
    } else {
        let mut out = String::from("---\n");
        out.push_str(&format!("title: \"{product_name}\"\n"));
        out.push_str("type: \"Product Overview\"\n");
        out.push_str(&format!("product: \"{product_name}\"\n"));
        out.push_str(&format!("date_updated: \"{}\"\n", today()));
        push_source_fields(&mut out, doc_metadata, true);
        out.push_str("---\n\n");

        out.push_str(&format!("# {product_name}\n\n"));
        if let Some(modified) = &doc_metadata.modified {
            let date: String = modified.chars().take(10).collect();
            out.push_str(&format!("*Source document last modified: {date}*\n\n"));
        }
        out.push_str(knowledge);

        std::fs::write(&knowledge_file, out)?;
        info!(file = %knowledge_file.display(), "saved");
    }

    for material in reference_materials {
        let ref_type = material.kind.as_deref().unwrap_or("REFERENCE");
        let ref_title = material.title.as_deref().unwrap_or(doc_type);
        let ref_category = material.category.as_deref().unwrap_or(doc_category);
        let ref_content = material.content.as_deref().unwrap_or_default();

        let reference_dir = product_dir.join("Reference Materials").join(ref_category);
        std::fs::create_dir_all(&reference_dir)?;
        let reference_file = reference_dir.join(format!("{}.md", sanitize_filename(ref_title)));

        let mut out = String::from("---\n");
        out.push_str(&format!("title: \"{ref_title}\"\n"));
        out.push_str(&format!("type: \"{ref_type}\"\n"));
        out.push_str(&format!("category: \"{ref_category}\"\n"));
        out.push_str(&format!("product: \"{product_name}\"\n"));
        out.push_str(&format!("source_document: \"{doc_type}\"\n"));
        out.push_str(&format!("date_extracted: \"{}\"\n", today()));
        push_source_fields(&mut out, doc_metadata, false);
        if material.tags.is_empty() {
            out.push_str("tags: []\n");
        } else {
            out.push_str("tags:\n");
            for tag in &material.tags {
                out.push_str(&format!("  - {tag}\n"));
            }
        }
        out.push_str("---\n\n");
        out.push_str(ref_content);

        std::fs::write(&reference_file, out)?;
        info!(file = %reference_file.display(), "saved");
    }

    Ok(())
}

/// Write one markdown file per client category. Known categories keep a
/// stable order; whatever extra categories the model returned follow.
pub fn save_client_info(
    base_dir: &Path,
    client_name: &str,
    client_data: &serde_json::Map<String, Value>,
) -> Result<()> {
    const KNOWN_CATEGORIES: [&str; 5] =
        ["overview", "locations", "hardware", "configuration", "contacts"];

    let client_dir = base_dir.join("Clients").join(client_name);
    std::fs::create_dir_all(&client_dir)?;

    let mut ordered: Vec<(&String, &Value)> = Vec::new();
    for key in KNOWN_CATEGORIES {
        if let Some((k, v)) = client_data.get_key_value(key) {
            ordered.push((k, v));
        }
    }
    for (key, value) in client_data {
        if !KNOWN_CATEGORIES.contains(&key.as_str()) {
            ordered.push((key, value));
        }
    }

    for (key, value) in ordered {
        let empty = match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        };
        if empty {
            continue;
        }
        let display = title_case(key);

        let mut out = String::from("---\n");
        out.push_str(&format!("title: \"{client_name} - {display}\"\n"));
        out.push_str(&format!("type: \"Client {display}\"\n"));
        out.push_str(&format!("client: \"{client_name}\"\n"));
        out.push_str(&format!("date_updated: \"{}\"\n", today()));
        out.push_str("---\n\n");
        out.push_str(&format!("# {client_name} - {display}\n\n"));

        match value {
            Value::Array(items) => {
                for item in items {
                    out.push_str(&format!("- {}\n", render_scalar(item)));
                }
            }
            other => out.push_str(&render_scalar(other)),
        }

        let file = client_dir.join(format!("{key}.md"));
        std::fs::write(&file, out)?;
        info!(file = %file.display(), "saved");
    }

    Ok(())
}

/// All .docx files under a directory, skipping Word's `~$` lock files,
/// sorted by path.
pub fn find_docx_files(directory: &Path, recursive: bool) -> Vec<PathBuf> {
    if !directory.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = if recursive {
        WalkDir::new(directory)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_docx(p))
            .collect()
    } else {
        std::fs::read_dir(directory)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.path())
                    .filter(|p| p.is_file() && is_docx(p))
                    .collect()
            })
            .unwrap_or_default()
    };

    files.sort();
    files
}

fn is_docx(path: &Path) -> bool {
    let is_lock_file = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"));
    let has_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == "docx");
    has_ext && !is_lock_file
}

fn overview_is_up_to_date(knowledge_file: &Path, doc_metadata: &DocumentMetadata) -> bool {
    let Some(new_date) = &doc_metadata.modified else {
        return false;
    };
    let Ok(existing) = std::fs::read_to_string(knowledge_file) else {
        return false;
    };
    match SOURCE_MODIFIED
        .captures(&existing)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
    {
        Some(existing_date) => {
            debug!(%existing_date, %new_date, "comparing source document revisions");
            existing_date.as_str() >= new_date.as_str()
        }
        None => false,
    }
}

fn push_source_fields(out: &mut String, doc_metadata: &DocumentMetadata, include_title: bool) {
    if !doc_metadata.author.is_empty() {
        out.push_str(&format!(
            "source_document_author: \"{}\"\n",
            doc_metadata.author
        ));
    }
    if let Some(modified) = &doc_metadata.modified {
        out.push_str(&format!("source_document_modified: \"{modified}\"\n"));
    }
    if include_title && !doc_metadata.title.is_empty() {
        out.push_str(&format!(
            "source_document_title: \"{}\"\n",
            doc_metadata.title
        ));
    }
}

/// Titles become filenames by keeping alphanumerics, spaces, hyphens and
/// underscores, replacing everything else with `_`, then spaces with `_`.
pub fn sanitize_filename(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .replace(' ', "_")
}

fn title_case(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn sorted_dirs(parent: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(parent)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default();
    dirs.sort();
    dirs
}

fn sorted_files(parent: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(parent)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
