use std::collections::BTreeMap;
use std::path::Path;

use crate::document::{Block, LoadedDocument};

/// Snapshot of the source document's embedded properties, with the same
/// fallbacks the knowledge files expect ("Unknown" authors, file-stem title).
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub author: String,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub last_modified_by: String,
    pub revision: Option<String>,
    pub title: String,
    pub subject: String,
    pub keywords: String,
}

#[derive(Debug, Clone)]
pub struct HeadingEntry {
    pub index: usize,
    pub heading: String,
    pub level: u8,
}

#[derive(Debug, Clone)]
struct Section {
    heading: String,
    content: String,
}

/// Read-only section index over one document. Built once per document and
/// handed to the retrieval toolbelt; dropped when that document's
/// extraction finishes.
#[derive(Debug)]
pub struct DocumentIndex {
    structure: Vec<HeadingEntry>,
    sections: BTreeMap<usize, Section>,
    full_content: String,
    metadata: DocumentMetadata,
}

/// Accumulates one section while the block scan is inside it.
struct OpenSection {
    index: usize,
    heading: String,
    paragraphs: Vec<String>,
    tables: Vec<String>,
}

impl OpenSection {
    fn close(self, sections: &mut BTreeMap<usize, Section>) {
        // A heading with no body paragraphs gets no section entry; lookups
        // must miss rather than hand the model an empty article.
        if self.paragraphs.is_empty() {
            return;
        }
        let mut content = self.paragraphs.join("\n");
        for table in &self.tables {
            content.push_str("\n\n");
            content.push_str(table);
        }
        sections.insert(
            self.index,
            Section {
                heading: self.heading,
                content,
            },
        );
    }
}

impl DocumentIndex {
    pub fn build(doc: &LoadedDocument, source_path: &Path) -> Self {
        let mut structure = Vec::new();
        let mut sections = BTreeMap::new();
        let mut paragraph_texts = Vec::new();

        // Body text before the first heading lands in an implicit preamble
        // section; it is addressable by index 0 but never listed as a heading.
        let mut current = OpenSection {
            index: 0,
            heading: "Introduction".to_string(),
            paragraphs: Vec::new(),
            tables: Vec::new(),
        };
        let mut section_index = 0usize;

        for block in &doc.blocks {
            match block {
                Block::Paragraph { style, text } => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    paragraph_texts.push(text.to_string());

                    if let Some(level) = heading_level(style) {
                        current.close(&mut sections);
                        section_index += 1;
                        current = OpenSection {
                            index: section_index,
                            heading: text.to_string(),
                            paragraphs: Vec::new(),
                            tables: Vec::new(),
                        };
                        structure.push(HeadingEntry {
                            index: section_index,
                            heading: text.to_string(),
                            level,
                        });
                    } else {
                        current.paragraphs.push(text.to_string());
                    }
                }
                Block::Table { rows } => {
                    current.tables.push(render_table(rows));
                }
            }
        }
        current.close(&mut sections);

        Self {
            structure,
            sections,
            full_content: paragraph_texts.join("\n\n"),
            metadata: snapshot_metadata(doc, source_path),
        }
    }

    pub fn structure(&self) -> &[HeadingEntry] {
        &self.structure
    }

    pub fn full_content(&self) -> &str {
        &self.full_content
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn section_count(&self) -> usize {
        self.structure.len()
    }

    /// Indented heading outline injected into extraction prompts so the
    /// model can decide which sections to retrieve.
    pub fn outline(&self) -> String {
        let mut summary = String::from("DOCUMENT STRUCTURE:\n");
        for entry in &self.structure {
            let indent = "  ".repeat(entry.level.saturating_sub(1) as usize);
            summary.push_str(&format!(
                "{indent}{}. {} (Level {})\n",
                entry.index, entry.heading, entry.level
            ));
        }
        summary
    }

    pub fn section_by_index(&self, index: i64) -> String {
        let found = usize::try_from(index)
            .ok()
            .and_then(|i| self.sections.get(&i));

        match found {
            Some(section) => format!("# {}\n\n{}", section.heading, section.content),
            None => {
                let available = self
                    .sections
                    .keys()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Error: Section {index} not found. Available sections: {available}")
            }
        }
    }

    pub fn section_by_heading(&self, keyword: &str) -> String {
        let needle = keyword.to_lowercase();
        let matches: Vec<&HeadingEntry> = self
            .structure
            .iter()
            .filter(|entry| entry.heading.to_lowercase().contains(&needle))
            .collect();

        match matches.as_slice() {
            [] => format!("Error: No sections found matching '{keyword}'"),
            [only] => self.section_by_index(only.index as i64),
            many => {
                let listing = many
                    .iter()
                    .map(|entry| format!("  {}. {}", entry.index, entry.heading))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "Multiple sections found matching '{keyword}':\n{listing}\n\n\
                     Use get_section_by_index() to retrieve a specific one."
                )
            }
        }
    }

    /// Best-effort batch fetch: absent indices are annotated inline instead
    /// of failing the whole request.
    pub fn multiple_sections(&self, indices: &[i64]) -> String {
        let mut parts = Vec::new();
        for &index in indices {
            let found = usize::try_from(index)
                .ok()
                .and_then(|i| self.sections.get(&i));
            match found {
                Some(section) => {
                    parts.push(format!("# {}\n\n{}\n", section.heading, section.content));
                }
                None => parts.push(format!("[Section {index} not found]\n")),
            }
        }
        parts.join("\n---\n\n")
    }
}

fn heading_level(style: &str) -> Option<u8> {
    let at = style.find("Heading")?;
    let digits: String = style[at + "Heading".len()..]
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    match digits.parse::<u8>() {
        Ok(level @ 1..=4) => Some(level),
        _ => Some(5),
    }
}

fn render_table(rows: &[Vec<String>]) -> String {
    let mut lines = vec!["[TABLE]".to_string()];
    for row in rows {
        lines.push(row.join(" | "));
    }
    lines.push("[/TABLE]".to_string());
    lines.join("\n")
}

fn snapshot_metadata(doc: &LoadedDocument, source_path: &Path) -> DocumentMetadata {
    let props = &doc.properties;
    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    DocumentMetadata {
        author: props.author.clone().unwrap_or_else(|| "Unknown".to_string()),
        created: props.created.clone(),
        modified: props.modified.clone(),
        last_modified_by: props
            .last_modified_by
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
        revision: props.revision.clone(),
        title: props.title.clone().filter(|t| !t.is_empty()).unwrap_or(stem),
        subject: props.subject.clone().unwrap_or_default(),
        keywords: props.keywords.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::CoreProperties;
    use std::path::PathBuf;

    fn heading(level: u8, text: &str) -> Block {
        Block::Paragraph {
            style: format!("Heading{level}"),
            text: text.to_string(),
        }
    }

    fn paragraph(text: &str) -> Block {
        Block::Paragraph {
            style: String::new(),
            text: text.to_string(),
        }
    }

    fn build(blocks: Vec<Block>) -> DocumentIndex {
        let doc = LoadedDocument {
            blocks,
            properties: CoreProperties::default(),
        };
        DocumentIndex::build(&doc, &PathBuf::from("manual.docx"))
    }

    #[test]
    fn headings_without_body_get_no_section() {
        let index = build(vec![
            heading(1, "First"),
            heading(2, "Second"),
            paragraph("Only this heading has content."),
            heading(2, "Third"),
        ]);

        assert_eq!(index.section_count(), 3);
        assert_eq!(
            index.section_by_index(1),
            "Error: Section 1 not found. Available sections: 2"
        );
        assert_eq!(
            index.section_by_index(2),
            "# Second\n\nOnly this heading has content."
        );
        assert_eq!(
            index.section_by_index(4),
            "Error: Section 4 not found. Available sections: 2"
        );
    }

    #[test]
    fn preamble_text_lands_in_section_zero() {
        let index = build(vec![
            paragraph("Text before any heading."),
            heading(1, "Overview"),
            paragraph("Overview body."),
        ]);

        assert_eq!(
            index.section_by_index(0),
            "# Introduction\n\nText before any heading."
        );
        // The preamble is addressable but never listed as a heading.
        assert_eq!(index.structure().len(), 1);
        assert_eq!(index.structure()[0].index, 1);
    }

    #[test]
    fn heading_search_is_case_insensitive_substring() {
        let index = build(vec![
            heading(1, "Configuration Guide"),
            paragraph("How to configure."),
            heading(1, "Overview"),
            paragraph("What it is."),
        ]);

        assert_eq!(
            index.section_by_heading("config"),
            "# Configuration Guide\n\nHow to configure."
        );
        assert_eq!(
            index.section_by_heading("nothing"),
            "Error: No sections found matching 'nothing'"
        );
    }

    #[test]
    fn ambiguous_heading_search_lists_matches_instead_of_guessing() {
        let index = build(vec![
            heading(1, "Configuration A"),
            paragraph("a"),
            heading(1, "Configuration B"),
            paragraph("b"),
        ]);

        let result = index.section_by_heading("configuration");
        assert!(result.starts_with("Multiple sections found matching 'configuration':"));
        assert!(result.contains("  1. Configuration A"));
        assert!(result.contains("  2. Configuration B"));
        assert!(result.contains("Use get_section_by_index()"));
        assert!(!result.contains("\na\n"));
    }

    #[test]
    fn batch_fetch_annotates_missing_indices_inline() {
        let index = build(vec![
            heading(1, "Alpha"),
            paragraph("alpha body"),
            heading(1, "Beta"),
            paragraph("beta body"),
        ]);

        let combined = index.multiple_sections(&[1, 9, 2]);
        assert!(combined.contains("# Alpha\n\nalpha body"));
        assert!(combined.contains("[Section 9 not found]"));
        assert!(combined.contains("# Beta\n\nbeta body"));

        let alpha = combined.find("# Alpha").unwrap();
        let missing = combined.find("[Section 9").unwrap();
        let beta = combined.find("# Beta").unwrap();
        assert!(alpha < missing && missing < beta);
    }

    #[test]
    fn tables_attach_to_the_open_section() {
        let index = build(vec![
            heading(1, "Hardware"),
            paragraph("Installed units:"),
            Block::Table {
                rows: vec![
                    vec!["Unit".to_string(), "Count".to_string()],
                    vec!["PLC".to_string(), "2".to_string()],
                ],
            },
            heading(1, "Next"),
            paragraph("next body"),
        ]);

        let section = index.section_by_index(1);
        assert!(section.contains("Installed units:"));
        assert!(section.contains("[TABLE]\nUnit | Count\nPLC | 2\n[/TABLE]"));
        assert!(!index.section_by_index(2).contains("[TABLE]"));
    }

    #[test]
    fn unnumbered_heading_styles_map_to_level_five() {
        let index = build(vec![
            Block::Paragraph {
                style: "HeadingCustom".to_string(),
                text: "Appendix".to_string(),
            },
            paragraph("appendix body"),
        ]);

        assert_eq!(index.structure()[0].level, 5);
    }

    #[test]
    fn spaced_heading_style_names_are_recognized() {
        let index = build(vec![
            Block::Paragraph {
                style: "Heading 3".to_string(),
                text: "Deep".to_string(),
            },
            paragraph("deep body"),
        ]);

        assert_eq!(index.structure()[0].level, 3);
    }

    #[test]
    fn outline_indents_by_level() {
        let index = build(vec![
            heading(1, "Top"),
            paragraph("t"),
            heading(2, "Inner"),
            paragraph("i"),
        ]);

        assert_eq!(
            index.outline(),
            "DOCUMENT STRUCTURE:\n1. Top (Level 1)\n  2. Inner (Level 2)\n"
        );
    }

    #[test]
    fn full_content_includes_headings_and_skips_blanks() {
        let index = build(vec![
            heading(1, "Title"),
            Block::Paragraph {
                style: String::new(),
                text: "   ".to_string(),
            },
            paragraph("Body."),
        ]);

        assert_eq!(index.full_content(), "Title\n\nBody.");
    }

    #[test]
    fn metadata_applies_fallbacks() {
        let doc = LoadedDocument {
            blocks: vec![],
            properties: CoreProperties {
                modified: Some("2024-06-07T08:09:10Z".to_string()),
                ..CoreProperties::default()
            },
        };
        let index = DocumentIndex::build(&doc, &PathBuf::from("dir/Pump Manual.docx"));

        let metadata = index.metadata();
        assert_eq!(metadata.author, "Unknown");
        assert_eq!(metadata.last_modified_by, "Unknown");
        assert_eq!(metadata.title, "Pump Manual");
        assert_eq!(metadata.modified.as_deref(), Some("2024-06-07T08:09:10Z"));
        assert_eq!(metadata.subject, "");
    }
}
