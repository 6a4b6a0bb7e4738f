// crates/engine/src/document
//! Reading .docx sources: paragraphs with their style names, tables, and the
//! embedded core properties. Everything downstream works on the
//! [`LoadedDocument`] shape, never on the archive itself.
pub mod index;
pub mod retriever;

use std::io::Read;
use std::path::Path;

use anyhow::Result;
use quick_xml::Reader;
use quick_xml::events::Event;
use zip::ZipArchive;

/// Body content in document order. Tables interleave with paragraphs exactly
/// where they appear, which is what lets the index attach a table to the
/// section that was open when it showed up.
#[derive(Debug, Clone)]
pub enum Block {
    Paragraph { style: String, text: String },
    Table { rows: Vec<Vec<String>> },
}

/// Raw values from docProps/core.xml. Fallbacks are applied when the index
/// snapshots these, not here.
#[derive(Debug, Clone, Default)]
pub struct CoreProperties {
    pub author: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub last_modified_by: Option<String>,
    pub revision: Option<String>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub blocks: Vec<Block>,
    pub properties: CoreProperties,
}

/// Open a .docx file and extract its body and core properties.
pub fn load(path: &Path) -> Result<LoadedDocument> {
    let file = std::fs::File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let blocks = {
        let mut doc_file = archive
            .by_name("word/document.xml")
            .map_err(|_| anyhow::anyhow!("Could not find document.xml in DOCX file"))?;
        let mut xml_content = String::new();
        doc_file.read_to_string(&mut xml_content)?;
        parse_body(&xml_content)?
    };

    let properties = match archive.by_name("docProps/core.xml") {
        Ok(mut props_file) => {
            let mut xml_content = String::new();
            props_file.read_to_string(&mut xml_content)?;
            parse_core_properties(&xml_content).unwrap_or_default()
        }
        Err(_) => CoreProperties::default(),
    };

    Ok(LoadedDocument { blocks, properties })
}

fn parse_body(xml: &str) -> Result<Vec<Block>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut blocks = Vec::new();
    let mut buf = Vec::new();

    let mut in_text = false;
    let mut para_style = String::new();
    let mut para_text = String::new();

    let mut table_depth = 0usize;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                // <w:pStyle w:val="Heading1"/> names the paragraph style
                if e.name().as_ref() == b"w:pStyle" && table_depth == 0 {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"w:val" {
                            let value = attr
                                .unescape_value()
                                .map_err(|err| anyhow::anyhow!("XML decode error: {}", err))?;
                            para_style = value.to_string();
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    let decoded = e
                        .decode()
                        .map_err(|err| anyhow::anyhow!("XML decode error: {}", err))?;
                    let text = quick_xml::escape::unescape(&decoded)
                        .map_err(|err| anyhow::anyhow!("XML decode error: {}", err))?;
                    if table_depth > 0 {
                        cell.push_str(&text);
                    } else {
                        para_text.push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    if table_depth == 0 {
                        blocks.push(Block::Paragraph {
                            style: std::mem::take(&mut para_style),
                            text: std::mem::take(&mut para_text),
                        });
                    } else {
                        cell.push('\n');
                    }
                }
                b"w:tc" => {
                    row.push(cell.trim().to_string());
                    cell.clear();
                }
                b"w:tr" => rows.push(std::mem::take(&mut row)),
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        blocks.push(Block::Table {
                            rows: std::mem::take(&mut rows),
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(blocks)
}

fn parse_core_properties(xml: &str) -> Result<CoreProperties> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut properties = CoreProperties::default();
    let mut buf = Vec::new();
    let mut current_element = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                current_element = String::from_utf8_lossy(e.name().as_ref()).to_string();
            }
            Ok(Event::Text(e)) => {
                let decoded = e
                    .decode()
                    .map_err(|err| anyhow::anyhow!("XML decode error: {}", err))?;
                let text = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| anyhow::anyhow!("XML decode error: {}", err))?
                    .to_string();

                match current_element.as_str() {
                    "dc:title" => properties.title = Some(text),
                    "dc:subject" => properties.subject = Some(text),
                    "dc:creator" => properties.author = Some(text),
                    "cp:keywords" => properties.keywords = Some(text),
                    "cp:lastModifiedBy" => properties.last_modified_by = Some(text),
                    "cp:revision" => properties.revision = Some(text),
                    "dcterms:created" => properties.created = Some(text),
                    "dcterms:modified" => properties.modified = Some(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(style: Option<&str>, runs: &[&str]) -> String {
        let style_tag = style
            .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{s}"/></w:pPr>"#))
            .unwrap_or_default();
        let runs: String = runs
            .iter()
            .map(|r| format!("<w:r><w:t>{r}</w:t></w:r>"))
            .collect();
        format!("<w:p>{style_tag}{runs}</w:p>")
    }

    fn body(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0"?><w:document xmlns:w="ns"><w:body>{inner}</w:body></w:document>"#
        )
    }

    #[test]
    fn paragraphs_keep_style_and_concatenate_runs() {
        let xml = body(&format!(
            "{}{}",
            para(Some("Heading1"), &["Over", "view"]),
            para(None, &["Body text."])
        ));
        let blocks = parse_body(&xml).unwrap();
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            Block::Paragraph { style, text } => {
                assert_eq!(style, "Heading1");
                assert_eq!(text, "Overview");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
        match &blocks[1] {
            Block::Paragraph { style, text } => {
                assert_eq!(style, "");
                assert_eq!(text, "Body text.");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn tables_interleave_with_paragraphs() {
        let table = "<w:tbl><w:tr>\
            <w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc>\
            <w:tc><w:p><w:r><w:t>Value</w:t></w:r></w:p></w:tc>\
            </w:tr></w:tbl>";
        let xml = body(&format!(
            "{}{}{}",
            para(None, &["before"]),
            table,
            para(None, &["after"])
        ));

        let blocks = parse_body(&xml).unwrap();
        assert_eq!(blocks.len(), 3);
        match &blocks[1] {
            Block::Table { rows } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0], vec!["Name".to_string(), "Value".to_string()]);
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn table_cell_text_does_not_leak_into_paragraphs() {
        let table = "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell only</w:t></w:r></w:p></w:tc></w:tr></w:tbl>";
        let xml = body(&format!("{}{}", table, para(None, &["real paragraph"])));

        let blocks = parse_body(&xml).unwrap();
        let paragraphs: Vec<_> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Paragraph { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(paragraphs, vec!["real paragraph"]);
    }

    #[test]
    fn core_properties_map_known_elements() {
        let xml = r#"<?xml version="1.0"?>
            <cp:coreProperties xmlns:cp="c" xmlns:dc="d" xmlns:dcterms="t">
                <dc:title>Install Guide</dc:title>
                <dc:creator>R. Daneel</dc:creator>
                <cp:lastModifiedBy>E. Bailey</cp:lastModifiedBy>
                <cp:revision>7</cp:revision>
                <dcterms:created>2024-01-02T03:04:05Z</dcterms:created>
                <dcterms:modified>2024-06-07T08:09:10Z</dcterms:modified>
            </cp:coreProperties>"#;

        let properties = parse_core_properties(xml).unwrap();
        assert_eq!(properties.title.as_deref(), Some("Install Guide"));
        assert_eq!(properties.author.as_deref(), Some("R. Daneel"));
        assert_eq!(properties.last_modified_by.as_deref(), Some("E. Bailey"));
        assert_eq!(properties.revision.as_deref(), Some("7"));
        assert_eq!(properties.created.as_deref(), Some("2024-01-02T03:04:05Z"));
        assert_eq!(properties.modified.as_deref(), Some("2024-06-07T08:09:10Z"));
        assert!(properties.subject.is_none());
    }
}
