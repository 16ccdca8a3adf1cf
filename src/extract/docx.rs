//! Word (OOXML) extractor.
//!
//! Reads `word/document.xml` straight out of the zip container. Body-level
//! paragraphs come first, one per line, followed by every table row with
//! each cell's text terminated by a space. Core properties are taken from
//! `docProps/core.xml` when present.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

use super::{file_metadata, to_extensions, Extractor};
use crate::error::ExtractionFailure;
use crate::models::ExtractionResult;

const NAME: &str = "docx";

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub struct DocxExtractor {
    extensions: Vec<String>,
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self {
            extensions: to_extensions(&["docx", "doc"]),
        }
    }
}

impl DocxExtractor {
    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

fn failure(e: impl std::fmt::Display) -> ExtractionFailure {
    ExtractionFailure::new(NAME, e.to_string())
}

impl Extractor for DocxExtractor {
    fn name(&self) -> &str {
        NAME
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionFailure> {
        let bytes = std::fs::read(path).map_err(failure)?;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).map_err(failure)?;

        let document_xml = read_zip_entry_bounded(&mut archive, "word/document.xml")?
            .ok_or_else(|| failure("word/document.xml not found"))?;
        let body = parse_body(&document_xml)?;

        let mut text = String::new();
        for paragraph in &body.paragraphs {
            text.push_str(paragraph);
            text.push('\n');
        }
        for table in &body.tables {
            for row in table {
                for cell in row {
                    text.push_str(cell);
                    text.push(' ');
                }
                text.push('\n');
            }
        }

        let mut metadata = file_metadata(NAME, path)?;
        metadata.remove("file_type");
        metadata.insert("paragraphs".to_string(), Value::from(body.paragraphs.len()));
        metadata.insert("tables".to_string(), Value::from(body.tables.len()));

        let core = match read_zip_entry_bounded(&mut archive, "docProps/core.xml")? {
            Some(xml) => parse_core_properties(&xml)?,
            None => CoreProperties::default(),
        };
        metadata.insert("title".to_string(), Value::from(core.title));
        metadata.insert("author".to_string(), Value::from(core.creator));
        metadata.insert("subject".to_string(), Value::from(core.subject));
        metadata.insert("created".to_string(), Value::from(core.created));

        Ok(ExtractionResult::new(text.trim(), metadata))
    }
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<Vec<u8>>, ExtractionFailure> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(failure(e)),
    };
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(failure)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(failure(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(Some(out))
}

/// Body paragraphs and tables (rows of cells) in document order.
#[derive(Debug, Default)]
struct Body {
    paragraphs: Vec<String>,
    tables: Vec<Vec<Vec<String>>>,
}

fn parse_body(xml: &[u8]) -> Result<Body, ExtractionFailure> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut body = Body::default();
    // Nesting depth of w:tbl; only the outermost table produces rows.
    let mut table_depth = 0usize;
    let mut paragraph: Option<String> = None;
    let mut cell_paragraphs: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        body.tables.push(Vec::new());
                    }
                }
                b"tr" if table_depth == 1 => row.clear(),
                b"tc" if table_depth == 1 => cell_paragraphs.clear(),
                b"p" => paragraph = Some(paragraph.take().unwrap_or_default()),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if let Some(p) = paragraph.as_mut() {
                    match e.local_name().as_ref() {
                        b"tab" => p.push('\t'),
                        b"br" | b"cr" => p.push('\n'),
                        _ => {}
                    }
                } else if e.local_name().as_ref() == b"p" {
                    if table_depth == 0 {
                        body.paragraphs.push(String::new());
                    } else {
                        cell_paragraphs.push(String::new());
                    }
                }
            }
            Ok(Event::Text(t)) if in_text => {
                if let Some(p) = paragraph.as_mut() {
                    p.push_str(&t.unescape().map_err(failure)?);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = paragraph.take().unwrap_or_default();
                    if table_depth == 0 {
                        body.paragraphs.push(text);
                    } else {
                        cell_paragraphs.push(text);
                    }
                }
                b"tc" if table_depth == 1 => row.push(cell_paragraphs.join("\n")),
                b"tr" if table_depth == 1 => {
                    if let Some(table) = body.tables.last_mut() {
                        table.push(std::mem::take(&mut row));
                    }
                }
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(failure(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(body)
}

#[derive(Debug, Default)]
struct CoreProperties {
    title: String,
    creator: String,
    subject: String,
    created: String,
}

fn parse_core_properties(xml: &[u8]) -> Result<CoreProperties, ExtractionFailure> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut props = CoreProperties::default();
    let mut current: Option<Vec<u8>> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => current = Some(e.local_name().as_ref().to_vec()),
            Ok(Event::Text(t)) => {
                let value = t.unescape().map_err(failure)?.into_owned();
                match current.as_deref() {
                    Some(b"title") => props.title = value,
                    Some(b"creator") => props.creator = value,
                    Some(b"subject") => props.subject = value,
                    Some(b"created") => props.created = value,
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(failure(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(props)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>
    <w:p/>
    <w:tbl>
      <w:tr>
        <w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc>
        <w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc>
      </w:tr>
    </w:tbl>
    <w:p><w:r><w:t>Tom</w:t><w:tab/><w:t>&amp; Jerry</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn paragraphs_and_tables_are_separated() {
        let body = parse_body(DOC.as_bytes()).unwrap();
        assert_eq!(body.paragraphs, vec!["Quarterly report", "", "Tom\t& Jerry"]);
        assert_eq!(body.tables, vec![vec![vec!["a".to_string(), "b".to_string()]]]);
    }

    #[test]
    fn core_properties_default_to_empty() {
        let xml = br#"<cp:coreProperties xmlns:cp="cp" xmlns:dc="dc" xmlns:dcterms="dcterms">
            <dc:title>Plan</dc:title><dc:creator>Ada</dc:creator>
            <dcterms:created>2024-01-02T03:04:05Z</dcterms:created>
        </cp:coreProperties>"#;
        let props = parse_core_properties(xml).unwrap();
        assert_eq!(props.title, "Plan");
        assert_eq!(props.creator, "Ada");
        assert_eq!(props.subject, "");
        assert_eq!(props.created, "2024-01-02T03:04:05Z");
    }

    #[test]
    fn non_zip_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.doc");
        std::fs::write(&path, b"\xD0\xCF\x11\xE0 binary word").unwrap();
        let err = DocxExtractor::default().extract(&path).unwrap_err();
        assert_eq!(err.extractor, "docx");
    }
}
