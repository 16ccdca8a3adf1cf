//! PDF extractor.
//!
//! Page text comes from `pdf-extract`; the page count and the `/Info`
//! dictionary are read with `lopdf`. The text engine can panic on
//! malformed font programs, so it runs under `catch_unwind` and a panic
//! is reported like any other extraction failure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use lopdf::{Dictionary, Object};
use serde_json::Value;

use super::{file_metadata, to_extensions, Extractor};
use crate::error::ExtractionFailure;
use crate::models::{ExtractionResult, Metadata};

const NAME: &str = "pdf";

pub struct PdfExtractor {
    extensions: Vec<String>,
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self {
            extensions: to_extensions(&["pdf"]),
        }
    }
}

impl PdfExtractor {
    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

impl Extractor for PdfExtractor {
    fn name(&self) -> &str {
        NAME
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionFailure> {
        let bytes = std::fs::read(path)
            .map_err(|e| ExtractionFailure::new(NAME, format!("{}: {}", path.display(), e)))?;

        let document = lopdf::Document::load_mem(&bytes)
            .map_err(|e| ExtractionFailure::new(NAME, format!("failed to load PDF: {}", e)))?;

        let pages = extract_pages(&bytes)?;
        let text = pages.join("\n\n");

        let mut metadata = file_metadata(NAME, path)?;
        metadata.remove("file_type");
        metadata.insert(
            "pages".to_string(),
            Value::from(document.get_pages().len()),
        );
        if let Some(info) = info_dictionary(&document) {
            insert_info(&mut metadata, info);
        }

        Ok(ExtractionResult::new(text.trim(), metadata))
    }
}

fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractionFailure> {
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractionFailure::new(NAME, e.to_string())),
        Err(panic) => {
            let detail = panic
                .downcast_ref::<String>()
                .map(String::as_str)
                .or_else(|| panic.downcast_ref::<&str>().copied())
                .unwrap_or("unknown panic");
            tracing::warn!(detail, "pdf text engine panicked");
            Err(ExtractionFailure::new(
                NAME,
                format!("PDF text engine panicked: {}", detail),
            ))
        }
    }
}

fn info_dictionary(document: &lopdf::Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn insert_info(metadata: &mut Metadata, info: &Dictionary) {
    for (key, field) in [
        ("title", b"Title".as_slice()),
        ("author", b"Author".as_slice()),
        ("subject", b"Subject".as_slice()),
        ("creator", b"Creator".as_slice()),
    ] {
        let value = match info.get(field) {
            Ok(Object::String(raw, _)) => decode_text_string(raw),
            _ => String::new(),
        };
        metadata.insert(key.to_string(), Value::from(value));
    }
}

/// PDF text strings are UTF-16BE with a BOM, or PDFDocEncoding otherwise.
/// PDFDocEncoding is treated as Latin-1, which matches it for printable text.
fn decode_text_string(raw: &[u8]) -> String {
    if let Some(utf16) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    raw.iter().map(|&b| char::from(b)).collect()
}
