//! Plain-text extractor with an encoding fallback ladder.

use std::path::Path;

use encoding_rs::WINDOWS_1252;
use serde_json::Value;

use super::{file_metadata, to_extensions, Extractor};
use crate::error::ExtractionFailure;
use crate::models::ExtractionResult;

const NAME: &str = "text";

pub struct TextExtractor {
    extensions: Vec<String>,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            extensions: to_extensions(&["txt", "md", "json", "xml"]),
        }
    }
}

impl TextExtractor {
    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

impl Extractor for TextExtractor {
    fn name(&self) -> &str {
        NAME
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionFailure> {
        let bytes = std::fs::read(path)
            .map_err(|e| ExtractionFailure::new(NAME, format!("{}: {}", path.display(), e)))?;
        let (text, encoding) = decode(&bytes).ok_or_else(|| {
            ExtractionFailure::new(NAME, "could not decode file with any supported encoding")
        })?;
        tracing::debug!(path = %path.display(), encoding, "decoded text file");

        let mut metadata = file_metadata(NAME, path)?;
        metadata.insert("lines".to_string(), Value::from(text.split('\n').count()));
        metadata.insert("characters".to_string(), Value::from(text.chars().count()));
        Ok(ExtractionResult::new(text, metadata))
    }
}

/// Try UTF-8, then ISO-8859-1, then Windows-1252.
///
/// ISO-8859-1 refuses the C1 control range 0x80..=0x9F so that
/// Windows-1252 punctuation in that range reaches the next rung.
pub fn decode(bytes: &[u8]) -> Option<(String, &'static str)> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some((s.to_string(), "utf-8"));
    }
    if !bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
        return Some((bytes.iter().map(|&b| char::from(b)).collect(), "iso-8859-1"));
    }
    let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    if had_errors || is_cp1252_undefined(bytes) {
        return None;
    }
    Some((text.into_owned(), "windows-1252"))
}

// encoding_rs maps these to C1 controls rather than reporting an error.
fn is_cp1252_undefined(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .any(|b| matches!(b, 0x81 | 0x8D | 0x8F | 0x90 | 0x9D))
}
