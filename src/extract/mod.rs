//! Format-specific text extraction.
//!
//! Each [`Extractor`] claims a set of lowercase file extensions and turns a
//! file on disk into an [`ExtractionResult`]. The [`ExtractorRegistry`]
//! dispatches by extension to the first registered extractor that claims
//! it, so registration order is the tie-break when sets overlap.
//!
//! | Name | Default extensions |
//! |------|--------------------|
//! | `pdf` | pdf |
//! | `docx` | docx, doc |
//! | `spreadsheet` | xlsx, xls, csv, ods |
//! | `text` | txt, md, json, xml |
//! | `audio` | mp3, wav, m4a, ogg |
//! | `video` | mp4, avi, mov, mkv |
//! | `image` | jpg, jpeg, png, gif, bmp |
//!
//! Extractors are synchronous; the pipeline runs them on the blocking pool.

pub mod docx;
pub mod image;
pub mod media;
pub mod pdf;
pub mod spreadsheet;
pub mod text;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::{Error, ExtractionFailure, Result};
use crate::models::{ExtractionResult, Metadata};

pub use self::docx::DocxExtractor;
pub use self::image::ImageExtractor;
pub use self::media::{AudioExtractor, VideoExtractor};
pub use self::pdf::PdfExtractor;
pub use self::spreadsheet::SpreadsheetExtractor;
pub use self::text::TextExtractor;

/// A file-format extractor.
pub trait Extractor: Send + Sync {
    /// Stable identifier used in logs, errors and `[extractors]` overrides.
    fn name(&self) -> &str;

    /// Lowercase extensions (no dot) this extractor claims.
    fn extensions(&self) -> &[String];

    fn supports(&self, extension: &str) -> bool {
        let ext = normalize_extension(extension);
        self.extensions().iter().any(|e| *e == ext)
    }

    /// Read `path` and return its text and metadata.
    fn extract(&self, path: &Path) -> std::result::Result<ExtractionResult, ExtractionFailure>;
}

/// Lowercase, trimmed, without a leading dot.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Lowercase extension of `path`, or `""` when it has none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

pub(crate) fn to_extensions(list: &[&str]) -> Vec<String> {
    list.iter().map(|e| normalize_extension(e)).collect()
}

/// `file_type` and `file_size` entries shared by most extractors.
pub(crate) fn file_metadata(
    extractor: &str,
    path: &Path,
) -> std::result::Result<Metadata, ExtractionFailure> {
    let size = std::fs::metadata(path)
        .map_err(|e| ExtractionFailure::new(extractor, format!("{}: {}", path.display(), e)))?
        .len();
    let mut meta = Metadata::new();
    meta.insert("file_type".to_string(), Value::from(extension_of(path)));
    meta.insert("file_size".to_string(), Value::from(size));
    Ok(meta)
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Ordered, thread-safe collection of extractors.
pub struct ExtractorRegistry {
    extractors: RwLock<Vec<Arc<dyn Extractor>>>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ExtractorRegistry {
    pub fn empty() -> Self {
        Self {
            extractors: RwLock::new(Vec::new()),
        }
    }

    /// The seven built-in extractors in their canonical order.
    pub fn with_defaults() -> Self {
        Self::from_overrides(&BTreeMap::new())
    }

    /// Built-ins with extension lists replaced per `[extractors]` config.
    pub fn from_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Self {
        let exts = |name: &str| {
            overrides
                .get(name)
                .map(|list| list.iter().map(|e| normalize_extension(e)).collect::<Vec<_>>())
        };

        let registry = Self::empty();
        registry.register(Arc::new(match exts("pdf") {
            Some(list) => PdfExtractor::with_extensions(list),
            None => PdfExtractor::default(),
        }));
        registry.register(Arc::new(match exts("docx") {
            Some(list) => DocxExtractor::with_extensions(list),
            None => DocxExtractor::default(),
        }));
        registry.register(Arc::new(match exts("spreadsheet") {
            Some(list) => SpreadsheetExtractor::with_extensions(list),
            None => SpreadsheetExtractor::default(),
        }));
        registry.register(Arc::new(match exts("text") {
            Some(list) => TextExtractor::with_extensions(list),
            None => TextExtractor::default(),
        }));
        registry.register(Arc::new(match exts("audio") {
            Some(list) => AudioExtractor::with_extensions(list),
            None => AudioExtractor::default(),
        }));
        registry.register(Arc::new(match exts("video") {
            Some(list) => VideoExtractor::with_extensions(list),
            None => VideoExtractor::default(),
        }));
        registry.register(Arc::new(match exts("image") {
            Some(list) => ImageExtractor::with_extensions(list),
            None => ImageExtractor::default(),
        }));
        registry
    }

    /// Append an extractor. It is consulted after all earlier ones.
    pub fn register(&self, extractor: Arc<dyn Extractor>) {
        tracing::debug!(extractor = extractor.name(), "registering extractor");
        match self.extractors.write() {
            Ok(mut guard) => guard.push(extractor),
            Err(poisoned) => poisoned.into_inner().push(extractor),
        }
    }

    /// First extractor claiming `extension`, in registration order.
    pub fn resolve(&self, extension: &str) -> Result<Arc<dyn Extractor>> {
        let ext = normalize_extension(extension);
        let guard = match self.extractors.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .iter()
            .find(|e| e.supports(&ext))
            .cloned()
            .ok_or(Error::UnsupportedFormat(ext))
    }

    /// Every claimed extension, deduplicated, in registration order.
    pub fn supported_extensions(&self) -> Vec<String> {
        let guard = match self.extractors.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut out: Vec<String> = Vec::new();
        for extractor in guard.iter() {
            for ext in extractor.extensions() {
                if !out.contains(ext) {
                    out.push(ext.clone());
                }
            }
        }
        out
    }

    pub fn names(&self) -> Vec<String> {
        let guard = match self.extractors.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.iter().map(|e| e.name().to_string()).collect()
    }

    /// `(name, extensions)` for each extractor, in resolution order.
    pub fn catalog(&self) -> Vec<(String, Vec<String>)> {
        let guard = match self.extractors.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .iter()
            .map(|e| (e.name().to_string(), e.extensions().to_vec()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shadow(Vec<String>);

    impl Extractor for Shadow {
        fn name(&self) -> &str {
            "shadow"
        }
        fn extensions(&self) -> &[String] {
            &self.0
        }
        fn extract(&self, _path: &Path) -> std::result::Result<ExtractionResult, ExtractionFailure> {
            Ok(ExtractionResult::new("shadow", Metadata::new()))
        }
    }

    #[test]
    fn resolves_defaults_case_insensitively() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.resolve("PDF").unwrap().name(), "pdf");
        assert_eq!(registry.resolve(".docx").unwrap().name(), "docx");
        assert_eq!(registry.resolve("csv").unwrap().name(), "spreadsheet");
        assert_eq!(registry.resolve("md").unwrap().name(), "text");
        assert_eq!(registry.resolve("ogg").unwrap().name(), "audio");
        assert_eq!(registry.resolve("mkv").unwrap().name(), "video");
        assert_eq!(registry.resolve("jpeg").unwrap().name(), "image");
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let registry = ExtractorRegistry::with_defaults();
        let err = registry.resolve("xyz").err().unwrap();
        assert!(matches!(err, Error::UnsupportedFormat(ref e) if e == "xyz"));
    }

    #[test]
    fn first_registered_wins_on_overlap() {
        let registry = ExtractorRegistry::with_defaults();
        registry.register(Arc::new(Shadow(vec!["txt".into(), "log".into()])));
        assert_eq!(registry.resolve("txt").unwrap().name(), "text");
        assert_eq!(registry.resolve("log").unwrap().name(), "shadow");
    }

    #[test]
    fn overrides_replace_extension_lists() {
        let mut overrides = BTreeMap::new();
        overrides.insert("text".to_string(), vec![".TXT".to_string(), "log".to_string()]);
        let registry = ExtractorRegistry::from_overrides(&overrides);
        assert_eq!(registry.resolve("log").unwrap().name(), "text");
        assert!(registry.resolve("md").is_err());
        assert_eq!(registry.names().len(), 7);
    }

    #[test]
    fn supported_extensions_are_unique() {
        let registry = ExtractorRegistry::with_defaults();
        let exts = registry.supported_extensions();
        assert_eq!(exts.first().map(String::as_str), Some("pdf"));
        let mut sorted = exts.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), exts.len());
    }
}
