//! Audio and video placeholders.
//!
//! Neither transcription nor frame analysis is performed. Both extractors
//! succeed with file metadata and a descriptive stub, so these uploads
//! still complete and remain searchable by name.

use std::path::Path;

use serde_json::Value;

use super::{display_name, file_metadata, to_extensions, Extractor};
use crate::error::ExtractionFailure;
use crate::models::ExtractionResult;

pub struct AudioExtractor {
    extensions: Vec<String>,
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self {
            extensions: to_extensions(&["mp3", "wav", "m4a", "ogg"]),
        }
    }
}

impl AudioExtractor {
    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

impl Extractor for AudioExtractor {
    fn name(&self) -> &str {
        "audio"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionFailure> {
        placeholder(
            self.name(),
            path,
            "Audio transcription not yet implemented",
            format!(
                "[Audio file: {}]\nNote: Audio transcription requires additional setup (Whisper model)",
                display_name(path)
            ),
        )
    }
}

pub struct VideoExtractor {
    extensions: Vec<String>,
}

impl Default for VideoExtractor {
    fn default() -> Self {
        Self {
            extensions: to_extensions(&["mp4", "avi", "mov", "mkv"]),
        }
    }
}

impl VideoExtractor {
    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

impl Extractor for VideoExtractor {
    fn name(&self) -> &str {
        "video"
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionFailure> {
        placeholder(
            self.name(),
            path,
            "Video processing not yet implemented",
            format!(
                "[Video file: {}]\nNote: Video processing requires additional setup (OpenCV, FFmpeg)",
                display_name(path)
            ),
        )
    }
}

fn placeholder(
    extractor: &str,
    path: &Path,
    status: &str,
    text: String,
) -> Result<ExtractionResult, ExtractionFailure> {
    let mut metadata = file_metadata(extractor, path)?;
    metadata.insert("status".to_string(), Value::from(status));
    Ok(ExtractionResult::new(text, metadata))
}
