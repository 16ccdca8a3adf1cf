//! Image extractor.
//!
//! Reads only the image header: dimensions, container format and pixel
//! layout. No OCR is performed; the text is a short descriptive stub.

use std::path::Path;

use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use serde_json::Value;

use super::{display_name, file_metadata, to_extensions, Extractor};
use crate::error::ExtractionFailure;
use crate::models::ExtractionResult;

const NAME: &str = "image";

pub struct ImageExtractor {
    extensions: Vec<String>,
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self {
            extensions: to_extensions(&["jpg", "jpeg", "png", "gif", "bmp"]),
        }
    }
}

impl ImageExtractor {
    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

fn failure(e: impl std::fmt::Display) -> ExtractionFailure {
    ExtractionFailure::new(NAME, e.to_string())
}

impl Extractor for ImageExtractor {
    fn name(&self) -> &str {
        NAME
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionFailure> {
        let reader = ImageReader::open(path)
            .map_err(failure)?
            .with_guessed_format()
            .map_err(failure)?;
        let format = reader
            .format()
            .ok_or_else(|| failure("unrecognized image format"))?;
        let decoder = reader.into_decoder().map_err(failure)?;
        let (width, height) = decoder.dimensions();
        let format_name = format_name(format);

        let mut metadata = file_metadata(NAME, path)?;
        metadata.insert("width".to_string(), Value::from(width));
        metadata.insert("height".to_string(), Value::from(height));
        metadata.insert("format".to_string(), Value::from(format_name.clone()));
        metadata.insert(
            "mode".to_string(),
            Value::from(color_mode(decoder.color_type())),
        );
        metadata.insert(
            "status".to_string(),
            Value::from("Image OCR not yet implemented"),
        );

        let text = format!(
            "[Image file: {}]\nDimensions: {}x{}\nFormat: {}\nNote: OCR requires additional setup (Tesseract)",
            display_name(path),
            width,
            height,
            format_name
        );
        Ok(ExtractionResult::new(text, metadata))
    }
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}

/// Pixel layout named the way imaging tools conventionally report it.
fn color_mode(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;F",
        ColorType::Rgba32F => "RGBA;F",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_png_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        image::RgbImage::new(3, 2).save(&path).unwrap();

        let result = ImageExtractor::default().extract(&path).unwrap();
        assert_eq!(result.metadata["width"], 3);
        assert_eq!(result.metadata["height"], 2);
        assert_eq!(result.metadata["format"], "PNG");
        assert_eq!(result.metadata["mode"], "RGB");
        assert_eq!(result.metadata["status"], "Image OCR not yet implemented");
        assert!(result.text.starts_with("[Image file: pixel.png]\nDimensions: 3x2\nFormat: PNG\n"));
    }

    #[test]
    fn truncated_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n").unwrap();
        assert!(ImageExtractor::default().extract(&path).is_err());
    }
}
