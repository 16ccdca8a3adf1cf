//! Spreadsheet extractor for Excel, OpenDocument and CSV files.
//!
//! Every sheet is rendered as a right-aligned text table whose first row
//! is the header, followed by a row/column summary.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::Value;

use super::{extension_of, file_metadata, to_extensions, Extractor};
use crate::error::ExtractionFailure;
use crate::models::ExtractionResult;

const NAME: &str = "spreadsheet";

pub struct SpreadsheetExtractor {
    extensions: Vec<String>,
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self {
            extensions: to_extensions(&["xlsx", "xls", "csv", "ods"]),
        }
    }
}

impl SpreadsheetExtractor {
    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self { extensions }
    }
}

/// One sheet: a header row plus data rows, all as display strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Extractor for SpreadsheetExtractor {
    fn name(&self) -> &str {
        NAME
    }

    fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn extract(&self, path: &Path) -> Result<ExtractionResult, ExtractionFailure> {
        let sheets = if extension_of(path) == "csv" {
            vec![read_csv(path)?]
        } else {
            read_workbook(path)?
        };

        let mut text = String::new();
        for sheet in &sheets {
            text.push_str(&render_sheet(sheet));
        }

        let mut metadata = file_metadata(NAME, path)?;
        let total_rows: usize = sheets.iter().map(|s| s.rows.len()).sum();
        let total_columns: usize = sheets.iter().map(|s| s.header.len()).sum();
        metadata.insert("sheets".to_string(), Value::from(sheets.len()));
        metadata.insert("total_rows".to_string(), Value::from(total_rows));
        metadata.insert("total_columns".to_string(), Value::from(total_columns));

        Ok(ExtractionResult::new(text.trim(), metadata))
    }
}

fn read_csv(path: &Path) -> Result<Sheet, ExtractionFailure> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| ExtractionFailure::new(NAME, e.to_string()))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| ExtractionFailure::new(NAME, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractionFailure::new(NAME, e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Sheet {
        name: "Sheet1".to_string(),
        header,
        rows,
    })
}

fn read_workbook(path: &Path) -> Result<Vec<Sheet>, ExtractionFailure> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| ExtractionFailure::new(NAME, e.to_string()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractionFailure::new(NAME, format!("sheet '{}': {}", name, e)))?;

        let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
        let header = rows.next().unwrap_or_default();
        sheets.push(Sheet {
            name,
            header,
            rows: rows.collect(),
        });
    }
    Ok(sheets)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{:?}", e),
    }
}

/// `=== name ===` block with the table and its summary lines.
pub fn render_sheet(sheet: &Sheet) -> String {
    let mut out = format!("\n\n=== {} ===\n\n", sheet.name);
    out.push_str(&render_table(&sheet.header, &sheet.rows));
    out.push_str(&format!(
        "\n\nSummary: {} rows, {} columns\n",
        sheet.rows.len(),
        sheet.header.len()
    ));
    out.push_str(&format!("Columns: {}\n", sheet.header.join(", ")));
    out
}

fn render_table(header: &[String], rows: &[Vec<String>]) -> String {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let mut widths = vec![0usize; columns];
    for line in std::iter::once(header).chain(rows.iter().map(Vec::as_slice)) {
        for (i, cell) in line.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_line = |line: &[String]| -> String {
        (0..columns)
            .map(|i| {
                let cell = line.get(i).map(String::as_str).unwrap_or("");
                format!("{:>w$}", cell, w = widths[i])
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut lines = vec![format_line(header)];
    lines.extend(rows.iter().map(|r| format_line(r)));
    lines.join("\n")
}
