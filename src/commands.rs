//! CLI command implementations.
//!
//! Each `run_*` function opens the configured database, performs one
//! pipeline operation and prints a human-readable result to stdout.
//! Errors propagate to `main`, which exits non-zero.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::extract::ExtractorRegistry;
use crate::migrate;
use crate::models::{Document, DocumentStatus};
use crate::pipeline::DocumentPipeline;
use crate::store::SqliteStore;

/// Connect, migrate and wire a pipeline against the configured database.
pub async fn open_pipeline(config: &Config) -> Result<DocumentPipeline> {
    let pool = db::connect(&config.db.path)
        .await
        .with_context(|| format!("Failed to open database: {}", config.db.path.display()))?;
    migrate::run_migrations(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    Ok(DocumentPipeline::from_config(config, store)?)
}

pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    std::fs::create_dir_all(&config.storage.upload_dir).with_context(|| {
        format!(
            "Failed to create upload directory: {}",
            config.storage.upload_dir.display()
        )
    })?;
    println!("Database initialized successfully.");
    Ok(())
}

pub async fn run_upload(
    config: &Config,
    file: &Path,
    name: Option<&str>,
    mime_type: Option<String>,
    process: bool,
) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let doc = pipeline.upload(file, name, mime_type).await?;
    println!("uploaded {} ({}, {} bytes)", doc.id, doc.file_type, doc.file_size);

    if process {
        let doc = pipeline.process(&doc.id).await?;
        print_processed(&doc);
    }
    println!("ok");
    Ok(())
}

pub async fn run_process(config: &Config, id: &str) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let doc = pipeline.process(id).await?;
    print_processed(&doc);
    println!("ok");
    Ok(())
}

fn print_processed(doc: &Document) {
    let chars = doc
        .extracted_text
        .as_deref()
        .map(|t| t.chars().count())
        .unwrap_or(0);
    println!("{} {} ({} chars)", doc.id, doc.status, chars);
}

pub async fn run_list(config: &Config, skip: usize, limit: usize) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let docs = pipeline.list(skip, limit).await?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in &docs {
        println!(
            "{}  {:<10}  {:<5}  {:>10}  {}",
            doc.id,
            doc.status,
            doc.file_type,
            doc.file_size,
            doc.original_filename
        );
    }
    Ok(())
}

pub async fn run_get(config: &Config, id: &str, show_chunks: bool) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let doc = pipeline.get(id).await?;

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("filename:     {}", doc.original_filename);
    println!("stored_as:    {}", doc.file_path.display());
    println!("file_type:    {}", doc.file_type);
    println!("file_size:    {}", doc.file_size);
    if let Some(ref mime) = doc.mime_type {
        println!("mime_type:    {}", mime);
    }
    if let Some(ref hash) = doc.content_hash {
        println!("sha256:       {}", hash);
    }
    println!("status:       {}", doc.status);
    if let Some(ref err) = doc.error_message {
        println!("error:        {}", err);
    }
    println!("created_at:   {}", format_ts_iso(doc.created_at));
    println!("updated_at:   {}", format_ts_iso(doc.updated_at));
    println!(
        "metadata:     {}",
        serde_json::Value::Object(doc.metadata.clone())
    );
    println!();

    if doc.status == DocumentStatus::Completed {
        println!("--- Text ---");
        println!("{}", doc.extracted_text.as_deref().unwrap_or(""));
        println!();
    }

    if show_chunks {
        let chunks = pipeline.chunks(&doc.id).await?;
        println!("--- Chunks ({}) ---", chunks.len());
        for chunk in &chunks {
            println!("[chunk {}]", chunk.chunk_index);
            println!("{}", chunk.content);
            println!();
        }
    }
    Ok(())
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    pipeline.delete(id).await?;
    println!("deleted {}", id);
    println!("ok");
    Ok(())
}

pub async fn run_similar(config: &Config, query: &str, limit: usize) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let hits = pipeline.similar(query, limit).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, (doc, score)) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {}  {}",
            i + 1,
            score,
            doc.original_filename,
            doc.id
        );
    }
    Ok(())
}

pub async fn run_context(config: &Config, ids: &[String], max_chars: usize) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let context = pipeline.context(ids, max_chars).await?;
    println!("{}", context);
    Ok(())
}

/// Print every extractor and the extensions it claims, in resolution order.
pub fn run_formats(config: &Config) -> Result<()> {
    let registry = ExtractorRegistry::from_overrides(&config.extractors);
    for (name, extensions) in registry.catalog() {
        println!("{:<12} {}", name, extensions.join(", "));
    }
    Ok(())
}

fn format_ts_iso(ts_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_millis)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts_millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_render_as_utc() {
        assert_eq!(format_ts_iso(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_ts_iso(1_700_000_000_123), "2023-11-14T22:13:20Z");
    }
}
