//! # smartdoc
//!
//! Document ingestion backend for retrieval-augmented chat.
//!
//! Uploaded files are routed to a format-specific extractor by extension,
//! the extracted text is embedded as a whole and in overlapping windows,
//! and the document, its chunks and its vectors are persisted in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Upload  │──▶│ Extractors │──▶│ Chunk+Embed │──▶│  SQLite  │
//! │ sanitize │   │ by ext     │   │ 500/50 win  │   │ docs+chk │
//! └──────────┘   └────────────┘   └─────────────┘   └────┬─────┘
//!                                                        │
//!                                     ┌──────────────────┤
//!                                     ▼                  ▼
//!                                ┌──────────┐      ┌──────────┐
//!                                │ similar  │      │ context  │
//!                                └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! smartdoc init
//! smartdoc upload ./report.pdf
//! smartdoc similar "quarterly revenue"
//! smartdoc context <id> <id>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents, chunks, extraction results |
//! | [`extract`] | Extractor trait, registry and format extractors |
//! | [`chunk`] | Overlapping character windows |
//! | [`embedding`] | Embedding backends and the batching generator |
//! | [`store`] | Persistence trait with SQLite and in-memory backends |
//! | [`pipeline`] | Upload, process, delete, similarity and context |
//! | [`context`] | Prompt context assembly |
//! | [`commands`] | CLI command implementations |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Error types |

pub mod chunk;
pub mod commands;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod store;

pub use error::{Error, Result};
pub use pipeline::DocumentPipeline;
