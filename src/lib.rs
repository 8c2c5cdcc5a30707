//! # docmind
//!
//! Classify PDF documents and extract structured field data using a hosted
//! LLM file/content API.
//!
//! ## Workflow Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Upload    submit the file to the model service's File API
//!  ├─ 2. Classify  ask for the category (Invoice / Medical / Education / Insurance)
//!  ├─ 3. Extract   ask for the fields of that category as JSON
//!  ├─ 4. Normalize reshape whatever JSON came back into headers + rows
//!  └─ 5. Output    aligned terminal table and/or CSV export
//! ```
//!
//! The model service does the reading; this crate does the orchestration.
//! Whatever shape the extraction reply takes — a `headers`/`rows` table, a
//! flat mapping, a list of records, a bare grid, or a stray scalar — the
//! caller always receives one uniform [`TabularResult`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docmind::{GatewayConfig, GeminiGateway, Session, WorkflowController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY
//!     let gateway = GeminiGateway::new(GatewayConfig::default())?;
//!     let controller = WorkflowController::new(Arc::new(gateway));
//!
//!     let mut session = Session::new();
//!     let category = controller
//!         .submit_document(&mut session, "invoice.pdf".as_ref())
//!         .await?;
//!     println!("Document detected as: {category}");
//!
//!     let table = controller.extract(&mut session).await?;
//!     print!("{}", table.render_text());
//!     println!("{}", table.to_csv());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docmind` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docmind = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod gateway;
pub mod prompts;
pub mod table;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use error::DocMindError;
pub use export::{default_csv_filename, export_csv};
pub use gateway::{DocumentHandle, GeminiGateway, ModelGateway};
pub use table::{normalize, ReplyShape, TabularResult};
pub use workflow::{ClassificationResult, Session, Stage, WorkflowController};
