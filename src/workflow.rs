//! Workflow controller: the upload → classify → extract sequence.
//!
//! All per-run mutable state lives in an explicit [`Session`] owned by the
//! caller; [`WorkflowController`] holds only the gateway and operates on
//! whichever session it is handed. Nothing here is global or process-wide,
//! so independent sessions never share state and tests can run workflows
//! side by side.
//!
//! ## Stage machine
//!
//! ```text
//! AwaitingUpload ──submit_document──▶ Classified ──extract──▶ Extracted
//!       ▲   ▲                            │                       │
//!       │   └────── failure (restart) ───┴───────────────────────│
//!       └───────────────────── reset() ──────────────────────────┘
//! ```
//!
//! Ordering guarantees: extraction is never attempted before a category has
//! been established, and classification never before an upload handle exists.
//! Both are enforced with a stage check that fails fast, before any network
//! call. Upload and generation failures are surfaced verbatim and never
//! retried; the session is always left in a state `reset()` or a fresh
//! submission recovers from.

use crate::error::DocMindError;
use crate::gateway::{DocumentHandle, ModelGateway};
use crate::prompts::{extraction_prompt, CLASSIFICATION_PROMPT};
use crate::table::{normalize, TabularResult};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Category reported when the classification reply has no recognisable shape.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Where a [`Session`] currently is in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    /// Initial state: no document submitted yet.
    #[default]
    AwaitingUpload,
    /// Document uploaded and classified; awaiting the advance action.
    Classified,
    /// Extraction complete; the tabular result is available.
    Extracted,
}

impl Stage {
    /// Stable name used in error messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            Stage::AwaitingUpload => "AwaitingUpload",
            Stage::Classified => "Classified",
            Stage::Extracted => "Extracted",
        }
    }
}

/// Classification outcome derived from a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub category: String,
}

impl ClassificationResult {
    /// Derive the category from a decoded classification reply.
    ///
    /// The prompt asks for a single-element list of a mapping with key
    /// `category`; a bare mapping is also accepted. Anything else — or a
    /// non-string category value — yields [`UNKNOWN_CATEGORY`].
    pub fn from_reply(reply: &Value) -> Self {
        let category = match reply {
            Value::Array(items) => items
                .first()
                .and_then(|first| first.get("category"))
                .and_then(Value::as_str),
            Value::Object(_) => reply.get("category").and_then(Value::as_str),
            _ => None,
        };
        Self {
            category: category.unwrap_or(UNKNOWN_CATEGORY).to_string(),
        }
    }
}

/// Per-run workflow state, created and owned by the caller.
///
/// Mutated in place as stages advance; dropped or [`reset`](Session::reset)
/// when the run ends. All data lives in memory only.
#[derive(Debug, Default)]
pub struct Session {
    stage: Stage,
    handle: Option<DocumentHandle>,
    category: Option<String>,
    raw_result: Option<Value>,
    result: Option<TabularResult>,
    last_error: Option<String>,
}

impl Session {
    /// A fresh session in `AwaitingUpload`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current workflow stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Handle of the uploaded document, once one exists.
    pub fn handle(&self) -> Option<&DocumentHandle> {
        self.handle.as_ref()
    }

    /// Detected category, once classification has run.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Normalized extraction result, once extraction has run.
    pub fn result(&self) -> Option<&TabularResult> {
        self.result.as_ref()
    }

    /// Raw decoded extraction reply, before normalization.
    pub fn raw_result(&self) -> Option<&Value> {
        self.raw_result.as_ref()
    }

    /// Message of the most recent failed action, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Return to `AwaitingUpload`, clearing every field.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Failure path: back to the initial stage with fields cleared, keeping
    /// the error message readable until the next action.
    fn fail(&mut self, message: String) {
        let stage = self.stage;
        self.reset();
        self.last_error = Some(message);
        warn!("Workflow failed in {}: restarting", stage.name());
    }

    fn require_stage(&self, expected: Stage) -> Result<(), DocMindError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(DocMindError::WrongStage {
                expected: expected.name(),
                actual: self.stage.name(),
            })
        }
    }
}

/// Drives sessions through the three-stage workflow.
///
/// Holds only the gateway; clone-cheap via the inner [`Arc`].
#[derive(Clone)]
pub struct WorkflowController {
    gateway: Arc<dyn ModelGateway>,
}

impl WorkflowController {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Submit a document: upload it, classify it, and advance the session to
    /// [`Stage::Classified`]. Returns the detected category.
    ///
    /// On any failure the session is left in `AwaitingUpload` with the error
    /// message recorded, and the error is returned.
    pub async fn submit_document(
        &self,
        session: &mut Session,
        path: &Path,
    ) -> Result<String, DocMindError> {
        session.require_stage(Stage::AwaitingUpload)?;
        session.last_error = None;

        info!("Submitting document: {}", path.display());
        let handle = match self.gateway.upload_document(path).await {
            Ok(h) => h,
            Err(e) => {
                session.fail(e.to_string());
                return Err(e);
            }
        };

        let reply = match self.gateway.generate(&handle, CLASSIFICATION_PROMPT).await {
            Ok(r) => r,
            Err(e) => {
                session.fail(e.to_string());
                return Err(e);
            }
        };

        let classification = ClassificationResult::from_reply(&reply);
        info!("Document classified as {}", classification.category);

        session.handle = Some(handle);
        session.category = Some(classification.category.clone());
        session.stage = Stage::Classified;
        Ok(classification.category)
    }

    /// Submit a document held in memory.
    ///
    /// The bytes are written to a named temp file immediately before the
    /// upload call; the file is deleted unconditionally when the guard drops,
    /// success or failure, so repeated runs cannot leak descriptors or disk.
    pub async fn submit_document_bytes(
        &self,
        session: &mut Session,
        bytes: &[u8],
    ) -> Result<String, DocMindError> {
        let mut tmp = tempfile::NamedTempFile::new()
            .map_err(|e| DocMindError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| DocMindError::Internal(format!("tempfile write: {e}")))?;
        // `tmp` is dropped (and the file deleted) when this call returns.
        self.submit_document(session, tmp.path()).await
    }

    /// Advance a classified session: run extraction for the stored category
    /// and move to [`Stage::Extracted`]. Returns the normalized table.
    ///
    /// On failure the workflow restarts: the session returns to
    /// `AwaitingUpload` with the error message recorded.
    pub async fn extract(&self, session: &mut Session) -> Result<TabularResult, DocMindError> {
        session.require_stage(Stage::Classified)?;

        let handle = session
            .handle
            .clone()
            .ok_or_else(|| DocMindError::Internal("classified session without handle".into()))?;
        let category = session
            .category
            .clone()
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());

        info!("Extracting fields for category {}", category);
        let prompt = extraction_prompt(&category);

        let reply = match self.gateway.generate(&handle, &prompt).await {
            Ok(r) => r,
            Err(e) => {
                session.fail(e.to_string());
                return Err(e);
            }
        };

        let table = normalize(&reply);
        info!(
            "Extraction produced {} columns × {} rows",
            table.headers.len(),
            table.rows.len()
        );

        session.raw_result = Some(reply);
        session.result = Some(table.clone());
        session.stage = Stage::Extracted;
        session.last_error = None;
        Ok(table)
    }
}
