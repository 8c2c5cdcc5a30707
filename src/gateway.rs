//! Model gateway: upload a document and run generation requests against the
//! hosted model service.
//!
//! The gateway is deliberately thin — its correctness requirement is
//! "faithfully relay bytes and decode JSON", nothing more. All prompt
//! engineering lives in [`crate::prompts`] and all reply interpretation in
//! [`crate::table`], so this module can be swapped (e.g. for another vendor's
//! file API) without touching workflow or normalization logic.
//!
//! [`ModelGateway`] is the seam the workflow controller depends on; tests
//! inject a scripted stub instead of [`GeminiGateway`].

use crate::config::GatewayConfig;
use crate::error::DocMindError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Opaque reference to an uploaded document, scoped to one workflow run.
///
/// Mirrors the file resource returned by the service's File API; only the
/// fields needed to address the file in a generation call are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHandle {
    /// Resource name, e.g. `files/abc-123`.
    pub name: String,
    /// URI referenced from generation requests.
    pub uri: String,
    /// MIME type recorded at upload time.
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Boundary to the hosted model service.
///
/// Two operations, matching the two endpoints the service exposes: a binary
/// upload returning an opaque handle, and a generation call returning a
/// decoded JSON value.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Submit a local file to the service and return its handle.
    async fn upload_document(&self, path: &Path) -> Result<DocumentHandle, DocMindError>;

    /// Send `prompt` plus the uploaded document to the service, requesting a
    /// JSON-formatted reply, and return the decoded value.
    async fn generate(
        &self,
        handle: &DocumentHandle,
        prompt: &str,
    ) -> Result<Value, DocMindError>;
}

// ── Gemini implementation ────────────────────────────────────────────────

/// [`ModelGateway`] implementation over the Gemini File + generateContent
/// REST endpoints.
pub struct GeminiGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    api_key: String,
}

impl GeminiGateway {
    /// Create a gateway from the given config.
    ///
    /// Resolves the API key eagerly (config value, else `GEMINI_API_KEY`) so
    /// a missing credential surfaces before any file is uploaded.
    pub fn new(config: GatewayConfig) -> Result<Self, DocMindError> {
        let api_key = config.resolve_api_key()?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DocMindError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// The two-step resumable upload: a `start` request that returns the
    /// session URL, then a single `upload, finalize` request with the bytes.
    async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        display_name: &str,
    ) -> Result<DocumentHandle, DocMindError> {
        let start_url = format!("{}/upload/v1beta/files", self.config.base_url);
        let timeout = Duration::from_secs(self.config.upload_timeout_secs);

        let start = self
            .client
            .post(&start_url)
            .timeout(timeout)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", "application/pdf")
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| self.upload_err(e))?;

        if !start.status().is_success() {
            return Err(DocMindError::UploadFailed {
                reason: format!("upload start: {}", status_detail(start).await),
            });
        }

        let session_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DocMindError::UploadFailed {
                reason: "service did not return an upload session URL".into(),
            })?;

        let byte_len = bytes.len();
        let finalize = self
            .client
            .post(&session_url)
            .timeout(timeout)
            .header("Content-Length", byte_len)
            .header("X-Goog-Upload-Offset", 0)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| self.upload_err(e))?;

        if !finalize.status().is_success() {
            return Err(DocMindError::UploadFailed {
                reason: format!("upload finalize: {}", status_detail(finalize).await),
            });
        }

        let reply: Value = finalize
            .json()
            .await
            .map_err(|e| DocMindError::UploadFailed {
                reason: format!("upload reply was not JSON: {e}"),
            })?;

        let handle: DocumentHandle = serde_json::from_value(reply["file"].clone())
            .map_err(|e| DocMindError::UploadFailed {
                reason: format!("upload reply missing file resource: {e}"),
            })?;

        info!("Uploaded {} bytes as {}", byte_len, handle.name);
        Ok(handle)
    }

    fn upload_err(&self, e: reqwest::Error) -> DocMindError {
        if e.is_timeout() {
            DocMindError::UploadTimeout {
                secs: self.config.upload_timeout_secs,
            }
        } else {
            DocMindError::UploadFailed {
                reason: e.to_string(),
            }
        }
    }

    fn generation_err(&self, e: reqwest::Error) -> DocMindError {
        if e.is_timeout() {
            DocMindError::ApiTimeout {
                secs: self.config.api_timeout_secs,
            }
        } else {
            DocMindError::GenerationFailed {
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn upload_document(&self, path: &Path) -> Result<DocumentHandle, DocMindError> {
        let bytes = read_validated_pdf(path)?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        self.upload_bytes(bytes, &display_name).await
    }

    async fn generate(
        &self,
        handle: &DocumentHandle,
        prompt: &str,
    ) -> Result<Value, DocMindError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let body = json!({
            "contents": [{
                "parts": [
                    { "fileData": { "fileUri": handle.uri, "mimeType": handle.mime_type } },
                    { "text": prompt },
                ],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            },
        });

        debug!("generateContent via {} ({} prompt bytes)", self.config.model, prompt.len());

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(self.config.api_timeout_secs))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.generation_err(e))?;

        if !response.status().is_success() {
            return Err(DocMindError::GenerationFailed {
                reason: status_detail(response).await,
            });
        }

        let reply: Value = response
            .json()
            .await
            .map_err(|e| DocMindError::GenerationFailed {
                reason: format!("malformed generation envelope: {e}"),
            })?;

        let text = reply_text(&reply).ok_or_else(|| DocMindError::GenerationFailed {
            reason: "generation reply contained no text candidate".into(),
        })?;

        decode_reply(&text)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Read a local file, validating existence, readability, and PDF magic bytes
/// before spending an upload on it.
fn read_validated_pdf(path: &Path) -> Result<Vec<u8>, DocMindError> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocMindError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => {
            return Err(DocMindError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
    };

    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(DocMindError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    Ok(bytes)
}

/// Concatenate the text parts of the first candidate.
fn reply_text(reply: &Value) -> Option<String> {
    let parts = reply
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decode the reply text as JSON.
///
/// `responseMimeType: application/json` makes fenced replies rare, but some
/// models still wrap the payload in a ```json fence. One strip-and-retry
/// covers that before giving up with `InvalidReply`.
fn decode_reply(text: &str) -> Result<Value, DocMindError> {
    match serde_json::from_str(text) {
        Ok(v) => Ok(v),
        Err(first_err) => {
            let stripped = strip_code_fence(text);
            if stripped != text {
                if let Ok(v) = serde_json::from_str(stripped) {
                    return Ok(v);
                }
            }
            Err(DocMindError::InvalidReply {
                detail: first_err.to_string(),
            })
        }
    }
}

/// Strip a single outer ``` or ```json fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").map(str::trim).unwrap_or(text)
}

/// Render an error response as "HTTP <status>: <body snippet>".
async fn status_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(300).collect();
    if snippet.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {snippet}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decode_reply_plain_json() {
        let v = decode_reply(r#"{"category": "Invoice"}"#).unwrap();
        assert_eq!(v["category"], "Invoice");
    }

    #[test]
    fn decode_reply_strips_fence() {
        let v = decode_reply("```json\n[{\"category\": \"Medical\"}]\n```").unwrap();
        assert_eq!(v[0]["category"], "Medical");
    }

    #[test]
    fn decode_reply_rejects_prose() {
        let err = decode_reply("The document appears to be an invoice.").unwrap_err();
        assert!(matches!(err, DocMindError::InvalidReply { .. }));
    }

    #[test]
    fn reply_text_concatenates_parts() {
        let reply = serde_json::json!({
            "candidates": [{
                "content": { "parts": [ { "text": "{\"a\":" }, { "text": "1}" } ] }
            }]
        });
        assert_eq!(reply_text(&reply).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn reply_text_empty_candidates() {
        assert!(reply_text(&serde_json::json!({ "candidates": [] })).is_none());
    }

    #[test]
    fn handle_deserializes_from_file_resource() {
        let v = serde_json::json!({
            "name": "files/abc-123",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc-123",
            "mimeType": "application/pdf"
        });
        let h: DocumentHandle = serde_json::from_value(v).unwrap();
        assert_eq!(h.name, "files/abc-123");
        assert_eq!(h.mime_type, "application/pdf");
    }

    #[test]
    fn read_validated_pdf_missing_file() {
        let err = read_validated_pdf(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, DocMindError::FileNotFound { .. }));
    }

    #[test]
    fn read_validated_pdf_rejects_non_pdf() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world").unwrap();
        let err = read_validated_pdf(f.path()).unwrap_err();
        assert!(matches!(err, DocMindError::NotAPdf { .. }));
    }

    #[test]
    fn read_validated_pdf_accepts_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n...").unwrap();
        let bytes = read_validated_pdf(f.path()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
