//! CSV export of a normalized table.
//!
//! The CSV document is derived directly from the current [`TabularResult`]:
//! headers as the CSV header row, rows verbatim, UTF-8 encoded. File writes
//! are atomic (temp file + rename) so an interrupted export never leaves a
//! partial file behind.

use crate::error::DocMindError;
use crate::table::TabularResult;
use std::path::Path;
use tracing::info;

/// Default export filename for a detected category, e.g. `Invoice_data.csv`.
pub fn default_csv_filename(category: &str) -> String {
    format!("{category}_data.csv")
}

/// Write the table as CSV to `path`, creating parent directories as needed.
pub async fn export_csv(
    table: &TabularResult,
    path: impl AsRef<Path>,
) -> Result<(), DocMindError> {
    let path = path.as_ref();
    let csv = table.to_csv();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DocMindError::ExportFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, csv.as_bytes())
        .await
        .map_err(|e| DocMindError::ExportFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| DocMindError::ExportFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    info!("Exported {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> TabularResult {
        TabularResult {
            headers: vec!["Field".into(), "Value".into()],
            rows: vec![vec!["Total".into(), "100".into()]],
        }
    }

    #[test]
    fn filename_derives_from_category() {
        assert_eq!(default_csv_filename("Invoice"), "Invoice_data.csv");
        assert_eq!(default_csv_filename("Unknown"), "Unknown_data.csv");
    }

    #[tokio::test]
    async fn export_writes_utf8_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_csv(&sample_table(), &path).await.unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "Field,Value\nTotal,100\n");
    }

    #[tokio::test]
    async fn export_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.csv");
        export_csv(&sample_table(), &path).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn export_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_csv(&sample_table(), &path).await.unwrap();
        assert!(!dir.path().join("out.csv.tmp").exists());
    }
}
