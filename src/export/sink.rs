//! Export sink: drains a streaming cursor into a JSON array file
//!
//! Outcomes:
//! - exhaustion: array closed, final flush, `Completed` progress event
//! - cancellation: cursor closed, destination deleted, partial count returned
//!   with `cancelled: true` (not an error)
//! - fetch error: buffered entries flushed, destination kept as an unterminated
//!   array, one `error!` line logged, error returned

use std::path::Path;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ExportConfig;
use crate::cursor::StreamingCursor;
use crate::error::{DocportError, Result, extract_error_info};

use super::progress::ExportProgress;
use super::writer::JsonArrayWriter;

/// Result of an export operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    /// Number of documents exported (partial on cancellation)
    pub documents_exported: u64,
    /// Whether the export was cancelled
    pub cancelled: bool,
    /// Bytes in the destination file; zero when it was deleted
    pub bytes_written: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
}

/// Serializes a document sequence into a single on-disk JSON array
#[derive(Debug, Clone)]
pub struct ExportSink {
    flush_threshold: usize,
    progress_interval: u64,
}

impl Default for ExportSink {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

impl ExportSink {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            flush_threshold: config.flush_threshold_bytes.max(1),
            progress_interval: config.progress_interval.max(1),
        }
    }

    /// Drain `cursor` into `destination`
    ///
    /// # Arguments
    /// * `cursor` - Source sequence; closed on every exit path
    /// * `destination` - Output path, created or truncated
    /// * `on_progress` - Receives a running count every interval, and once on completion
    /// * `cancel` - Shared with the cursor; checked before every document
    pub async fn run<F>(
        &self,
        cursor: &mut StreamingCursor,
        destination: impl AsRef<Path>,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<ExportOutcome>
    where
        F: FnMut(ExportProgress),
    {
        let start_time = Instant::now();
        let path = destination.as_ref();

        let mut writer = match JsonArrayWriter::create(path, self.flush_threshold).await {
            Ok(writer) => writer,
            Err(e) => {
                let _ = cursor.close().await;
                return Err(e);
            }
        };

        info!(
            "Starting export of {} to {}",
            cursor.namespace(),
            path.display()
        );
        let mut exported = 0u64;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match cursor.next().await {
                Ok(Some(doc)) => {
                    if let Err(e) = writer.write_document(doc).await {
                        let _ = cursor.close().await;
                        report_failure(path, exported, &e);
                        return Err(e);
                    }
                    exported += 1;
                    if exported % self.progress_interval == 0 {
                        on_progress(ExportProgress::Documents(exported));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    if let Err(flush_err) = writer.abandon().await {
                        warn!(
                            "Could not flush partial export {}: {}",
                            path.display(),
                            flush_err
                        );
                    }
                    report_failure(path, exported, &e);
                    return Err(e);
                }
            }
        }

        if cancel.is_cancelled() || cursor.was_cancelled() {
            if let Err(e) = cursor.close().await {
                debug!("Cursor close after cancellation failed: {}", e);
            }
            writer.discard().await?;
            info!(
                "Export to {} cancelled after {} documents; partial file deleted",
                path.display(),
                exported
            );
            return Ok(ExportOutcome {
                documents_exported: exported,
                cancelled: true,
                bytes_written: 0,
                elapsed_ms: start_time.elapsed().as_millis() as u64,
            });
        }

        let bytes_written = writer.finish().await?;
        cursor.close().await?;
        on_progress(ExportProgress::Completed(exported));

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Export completed: {} documents, {} bytes, {} ms",
            exported, bytes_written, elapsed_ms
        );

        Ok(ExportOutcome {
            documents_exported: exported,
            cancelled: false,
            bytes_written,
            elapsed_ms,
        })
    }
}

/// One-line log entry for a failed export
fn report_failure(path: &Path, exported: u64, err: &DocportError) {
    error!(
        "Export to {} failed after {} documents: {}",
        path.display(),
        exported,
        failure_detail(err)
    );
}

/// Driver errors are logged as compact `ErrorInfo` JSON, everything else as text
fn failure_detail(err: &DocportError) -> String {
    let driver = match err {
        DocportError::MongoDb(e) => Some(e),
        DocportError::Cursor(e) => e.driver_error(),
        _ => None,
    };
    match driver {
        Some(e) => extract_error_info(e)
            .to_json_compact()
            .unwrap_or_else(|_| err.to_string()),
        None => err.to_string(),
    }
}
