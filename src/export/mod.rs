//! Streaming export to a JSON array file
//!
//! The export system is built from three parts:
//!
//! 1. **ExportSink**: drives a [`StreamingCursor`] to completion, cancellation
//!    or error and decides what happens to the destination file
//! 2. **JsonArrayWriter**: owns the bounded in-memory buffer and the array framing
//! 3. **ProgressTracker**: renders [`ExportProgress`] events for a terminal
//!
//! # Example
//!
//! ```no_run
//! use docport::export::export_to_file;
//! use docport::connection::Connection;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(conn: &Connection) -> docport::Result<()> {
//! let cancel = CancellationToken::new();
//! let cursor = conn
//!     .stream_documents("shop", "orders", cancel.clone(), Some(r#"{"status":"open"}"#), None, None)
//!     .await?;
//! let count = export_to_file(cursor, "orders.json", |p| println!("{}", p.count()), &cancel).await?;
//! println!("exported {count} documents");
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use chrono::Local;
use tokio_util::sync::CancellationToken;

use crate::cursor::StreamingCursor;
use crate::error::Result;

pub mod progress;
pub mod sink;
pub mod writer;

pub use progress::{ExportProgress, ProgressTracker};
pub use sink::{ExportOutcome, ExportSink};
pub use writer::{JsonArrayWriter, render_document};

/// Drain `cursor` into `destination` with default tuning and return the document count.
///
/// A cancelled export returns the partial count; the destination is deleted.
pub async fn export_to_file<F>(
    mut cursor: StreamingCursor,
    destination: impl AsRef<Path>,
    on_progress: F,
    cancel: &CancellationToken,
) -> Result<u64>
where
    F: FnMut(ExportProgress),
{
    let outcome = ExportSink::default()
        .run(&mut cursor, destination, on_progress, cancel)
        .await?;
    Ok(outcome.documents_exported)
}

/// Suggested destination file name for a collection
pub fn default_filename(collection: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("{collection}-{timestamp}.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filename() {
        let name = default_filename("orders");
        assert!(name.starts_with("orders-"));
        assert!(name.ends_with(".json"));
    }
}
