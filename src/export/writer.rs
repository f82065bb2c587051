//! JSON array writer for export operations
//!
//! Produces a single UTF-8 JSON array: the literal `[\n`, documents rendered
//! as relaxed Extended JSON with 4-space indentation, `,\n` before every
//! entry but the first, and `\n]` at the very end with no trailing newline.
//!
//! Serialized text accumulates in memory and is appended to the file each
//! time the buffer grows past the flush threshold.

use std::path::{Path, PathBuf};

use bson::{Bson, Document};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ExportError, Result};

/// Buffered writer for one JSON array file
pub struct JsonArrayWriter {
    path: PathBuf,
    file: Option<File>,
    buffer: String,
    threshold: usize,
    entries: u64,
    bytes_written: u64,
    flushes: u64,
}

impl JsonArrayWriter {
    /// Create (or truncate) the destination and start the array
    ///
    /// # Arguments
    /// * `path` - Output file path; its parent directory must exist
    /// * `threshold` - Buffered bytes that trigger an append
    pub async fn create(path: impl AsRef<Path>, threshold: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        validate_path(&path)?;

        let file = File::create(&path).await?;
        debug!("Created JSON array writer for: {}", path.display());

        let mut buffer = String::with_capacity(threshold.min(8 * 1024 * 1024) + 1024);
        buffer.push_str("[\n");

        Ok(Self {
            path,
            file: Some(file),
            buffer,
            threshold,
            entries: 0,
            bytes_written: 0,
            flushes: 0,
        })
    }

    /// Append one document to the array
    pub async fn write_document(&mut self, doc: Document) -> Result<()> {
        if self.file.is_none() {
            return Err(ExportError::WriterClosed(self.path.clone()).into());
        }

        if self.entries > 0 {
            self.buffer.push_str(",\n");
        }
        self.buffer.push_str(&render_document(doc)?);
        self.entries += 1;

        if self.buffer.len() > self.threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Append the buffered text to the file and clear the buffer
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let Some(file) = self.file.as_mut() else {
            return Err(ExportError::WriterClosed(self.path.clone()).into());
        };

        file.write_all(self.buffer.as_bytes()).await?;
        file.flush().await?;

        self.bytes_written += self.buffer.len() as u64;
        self.flushes += 1;
        debug!(
            "Flushed {} bytes to {} ({} documents so far)",
            self.buffer.len(),
            self.path.display(),
            self.entries
        );
        self.buffer.clear();
        Ok(())
    }

    /// Close the array, flush, and return the file size
    pub async fn finish(&mut self) -> Result<u64> {
        self.buffer.push_str("\n]");
        self.flush().await?;
        if let Some(file) = self.file.take() {
            file.sync_all().await?;
        }
        Ok(self.bytes_written)
    }

    /// Flush what has been received and stop without closing the array
    pub async fn abandon(&mut self) -> Result<u64> {
        let flushed = self.flush().await;
        self.file = None;
        flushed.map(|_| self.bytes_written)
    }

    /// Drop buffered text and delete the destination. A missing file is fine.
    pub async fn discard(&mut self) -> Result<()> {
        self.buffer.clear();
        self.file = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Deleted partial export {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Documents written (buffered or flushed)
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Appends performed so far
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Render one document as relaxed Extended JSON with 4-space indentation
pub fn render_document(doc: Document) -> Result<String> {
    let value = Bson::Document(doc).into_relaxed_extjson();

    let mut out = Vec::with_capacity(256);
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;

    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Check that the destination's parent directory exists
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ExportError::DirectoryMissing(parent.to_path_buf()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use tokio::fs;

    #[test]
    fn test_render_uses_four_space_indent() {
        let rendered = render_document(doc! { "name": "Alice", "tags": ["a"] }).unwrap();
        assert_eq!(
            rendered,
            "{\n    \"name\": \"Alice\",\n    \"tags\": [\n        \"a\"\n    ]\n}"
        );
    }

    #[test]
    fn test_render_relaxed_extended_json() {
        let rendered = render_document(doc! { "n": 5_i64 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["n"], 5);
    }

    #[tokio::test]
    async fn test_exact_framing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut writer = JsonArrayWriter::create(&path, 1024 * 1024).await.unwrap();

        writer.write_document(doc! { "a": 1 }).await.unwrap();
        writer.write_document(doc! { "b": 2 }).await.unwrap();
        writer.finish().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "[\n{\n    \"a\": 1\n},\n{\n    \"b\": 2\n}\n]");
    }

    #[tokio::test]
    async fn test_empty_array_is_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let mut writer = JsonArrayWriter::create(&path, 1024).await.unwrap();
        writer.finish().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "[\n\n]");
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn test_flushes_when_threshold_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.json");
        let mut writer = JsonArrayWriter::create(&path, 64).await.unwrap();

        for i in 0..10 {
            writer
                .write_document(doc! { "i": i, "padding": "xxxxxxxxxxxxxxxxxxxxxxxxxxxxxx" })
                .await
                .unwrap();
            assert!(writer.buffered_bytes() <= 64 || writer.flushes() > 0);
        }
        assert!(writer.flushes() >= 5);

        let size = writer.finish().await.unwrap();
        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(size, content.len() as u64);
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 10);
    }

    #[tokio::test]
    async fn test_abandon_keeps_entries_without_bracket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        let mut writer = JsonArrayWriter::create(&path, 1024 * 1024).await.unwrap();

        writer.write_document(doc! { "a": 1 }).await.unwrap();
        writer.abandon().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "[\n{\n    \"a\": 1\n}");
        assert!(writer.write_document(doc! { "b": 2 }).await.is_err());
    }

    #[tokio::test]
    async fn test_discard_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.json");
        let mut writer = JsonArrayWriter::create(&path, 8).await.unwrap();

        writer.write_document(doc! { "a": 1 }).await.unwrap();
        writer.discard().await.unwrap();
        assert!(!path.exists());

        // Second discard finds nothing to delete
        writer.discard().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_directory() {
        let result = JsonArrayWriter::create("/nonexistent/directory/file.json", 1024).await;
        assert!(result.is_err());
    }
}
