//! Pooled document-database connections with cancellable streaming export
//!
//! This library keeps one live connection per credential id, exposes filtered
//! queries as lazy, cancellable document sequences, and drains those
//! sequences into JSON array files with bounded memory.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: Connection registry and MongoDB driver glue
//! - `credentials`: Credential resolution
//! - `cursor`: Streaming cursors and filter parsing
//! - `error`: Error types and handling
//! - `export`: JSON array export sink
//! - `session`: Per-interaction sessions with query caches
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docport::config::Config;
//! use docport::connection::{ConnectionRegistry, MongoConnector};
//! use docport::credentials::ConfigCredentialResolver;
//! use docport::export::export_to_file;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_from_file(None)?;
//!     let registry = ConnectionRegistry::new(
//!         Arc::new(ConfigCredentialResolver::new(config.credentials.clone())),
//!         Arc::new(MongoConnector),
//!         config.connection.clone(),
//!     );
//!
//!     let cancel = CancellationToken::new();
//!     let conn = registry.acquire("local").await?;
//!     let cursor = conn
//!         .stream_documents("shop", "orders", cancel.clone(), None, None, None)
//!         .await?;
//!     let count = export_to_file(cursor, "orders.json", |_| {}, &cancel).await?;
//!     println!("Exported {count} documents");
//!
//!     registry.release("local").await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod cursor;
pub mod error;
pub mod export;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use connection::{Connection, ConnectionRegistry};
pub use cursor::StreamingCursor;
pub use error::{DocportError, Result};
pub use export::{ExportOutcome, ExportSink};
pub use session::SessionManager;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
