use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide `Result` type using [`DocportError`] as the error.
pub type Result<T> = std::result::Result<T, DocportError>;

/// Top-level error type for docport operations.
///
/// Wraps the more specific error kinds so that every fallible operation in
/// the crate can return the same type. Cancellation is deliberately absent:
/// a cancelled export or cursor is a normal outcome, not an error.
#[derive(Debug, Error)]
pub enum DocportError {
    /// Connection acquisition errors.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Failures while pulling pages from an open cursor.
    #[error("Fetch error: {0}")]
    Cursor(#[from] CursorError),

    /// Session bookkeeping errors.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Export destination errors.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (file append, delete, metadata).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// MongoDB driver errors that are not classified further.
    #[error("{}", super::mongo::describe_mongodb_error(.0))]
    MongoDb(#[from] mongodb::error::Error),

    /// JSON serialization errors.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connection-specific errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// No stored secret exists for the credential id.
    #[error("No connection secret stored for credential '{0}'")]
    UnknownCredential(String),

    /// The connection string could not be parsed.
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// The local emulator refused the connection.
    #[error(
        "Unable to reach the local emulator at {target}. Make sure the emulator is running \
         and listening on the configured port, then try again."
    )]
    EmulatorUnreachable { target: String },

    /// The local emulator presented a certificate the platform does not trust.
    #[error(
        "The local emulator at {target} presented a self-signed certificate that is not trusted. \
         Import the emulator certificate into the trust store or mark the credential as an \
         emulator so certificate validation is relaxed."
    )]
    EmulatorCertificateUntrusted { target: String },

    /// Any other failure to establish the connection. Carries the driver message verbatim.
    #[error("{0}")]
    ConnectFailed(String),
}

/// Errors raised while pulling a page from an open cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    /// The underlying fetch failed.
    #[error("failed to fetch documents from {namespace}: {message}")]
    FetchFailed {
        namespace: String,
        message: String,
        #[source]
        source: Option<mongodb::error::Error>,
    },
}

impl CursorError {
    /// Fetch failure described only by a message
    pub fn fetch_failed(namespace: impl Into<String>, message: impl Into<String>) -> Self {
        CursorError::FetchFailed {
            namespace: namespace.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Fetch failure raised by the driver; the driver error is kept as the source
    pub fn from_driver(namespace: impl Into<String>, error: mongodb::error::Error) -> Self {
        CursorError::FetchFailed {
            namespace: namespace.into(),
            message: error.to_string(),
            source: Some(error),
        }
    }

    /// Driver error behind this failure, if any
    pub fn driver_error(&self) -> Option<&mongodb::error::Error> {
        match self {
            CursorError::FetchFailed { source, .. } => source.as_ref(),
        }
    }
}

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session id is unknown. Sessions are never created implicitly.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Page arguments are unusable.
    #[error("Invalid page request: {0}")]
    InvalidPage(String),
}

/// Export destination errors.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The destination's parent directory does not exist.
    #[error("Directory does not exist: {}", .0.display())]
    DirectoryMissing(PathBuf),

    /// The writer was used after it was finalized or discarded.
    #[error("Export writer for {} is already closed", .0.display())]
    WriterClosed(PathBuf),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Invalid config format.
    #[error("Invalid config format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid field value.
    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },
}

impl DocportError {
    /// Whether this error came from a page fetch on an open cursor.
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, DocportError::Cursor(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_passes_message_through() {
        let err: DocportError = ConnectionError::ConnectFailed("auth failed".into()).into();
        assert_eq!(err.to_string(), "Connection error: auth failed");
    }

    #[test]
    fn test_session_not_found_message() {
        let err = SessionError::NotFound("abc".into());
        assert_eq!(err.to_string(), "Session not found: abc");
    }

    #[test]
    fn test_fetch_error_classification() {
        let err: DocportError = CursorError::fetch_failed("db.coll", "boom").into();
        assert!(err.is_fetch_error());
        assert!(err.to_string().contains("db.coll"));
    }

    #[test]
    fn test_driver_fetch_error_keeps_source() {
        use std::error::Error as _;

        let driver = mongodb::error::Error::from(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        ));
        let err = CursorError::from_driver("db.coll", driver);

        assert!(err.driver_error().is_some());
        assert!(err.source().is_some());
        assert!(err.to_string().contains("connection reset by peer"));
        assert!(CursorError::fetch_failed("db.coll", "boom").driver_error().is_none());
    }

    #[test]
    fn test_directory_missing_message() {
        let err = ExportError::DirectoryMissing(PathBuf::from("/nope"));
        assert_eq!(err.to_string(), "Directory does not exist: /nope");
    }
}
