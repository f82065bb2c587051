//! Error handling for the connection registry and export pipeline.
//!
//! This module provides:
//! - A crate-wide error type with nested kinds per subsystem
//! - Rewriting of emulator connection failures into actionable messages
//! - Structured error information extracted from MongoDB driver errors
//!
//! # Example
//!
//! ```rust
//! use docport::error::{rewrite_connection_error, ConnectionError};
//!
//! let err = rewrite_connection_error("connect ECONNREFUSED", "localhost:10255", true);
//! assert!(matches!(err, ConnectionError::EmulatorUnreachable { .. }));
//! ```

pub mod kinds;
pub mod mongo;

// Re-export commonly used types
pub use kinds::{
    ConfigError, ConnectionError, CursorError, DocportError, ExportError, Result, SessionError,
};
pub use mongo::{
    EmulatorFailure, ErrorInfo, classify_failure_message, extract_error_info,
    rewrite_connection_error, rewrite_mongodb_connect_error,
};
