use std::io;

use serde::{Deserialize, Serialize};

use super::kinds::ConnectionError;

/// Structured error information extracted from MongoDB errors.
///
/// Serialized to a single JSON line when an export fails so the log entry
/// carries the driver's classification next to the message.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl ErrorInfo {
    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Known failure signatures for a local emulator target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorFailure {
    /// Nothing is listening on the emulator port.
    Refused,
    /// The emulator's self-signed certificate was rejected.
    UntrustedCertificate,
}

const REFUSED_SIGNATURES: &[&str] = &[
    "econnrefused",
    "connection refused",
    "actively refused",
];

const CERTIFICATE_SIGNATURES: &[&str] = &[
    "self signed certificate",
    "self-signed certificate",
    "unable to verify the first certificate",
    "invalid peer certificate",
    "unknownissuer",
];

/// Classify a failure message against the emulator signatures.
pub fn classify_failure_message(message: &str) -> Option<EmulatorFailure> {
    let lower = message.to_lowercase();
    if CERTIFICATE_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        Some(EmulatorFailure::UntrustedCertificate)
    } else if REFUSED_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        Some(EmulatorFailure::Refused)
    } else {
        None
    }
}

/// Rewrite a connection failure message into a user-actionable error.
///
/// Only emulator targets get the rewritten messages; for every other target
/// the message is passed through unchanged.
pub fn rewrite_connection_error(message: &str, target: &str, is_emulator: bool) -> ConnectionError {
    if !is_emulator {
        return ConnectionError::ConnectFailed(message.to_string());
    }

    match classify_failure_message(message) {
        Some(EmulatorFailure::Refused) => ConnectionError::EmulatorUnreachable {
            target: target.to_string(),
        },
        Some(EmulatorFailure::UntrustedCertificate) => {
            ConnectionError::EmulatorCertificateUntrusted {
                target: target.to_string(),
            }
        }
        None => ConnectionError::ConnectFailed(message.to_string()),
    }
}

/// Rewrite a driver error raised while connecting.
///
/// I/O errors are checked by kind before falling back to the message text,
/// since the driver nests the socket error inside server-selection failures.
pub fn rewrite_mongodb_connect_error(
    error: &mongodb::error::Error,
    target: &str,
    is_emulator: bool,
) -> ConnectionError {
    use mongodb::error::ErrorKind;

    if is_emulator {
        if let ErrorKind::Io(io_err) = error.kind.as_ref() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return ConnectionError::EmulatorUnreachable {
                    target: target.to_string(),
                };
            }
        }
    }

    rewrite_connection_error(&error.to_string(), target, is_emulator)
}

/// Extract structured information from a MongoDB error using the driver API.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::ErrorKind;

    let mut info = ErrorInfo::default();

    match error.kind.as_ref() {
        ErrorKind::Command(command_error) => {
            info.error_type = Some("mongo.command_error".to_string());
            info.code = Some(command_error.code);
            info.message = Some(command_error.message.clone());
            info.name = get_error_name(command_error.code);
        }
        ErrorKind::Authentication { message, .. } => {
            info.error_type = Some("mongo.authentication_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::InvalidArgument { message, .. } => {
            info.error_type = Some("mongo.invalid_argument".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::ServerSelection { message, .. } => {
            info.error_type = Some("mongo.server_selection_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::Io(io_err) => {
            info.error_type = Some("mongo.io_error".to_string());
            info.message = Some(io_err.to_string());
        }
        _ => {
            info.message = Some(error.to_string());
        }
    }

    info
}

/// One-line description of a driver error, used by `Display`.
pub fn describe_mongodb_error(error: &mongodb::error::Error) -> String {
    let info = extract_error_info(error);
    let message = info.message.unwrap_or_else(|| error.to_string());
    match (info.name, info.code) {
        (Some(name), Some(code)) => format!("MongoDB error {code} ({name}): {message}"),
        (None, Some(code)) => format!("MongoDB error {code}: {message}"),
        _ => format!("MongoDB error: {message}"),
    }
}

/// Get a human-readable error name from a MongoDB error code.
fn get_error_name(code: i32) -> Option<String> {
    let name = match code {
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        43 => "CursorNotFound",
        50 => "MaxTimeMSExpired",
        16500 => "RequestRateTooLarge",
        _ => return None,
    };

    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_refused() {
        assert_eq!(
            classify_failure_message("connect ECONNREFUSED 127.0.0.1:10255"),
            Some(EmulatorFailure::Refused)
        );
        assert_eq!(
            classify_failure_message("Connection refused (os error 111)"),
            Some(EmulatorFailure::Refused)
        );
    }

    #[test]
    fn test_classify_certificate() {
        assert_eq!(
            classify_failure_message("self signed certificate in certificate chain"),
            Some(EmulatorFailure::UntrustedCertificate)
        );
        assert_eq!(
            classify_failure_message("invalid peer certificate: UnknownIssuer"),
            Some(EmulatorFailure::UntrustedCertificate)
        );
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify_failure_message("Authentication failed"), None);
    }

    #[test]
    fn test_rewrite_only_for_emulator() {
        let err = rewrite_connection_error("ECONNREFUSED", "localhost:10255", false);
        assert!(matches!(err, ConnectionError::ConnectFailed(ref m) if m == "ECONNREFUSED"));

        let err = rewrite_connection_error("ECONNREFUSED", "localhost:10255", true);
        assert!(matches!(err, ConnectionError::EmulatorUnreachable { .. }));
        assert!(err.to_string().contains("localhost:10255"));

        let err = rewrite_connection_error("self-signed certificate", "localhost:10255", true);
        assert!(matches!(err, ConnectionError::EmulatorCertificateUntrusted { .. }));
    }

    #[test]
    fn test_rewrite_passes_unknown_emulator_failure_through() {
        let err = rewrite_connection_error("bad auth", "localhost:10255", true);
        assert_eq!(err.to_string(), "bad auth");
    }

    #[test]
    fn test_error_info_compact_json() {
        let info = ErrorInfo {
            error_type: Some("mongo.command_error".into()),
            code: Some(26),
            name: get_error_name(26),
            message: Some("ns not found".into()),
        };
        let json = info.to_json_compact().unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("NamespaceNotFound"));
    }
}
