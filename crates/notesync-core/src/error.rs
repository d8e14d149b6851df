use thiserror::Error;

/// Core error types for notesync.
///
/// Every fallible operation in the workspace returns this type. Background
/// tasks (debounce flushes, presence writes) log these instead of panicking.
///
/// # Examples
///
/// ```
/// use notesync_core::error::{Result, SyncError};
///
/// fn require_id(id: &str) -> Result<()> {
///     if id.is_empty() {
///         return Err(SyncError::InvalidPath("empty document id".into()));
///     }
///     Ok(())
/// }
///
/// assert!(require_id("").is_err());
/// ```
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("remote write failed for {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid payload for {path}: {source}")]
    InvalidPayload {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid document path: {0}")]
    InvalidPath(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("session closed: {0}")]
    SessionClosed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for `Result<T, SyncError>`.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_failed_display() {
        let error = SyncError::WriteFailed {
            path: "notes/shared_note".into(),
            reason: "unavailable".into(),
        };
        assert_eq!(
            error.to_string(),
            "remote write failed for notes/shared_note: unavailable"
        );
    }

    #[test]
    fn test_invalid_path_display() {
        let error = SyncError::InvalidPath("a/b/c".into());
        assert_eq!(error.to_string(), "invalid document path: a/b/c");
    }

    #[test]
    fn test_invalid_payload_keeps_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = SyncError::InvalidPayload {
            path: "notes/x".into(),
            source: json_err,
        };
        assert!(error.to_string().starts_with("invalid payload for notes/x"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: SyncError = io_err.into();
        assert!(error.to_string().contains("I/O error"));
    }

    #[test]
    fn test_session_closed() {
        let error = SyncError::SessionClosed("notes/shared_note".into());
        assert_eq!(error.to_string(), "session closed: notes/shared_note");
    }
}
