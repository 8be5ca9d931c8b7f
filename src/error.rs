use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

/// Failure reported by the remote store boundary (network loss, disconnect,
/// rejected write). Carries only a human-readable message — the engine never
/// retries, so there is no transient/permanent classification to act on.
#[derive(Debug, Clone)]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Remote store unavailable: {}", self.message)
    }
}

impl std::error::Error for RemoteError {}

// ---------------------------------------------------------------------------
// EngineError — top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Key already exists: {collection}/{key}")]
    DuplicateKey { collection: String, key: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Invalid mutation: {0}")]
    Validation(String),
}

impl EngineError {
    pub fn duplicate_key(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            collection: collection.into(),
            key: key.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Convenience alias — the default error type is `EngineError`.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_display() {
        let e = EngineError::duplicate_key("students", "ST-042");
        assert_eq!(e.to_string(), "Key already exists: students/ST-042");
    }

    #[test]
    fn remote_error_display() {
        let e = RemoteError::new("connection reset");
        let msg = e.to_string();
        assert!(msg.contains("unavailable"), "prefix missing: {msg}");
        assert!(msg.contains("connection reset"), "message missing: {msg}");
    }

    #[test]
    fn engine_error_from_remote_error() {
        let e: EngineError = RemoteError::new("timeout").into();
        assert!(matches!(e, EngineError::Remote(_)));
    }

    #[test]
    fn validation_display() {
        let e = EngineError::validation("unknown field path: x");
        assert!(e.to_string().contains("unknown field path"));
    }
}
