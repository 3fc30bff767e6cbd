//! Error types for the preference engine.
//!
//! Only invalid input is meant to reach callers as an `Err`. Storage problems
//! are folded into [`crate::degrade::Degradable`] by the store and updater.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefsError {
    /// Missing or malformed input at the API boundary
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A swipe arrived without any usable tags
    #[error("No tags to learn from")]
    EmptyTags,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The temp file could not be renamed over the canonical record
    #[error("Failed to persist profile: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Could not acquire lock {} after {attempts} attempts", path.display())]
    LockTimeout { path: PathBuf, attempts: u32 },

    #[error("Unsupported profile version: {0}")]
    UnsupportedVersion(String),

    /// Raised by upstream tag extractors; never escapes `FallbackExtractor`
    #[error("Tag extraction failed: {0}")]
    Extraction(String),
}

pub type Result<T> = std::result::Result<T, PrefsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_message_names_the_marker() {
        let err = PrefsError::LockTimeout {
            path: PathBuf::from("/tmp/alice_preferences.json.lock"),
            attempts: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("alice_preferences.json.lock"));
        assert!(msg.contains("10 attempts"));
    }

    #[test]
    fn io_errors_convert() {
        let err: PrefsError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PrefsError::Io(_)));
    }
}
