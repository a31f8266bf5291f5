//! Error types for the converter.
//!
//! Fatal failures abort a conversion and surface here. Recoverable
//! conditions (unsupported kinds, unresolved names) are reported as
//! [`crate::convert::Warning`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for conversion operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input file does not exist or is not a regular file
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Caller supplied something unusable (bad output location, bad options)
    #[error("Invalid input: {0}")]
    UserInput(String),

    /// Malformed MJCF document or attribute value
    #[error("MJCF parse error: {0}")]
    Parse(String),

    /// Expected layer, library entry or reference missing while authoring
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Mesh asset could not be decoded
    #[error("Mesh error ({path}): {message}")]
    Mesh { path: PathBuf, message: String },

    /// XML tokenizer error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Options file error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an integrity error.
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// Create a mesh decode error.
    pub fn mesh(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Mesh { path: path.into(), message: msg.into() }
    }

    /// True for errors caused by the caller's input rather than the converter.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::InputNotFound(_) | Self::UserInput(_) | Self::Parse(_) | Self::Xml(_) | Self::Json(_)
        )
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Result type alias for converter operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::integrity("mesh 'arm' not found in library");
        assert!(e.to_string().contains("arm"));

        let e = Error::mesh("robot/arm.ply", "unsupported mesh format");
        assert!(e.to_string().contains("arm.ply"));
        assert!(e.to_string().contains("unsupported"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_user_input());
    }

    #[test]
    fn test_user_input_family() {
        assert!(Error::InputNotFound(PathBuf::from("missing.xml")).is_user_input());
        assert!(Error::parse("bad float").is_user_input());
        assert!(!Error::integrity("x").is_user_input());
    }
}
