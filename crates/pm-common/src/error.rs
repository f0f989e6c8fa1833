//! Error types for postmortem pattern analysis.

use thiserror::Error;

/// Result type alias for postmortem pattern operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type shared across the workspace.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Source errors (20-29)
    #[error("source store failed: {0}")]
    Source(String),

    #[error("malformed source record: {0}")]
    MalformedRecord(String),

    // Catalog errors (30-39)
    #[error("pattern catalog failed: {0}")]
    Catalog(String),

    #[error("pattern not found: {pattern_id}")]
    PatternNotFound { pattern_id: String },

    #[error("invalid pattern id: {0}")]
    InvalidPatternId(String),

    // Analysis errors (40-49)
    #[error("analysis failed: {0}")]
    Analysis(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::Source(_) => 20,
            Error::MalformedRecord(_) => 21,
            Error::Catalog(_) => 30,
            Error::PatternNotFound { .. } => 31,
            Error::InvalidPatternId(_) => 32,
            Error::Analysis(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped_by_concern() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(Error::Source("x".into()).code(), 20);
        assert_eq!(
            Error::PatternNotFound {
                pattern_id: "PAT-001".into()
            }
            .code(),
            31
        );
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(Error::from(io).code(), 60);
    }

    #[test]
    fn pattern_not_found_message_names_id() {
        let err = Error::PatternNotFound {
            pattern_id: "PAT-014".into(),
        };
        assert_eq!(err.to_string(), "pattern not found: PAT-014");
    }
}
