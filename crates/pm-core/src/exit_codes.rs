//! Exit codes for the pm-core CLI.
//!
//! Exit codes communicate the outcome without requiring output parsing and
//! are stable across releases.

use pm_common::Error;

/// Exit codes for pm-core operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean / nothing to report
    Clean = 0,

    /// Analysis matched or created patterns
    Findings = 1,

    /// Configuration error
    ConfigError = 10,

    /// Collaborator store error
    SourceError = 11,

    /// Pattern catalog error
    CatalogError = 12,

    /// I/O error
    IoError = 13,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::Findings)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Exit code for an error, by its code group.
    pub fn for_error(err: &Error) -> Self {
        match err.code() {
            10..=19 => ExitCode::ConfigError,
            20..=29 => ExitCode::SourceError,
            30..=39 => ExitCode::CatalogError,
            60..=69 => ExitCode::IoError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findings_are_success() {
        assert!(ExitCode::Findings.is_success());
        assert!(!ExitCode::Findings.is_error());
        assert!(ExitCode::CatalogError.is_error());
    }

    #[test]
    fn errors_map_by_group() {
        assert_eq!(
            ExitCode::for_error(&Error::InvalidConfig("x".into())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::for_error(&Error::MalformedRecord("x".into())),
            ExitCode::SourceError
        );
        assert_eq!(
            ExitCode::for_error(&Error::PatternNotFound {
                pattern_id: "PAT-009".into()
            }),
            ExitCode::CatalogError
        );
        assert_eq!(
            ExitCode::for_error(&Error::Analysis("x".into())),
            ExitCode::InternalError
        );
        assert_eq!(i32::from(ExitCode::IoError), 13);
    }
}
