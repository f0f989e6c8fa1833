//! Version stamp of the documents written under the data directory.
//!
//! `catalog/patterns.json`, `catalog/history.json`, and the JSON report all
//! carry `schema_version`. Readers accept any document with the same major
//! version: minor bumps only add optional fields, which serde defaults.

/// Version written into every persisted document and JSON report.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Major component of a `MAJOR.MINOR.PATCH` version, if it parses.
pub fn major(version: &str) -> Option<u32> {
    version.split('.').next()?.trim().parse().ok()
}

/// Whether a document stamped `version` can be read by this build.
///
/// Unparseable stamps are never compatible.
pub fn is_compatible(version: &str) -> bool {
    match (major(version), major(SCHEMA_VERSION)) {
        (Some(found), Some(current)) => found == current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_written_by_a_later_minor_release_is_readable() {
        assert!(is_compatible(SCHEMA_VERSION));
        assert!(is_compatible("1.3.0"));
        assert!(is_compatible("1"));
    }

    #[test]
    fn catalog_from_another_major_is_rejected() {
        assert!(!is_compatible("0.9.0"));
        assert!(!is_compatible("2.0.0"));
    }

    #[test]
    fn malformed_stamp_is_rejected() {
        assert_eq!(major("v1.0.0"), None);
        assert!(!is_compatible(""));
        assert!(!is_compatible("garbage"));
        assert!(!is_compatible("v1.0.0"));
    }
}
