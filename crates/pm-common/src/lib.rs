//! Postmortem pattern common types, IDs, and errors.
//!
//! This crate provides foundational types shared across pm-core modules:
//! - Issue candidates and persisted issue patterns
//! - Pattern and analysis-run identity types
//! - Common error types
//! - Output format specifications

pub mod error;
pub mod id;
pub mod issue;
pub mod output;
pub mod schema;

pub use error::{Error, Result};
pub use id::{PatternId, RunId};
pub use issue::{
    Category, IssueCandidate, IssuePattern, IssueSource, PatternStatus, Severity, Trend,
};
pub use output::OutputFormat;
pub use schema::SCHEMA_VERSION;
