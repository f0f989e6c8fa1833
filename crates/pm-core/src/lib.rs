//! Postmortem pattern detection and lifecycle engine.
//!
//! Analysis of a finished work unit proceeds in stages:
//! - Extract issue candidates from retrospectives, handoff documents and
//!   failed checks
//! - Match candidates against the pattern catalog by token-set similarity
//! - Promote recurring unmatched candidates to new patterns
//! - Sweep trend and status over the active catalog
//! - Group this run's candidates into prevention opportunities
//!
//! Surfacing, related-pattern lookup and catalog maintenance operate on the
//! same catalog outside of analysis.

pub mod analyze;
pub mod catalog;
pub mod classify;
pub mod cli;
pub mod exit_codes;
pub mod extract;
pub mod lifecycle;
pub mod logging;
pub mod maintenance;
pub mod prevention;
pub mod similarity;
pub mod sources;
pub mod surface;
pub mod trend;

pub use analyze::{AnalysisError, AnalysisResult, Analyzer};
pub use catalog::{
    CandidateHistory, CatalogError, FileCatalog, FileHistory, MemoryCatalog, MemoryHistory,
    PatternStore,
};
pub use classify::{assess_severity, categorize, Classifier};
pub use exit_codes::ExitCode;
pub use extract::IssueExtractor;
pub use lifecycle::{PatternCountUpdate, PatternLifecycleManager};
pub use prevention::PreventionOpportunity;
pub use similarity::{similarity, SimilarityMatcher};
pub use sources::{Collaborators, FsSources, MemorySources};
pub use surface::{related_patterns, surface_patterns};
