//! Issue candidates and persisted issue patterns.
//!
//! An [`IssueCandidate`] is produced fresh on every analysis and is never
//! persisted directly. An [`IssuePattern`] is the unit of long-term state:
//! a named cluster of recurring issue statements with lifecycle metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::id::PatternId;

/// Where a candidate issue statement was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSource {
    /// "What needs improvement" item of a retrospective record.
    Retrospective,
    /// Bullet of a "Known Issues" block in a handoff document.
    HandoffDoc,
    /// Findings of a failed automated check.
    CheckFailure,
}

impl fmt::Display for IssueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrospective => write!(f, "retrospective"),
            Self::HandoffDoc => write!(f, "handoff_doc"),
            Self::CheckFailure => write!(f, "check_failure"),
        }
    }
}

/// A raw issue statement pulled from one of the postmortem sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCandidate {
    pub source: IssueSource,
    /// `challenge`, `known_issue`, or `verification_failure`.
    pub kind: String,
    pub description: String,
    pub work_unit_id: String,
    pub work_unit_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_agent: Option<String>,
}

impl IssueCandidate {
    pub const KIND_CHALLENGE: &'static str = "challenge";
    pub const KIND_KNOWN_ISSUE: &'static str = "known_issue";
    pub const KIND_VERIFICATION_FAILURE: &'static str = "verification_failure";
}

/// Pattern category assigned by the keyword categorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Database,
    Testing,
    Build,
    Deployment,
    CodeStructure,
    Security,
    Protocol,
    General,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Database,
        Category::Testing,
        Category::Build,
        Category::Deployment,
        Category::CodeStructure,
        Category::Security,
        Category::Protocol,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Testing => "testing",
            Self::Build => "build",
            Self::Deployment => "deployment",
            Self::CodeStructure => "code_structure",
            Self::Security => "security",
            Self::Protocol => "protocol",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Severity assigned by the keyword assessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Ordering weight; higher is more severe.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pattern status. Automatic transitions only go `Active -> Obsolete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    #[default]
    Active,
    Obsolete,
}

impl PatternStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Obsolete => write!(f, "obsolete"),
        }
    }
}

/// Recency-driven trend of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    #[default]
    Stable,
    Decreasing,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Increasing => write!(f, "increasing"),
            Self::Stable => write!(f, "stable"),
            Self::Decreasing => write!(f, "decreasing"),
        }
    }
}

/// A persisted, named cluster of recurring issue statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePattern {
    pub pattern_id: PatternId,
    pub category: Category,
    /// Representative description; set once at creation.
    pub issue_summary: String,
    /// Always >= 1.
    pub occurrence_count: u32,
    pub first_seen_work_unit_id: String,
    pub last_seen_work_unit_id: String,
    pub severity: Severity,
    /// Curated externally; empty at creation.
    #[serde(default)]
    pub proven_solutions: Vec<String>,
    #[serde(default)]
    pub status: PatternStatus,
    #[serde(default)]
    pub trend: Trend,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssuePattern {
    /// Whole and fractional days elapsed since the last update.
    pub fn days_since_update(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = now.signed_duration_since(self.updated_at);
        elapsed.num_milliseconds() as f64 / 86_400_000.0
    }
}
