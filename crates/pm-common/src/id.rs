//! Pattern and analysis-run identity types.
//!
//! Pattern ids are human-readable and monotonically numbered. The numeric
//! suffix is never reused; gaps are allowed.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Prefix carried by every pattern id.
pub const PATTERN_ID_PREFIX: &str = "PAT-";

/// Minimum width of the zero-padded numeric suffix.
pub const PATTERN_ID_WIDTH: usize = 3;

/// Pattern ID.
///
/// Format: `PAT-<n>` with `n` zero-padded to at least three digits.
/// Example: `PAT-014`, `PAT-1203`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(u32);

impl PatternId {
    /// The id assigned when the catalog holds no patterns yet.
    pub fn first() -> Self {
        PatternId(1)
    }

    /// Build from a raw numeric suffix. Zero is not a valid suffix.
    pub fn from_number(number: u32) -> Option<Self> {
        (number > 0).then_some(PatternId(number))
    }

    /// Numeric suffix of this id.
    pub fn number(&self) -> u32 {
        self.0
    }

    /// Successor id (suffix + 1).
    pub fn next(&self) -> Self {
        PatternId(self.0.saturating_add(1))
    }

    /// Parse a `PAT-NNN` string.
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.strip_prefix(PATTERN_ID_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u32>().ok().and_then(Self::from_number)
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            PATTERN_ID_PREFIX,
            self.0,
            width = PATTERN_ID_WIDTH
        )
    }
}

impl FromStr for PatternId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidPatternId(s.to_string()))
    }
}

impl Serialize for PatternId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PatternId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid pattern id: {raw}")))
    }
}

/// Run ID for tracking a single analysis.
///
/// Format: `run-<date>-<time>-<random>`
/// Example: `run-20260115-143022-abc123`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let random: String = uuid::Uuid::new_v4()
            .to_string()
            .chars()
            .take(6)
            .collect();
        RunId(format!("run-{}-{}", now.format("%Y%m%d-%H%M%S"), random))
    }

    /// Parse an existing run ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.starts_with("run-") && s.len() > 19 {
            Some(RunId(s.to_string()))
        } else {
            None
        }
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
