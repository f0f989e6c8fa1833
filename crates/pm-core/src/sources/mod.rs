//! Collaborator stores the engine reads postmortem material from.
//!
//! The engine only ever reads through these traits. Filesystem-backed
//! implementations live in [`fs`], in-memory ones in [`memory`].
//!
//! Record shapes are permissive: improvement items may
//! be plain strings or `{ "issue": ... }` objects, check findings may be a
//! string or any JSON value. A single value where a list is expected reads as
//! a one-element list, and `null` as an empty one.

pub mod fs;
pub mod memory;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

pub use fs::FsSources;
pub use memory::MemorySources;

/// Errors raised by collaborator stores.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{store} store unavailable: {message}")]
    Unavailable {
        store: &'static str,
        message: String,
    },
}

/// The tracked deliverable whose postmortem artifacts are analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: String,
    /// Human-readable key used for logging and handoff file matching.
    pub key: String,
}

/// A structured postmortem record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Retrospective {
    #[serde(
        default,
        alias = "what_needs_improvement",
        alias = "improvementItems",
        deserialize_with = "one_or_many"
    )]
    pub improvement_items: Vec<ImprovementItem>,
}

impl Retrospective {
    /// Coerce any JSON document into a retrospective. An object is read as
    /// the record itself; anything else is taken as the improvement items.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(error = %e, "unreadable retrospective record, treating as empty");
                Self::default()
            }),
            other => Self {
                improvement_items: list_from_value(other)
                    .into_iter()
                    .map(|v| serde_json::from_value(v.clone()).unwrap_or(ImprovementItem::Other(v)))
                    .collect(),
            },
        }
    }
}

/// One "what needs improvement" entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImprovementItem {
    Text(String),
    Issue { issue: String },
    Other(serde_json::Value),
}

impl ImprovementItem {
    /// Best-effort text of the item; `None` when nothing usable remains.
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            Self::Text(s) | Self::Issue { issue: s } => s.trim().to_string(),
            Self::Other(value) => value_to_text(value)?,
        };
        (!text.is_empty()).then_some(text)
    }
}

/// A free-text artifact produced when responsibility transfers between stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffDocument {
    pub file_name: String,
    pub content: String,
}

/// The result of an automated verification step that did not pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckFailure {
    #[serde(default)]
    pub findings: serde_json::Value,
    #[serde(default, alias = "checkerName", alias = "sub_agent_code")]
    pub checker_name: String,
}

impl CheckFailure {
    /// Coerce one JSON value into a failure record; a value that is not a
    /// record becomes the findings of an unnamed checker.
    pub fn from_value(value: Value) -> Self {
        if value.is_object() {
            if let Ok(failure) = serde_json::from_value::<CheckFailure>(value.clone()) {
                return failure;
            }
        }
        Self {
            findings: value,
            checker_name: String::new(),
        }
    }

    /// Coerce a check-failure document: a list of records, a single record,
    /// or `null`.
    pub fn list_from_value(value: Value) -> Vec<Self> {
        list_from_value(value)
            .into_iter()
            .map(Self::from_value)
            .collect()
    }

    /// Findings rendered as text; `None` when the findings are empty.
    pub fn findings_text(&self) -> Option<String> {
        value_to_text(&self.findings)
    }
}

/// `null` is empty, an array is its elements, anything else is one element.
fn list_from_value(value: Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    list_from_value(Value::deserialize(deserializer)?)
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(de::Error::custom))
        .collect()
}

fn value_to_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) if items.is_empty() => return None,
        Value::Object(map) if map.is_empty() => return None,
        Value::Object(map) => match map.get("issue").and_then(Value::as_str) {
            Some(issue) => issue.trim().to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Resolves work-unit identifiers to their human-readable keys.
pub trait WorkUnitStore: Send + Sync {
    fn get_work_unit(&self, id: &str) -> Result<Option<WorkUnit>, SourceError>;
}

/// Retrospective records, one per work unit.
pub trait RetrospectiveStore: Send + Sync {
    fn get_retrospective(&self, work_unit_id: &str) -> Result<Option<Retrospective>, SourceError>;
}

/// Handoff documents addressable by work-unit key.
pub trait HandoffStore: Send + Sync {
    /// Documents whose file name contains `work_unit_key`, sorted by file name.
    /// A missing document area yields an empty list.
    fn documents_for(&self, work_unit_key: &str) -> Result<Vec<HandoffDocument>, SourceError>;
}

/// Failed automated-check results.
pub trait CheckFailureStore: Send + Sync {
    fn list_failures(&self, work_unit_id: &str) -> Result<Vec<CheckFailure>, SourceError>;
}

/// The four read-only collaborators an analysis consumes.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub work_units: &'a dyn WorkUnitStore,
    pub retrospectives: &'a dyn RetrospectiveStore,
    pub handoffs: &'a dyn HandoffStore,
    pub check_failures: &'a dyn CheckFailureStore,
}

impl<'a> Collaborators<'a> {
    /// Use one value that implements every collaborator trait.
    pub fn all<S>(sources: &'a S) -> Self
    where
        S: WorkUnitStore + RetrospectiveStore + HandoffStore + CheckFailureStore,
    {
        Self {
            work_units: sources,
            retrospectives: sources,
            handoffs: sources,
            check_failures: sources,
        }
    }
}
