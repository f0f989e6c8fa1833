//! Same-run prevention opportunities.
//!
//! When one analysis turns up several candidates of the same category, that
//! category gets a concrete suggestion. This looks only at the current run,
//! never at the catalog.

use std::collections::BTreeMap;

use pm_common::{Category, IssueCandidate};
use serde::{Deserialize, Serialize};

use crate::classify::Classifier;

/// Priority of every emitted opportunity.
pub const PRIORITY_HIGH: &str = "high";

/// Suggestion for categories without a dedicated entry.
pub const FALLBACK_SUGGESTION: &str = "document pattern and add to troubleshooting guide";

static SUGGESTIONS: &[(Category, &str)] = &[
    (
        Category::Database,
        "add schema verification to the pre-implementation checklist",
    ),
    (
        Category::Testing,
        "run the affected test suite before handoff and track flaky specs",
    ),
    (
        Category::Build,
        "add a build check to the pre-handoff verification steps",
    ),
    (
        Category::Deployment,
        "add a pipeline dry run before deployment",
    ),
    (
        Category::CodeStructure,
        "verify component locations and import paths before implementation",
    ),
    (
        Category::Security,
        "review auth and RLS policies during planning",
    ),
    (
        Category::Protocol,
        "enforce sub-agent invocation in the workflow checklist",
    ),
];

/// Advice for a category.
pub fn suggestion_for(category: Category) -> &'static str {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, s)| *s)
        .unwrap_or(FALLBACK_SUGGESTION)
}

/// A category that recurred within one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreventionOpportunity {
    pub category: Category,
    pub issue_count: usize,
    pub suggestion: String,
    pub priority: String,
}

/// Group `candidates` by category and emit one opportunity for each category
/// with at least `min_issues` members, in category order.
pub fn identify(
    candidates: &[IssueCandidate],
    classifier: &Classifier,
    min_issues: usize,
) -> Vec<PreventionOpportunity> {
    let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
    for candidate in candidates {
        *counts
            .entry(classifier.categorize(&candidate.description))
            .or_default() += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count >= min_issues.max(1))
        .map(|(category, issue_count)| PreventionOpportunity {
            category,
            issue_count,
            suggestion: suggestion_for(category).to_string(),
            priority: PRIORITY_HIGH.to_string(),
        })
        .collect()
}
