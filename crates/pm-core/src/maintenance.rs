//! Catalog maintenance: duplicate consolidation and data-quality audit.

use std::collections::{BTreeMap, HashMap};

use pm_common::{Category, IssuePattern, PatternId, PatternStatus, Severity};
use serde::Serialize;
use tracing::info;

use crate::catalog::{CatalogError, PatternStore, PatternUpdate};
use crate::similarity::fingerprint;

/// Patterns seen at least this often should carry a proven solution.
pub const HIGH_FREQUENCY_OCCURRENCES: u32 = 3;

/// One group of same-fingerprint patterns folded into its oldest member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedGroup {
    pub canonical: PatternId,
    pub obsoleted: Vec<PatternId>,
    pub occurrence_count: u32,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsolidationReport {
    pub groups_merged: usize,
    pub patterns_obsoleted: usize,
    pub dry_run: bool,
    pub groups: Vec<MergedGroup>,
}

/// Fold active patterns that share a summary fingerprint into the oldest
/// (lowest id) one. The canonical pattern takes the summed count, the highest
/// severity, the union of proven solutions, and the latest `updated_at` with
/// its `last_seen_work_unit_id`. The rest are marked obsolete, never removed.
pub fn consolidate_duplicates(
    store: &dyn PatternStore,
    dry_run: bool,
) -> Result<ConsolidationReport, CatalogError> {
    let mut groups: BTreeMap<PatternId, Vec<IssuePattern>> = BTreeMap::new();
    let mut canonical_by_key: HashMap<String, PatternId> = HashMap::new();

    let mut active = store.list_active()?;
    active.sort_by_key(|p| p.pattern_id);
    for pattern in active {
        let key = fingerprint(&pattern.issue_summary);
        let canonical = *canonical_by_key.entry(key).or_insert(pattern.pattern_id);
        groups.entry(canonical).or_default().push(pattern);
    }

    let mut report = ConsolidationReport {
        dry_run,
        ..Default::default()
    };

    for (canonical_id, members) in groups {
        if members.len() < 2 {
            continue;
        }
        let merged = merge_group(canonical_id, &members);

        if !dry_run {
            store.update(canonical_id, &merged.update)?;
            for id in &merged.group.obsoleted {
                store.update(
                    *id,
                    &PatternUpdate {
                        status: Some(PatternStatus::Obsolete),
                        ..Default::default()
                    },
                )?;
            }
        }
        info!(
            pattern_id = %canonical_id,
            duplicates = merged.group.obsoleted.len(),
            count = merged.group.occurrence_count,
            dry_run,
            "consolidated duplicate patterns"
        );

        report.groups_merged += 1;
        report.patterns_obsoleted += merged.group.obsoleted.len();
        report.groups.push(merged.group);
    }

    Ok(report)
}

struct Merge {
    group: MergedGroup,
    update: PatternUpdate,
}

fn merge_group(canonical_id: PatternId, members: &[IssuePattern]) -> Merge {
    let occurrence_count = members
        .iter()
        .fold(0u32, |acc, p| acc.saturating_add(p.occurrence_count));
    let severity = members
        .iter()
        .map(|p| p.severity)
        .max_by_key(Severity::rank)
        .unwrap_or(Severity::Low);

    let mut solutions: Vec<String> = Vec::new();
    for solution in members.iter().flat_map(|p| &p.proven_solutions) {
        if !solutions.contains(solution) {
            solutions.push(solution.clone());
        }
    }

    let latest = members.iter().max_by_key(|p| p.updated_at);

    Merge {
        group: MergedGroup {
            canonical: canonical_id,
            obsoleted: members
                .iter()
                .map(|p| p.pattern_id)
                .filter(|id| *id != canonical_id)
                .collect(),
            occurrence_count,
            severity,
        },
        update: PatternUpdate {
            occurrence_count: Some(occurrence_count.max(1)),
            severity: Some(severity),
            proven_solutions: Some(solutions),
            last_seen_work_unit_id: latest.map(|p| p.last_seen_work_unit_id.clone()),
            updated_at: latest.map(|p| p.updated_at),
            ..Default::default()
        },
    }
}

/// Data-quality summary of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogAudit {
    pub total: usize,
    pub active: usize,
    pub obsolete: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
    /// Active patterns seen often that still have no proven solution.
    pub missing_solutions: Vec<PatternId>,
}

pub fn audit(patterns: &[IssuePattern]) -> CatalogAudit {
    let mut report = CatalogAudit {
        total: patterns.len(),
        ..Default::default()
    };
    for category in Category::ALL {
        report.by_category.insert(category.to_string(), 0);
    }

    for pattern in patterns {
        if pattern.status.is_active() {
            report.active += 1;
        } else {
            report.obsolete += 1;
        }
        *report
            .by_category
            .entry(pattern.category.to_string())
            .or_default() += 1;
        *report
            .by_severity
            .entry(pattern.severity.to_string())
            .or_default() += 1;

        if pattern.status.is_active()
            && pattern.occurrence_count >= HIGH_FREQUENCY_OCCURRENCES
            && pattern.proven_solutions.is_empty()
        {
            report.missing_solutions.push(pattern.pattern_id);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use chrono::{Duration, TimeZone, Utc};
    use pm_common::Trend;

    fn pattern(n: u32, summary: &str, count: u32, severity: Severity, age: i64) -> IssuePattern {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        IssuePattern {
            pattern_id: PatternId::from_number(n).unwrap(),
            category: Category::Database,
            issue_summary: summary.into(),
            occurrence_count: count,
            first_seen_work_unit_id: format!("wu-{n}"),
            last_seen_work_unit_id: format!("wu-{n}"),
            severity,
            proven_solutions: vec![],
            status: PatternStatus::Active,
            trend: Trend::Stable,
            created_at: t0 - Duration::days(age),
            updated_at: t0 - Duration::days(age),
        }
    }

    fn seeded() -> MemoryCatalog {
        let mut a = pattern(1, "schema drift on ventures table", 2, Severity::Medium, 10);
        a.proven_solutions = vec!["diff schema before migrating".into()];
        let mut c = pattern(3, "Ventures TABLE schema drift on", 3, Severity::High, 2);
        c.proven_solutions = vec![
            "diff schema before migrating".into(),
            "pin migration order".into(),
        ];
        MemoryCatalog::with_patterns(vec![
            a,
            pattern(2, "flaky login test", 4, Severity::Low, 1),
            c,
        ])
        .unwrap()
    }

    #[test]
    fn merges_into_oldest_and_obsoletes_rest() {
        let catalog = seeded();
        let report = consolidate_duplicates(&catalog, false).unwrap();
        assert_eq!(report.groups_merged, 1);
        assert_eq!(report.patterns_obsoleted, 1);

        let canonical = catalog.get(PatternId::first()).unwrap().unwrap();
        assert_eq!(canonical.occurrence_count, 5);
        assert_eq!(canonical.severity, Severity::High);
        assert_eq!(
            canonical.proven_solutions,
            vec!["diff schema before migrating", "pin migration order"]
        );
        assert_eq!(canonical.last_seen_work_unit_id, "wu-3");
        assert_eq!(canonical.issue_summary, "schema drift on ventures table");

        let dup = catalog
            .get(PatternId::from_number(3).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(dup.status, PatternStatus::Obsolete);
        assert_eq!(catalog.list_all().unwrap().len(), 3);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let catalog = seeded();
        let before = catalog.list_all().unwrap();
        let report = consolidate_duplicates(&catalog, true).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.groups[0].occurrence_count, 5);
        assert_eq!(catalog.list_all().unwrap(), before);
    }

    #[test]
    fn audit_counts_and_flags() {
        let mut patterns = vec![
            pattern(1, "a", 5, Severity::High, 0),
            pattern(2, "b", 1, Severity::Low, 0),
            pattern(3, "c", 7, Severity::High, 0),
        ];
        patterns[2].status = PatternStatus::Obsolete;

        let report = audit(&patterns);
        assert_eq!(report.total, 3);
        assert_eq!(report.active, 2);
        assert_eq!(report.obsolete, 1);
        assert_eq!(report.by_category["database"], 3);
        assert_eq!(report.by_category["security"], 0);
        assert_eq!(report.by_severity["high"], 2);
        assert_eq!(report.missing_solutions, vec![PatternId::first()]);
    }
}
