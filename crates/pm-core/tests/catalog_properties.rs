//! Property-based tests for pattern id allocation.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use pm_common::{Category, PatternId, Severity};
use pm_core::catalog::{CreateOutcome, MemoryCatalog, NewPattern, PatternStore};
use pm_core::similarity::fingerprint;
use proptest::prelude::*;

fn new_pattern(summary: &str) -> NewPattern {
    NewPattern {
        category: Category::General,
        issue_summary: summary.to_string(),
        occurrence_count: 2,
        first_seen_work_unit_id: "wu-1".into(),
        last_seen_work_unit_id: "wu-2".into(),
        severity: Severity::Medium,
    }
}

// Small alphabet so the same summary comes up more than once.
fn summary() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-d]{1,2}", 1..3).prop_map(|words| words.join(" "))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn created_ids_are_contiguous_and_increasing(summaries in prop::collection::vec(summary(), 1..40)) {
        let store = MemoryCatalog::new();
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut by_fingerprint: HashMap<String, PatternId> = HashMap::new();
        let mut created = Vec::new();

        for text in &summaries {
            match store.create_if_absent(new_pattern(text), now).unwrap() {
                CreateOutcome::Created(p) => {
                    prop_assert!(by_fingerprint.insert(fingerprint(text), p.pattern_id).is_none());
                    created.push(p.pattern_id);
                }
                CreateOutcome::Existing(p) => {
                    prop_assert_eq!(by_fingerprint.get(&fingerprint(text)), Some(&p.pattern_id));
                }
            }
        }

        let numbers: Vec<u32> = created.iter().map(PatternId::number).collect();
        let expected: Vec<u32> = (1..=created.len() as u32).collect();
        prop_assert_eq!(numbers, expected);
        for pair in created.windows(2) {
            prop_assert!(pair[0] < pair[1]);
            prop_assert_eq!(pair[0].next(), pair[1]);
        }

        let listed: Vec<PatternId> = store.list_all().unwrap().iter().map(|p| p.pattern_id).collect();
        prop_assert_eq!(listed, created);
    }

    #[test]
    fn rendered_ids_parse_back_and_keep_order(a in 1u32..5000, b in 1u32..5000) {
        let (x, y) = (PatternId::from_number(a).unwrap(), PatternId::from_number(b).unwrap());
        let (sx, sy) = (x.to_string(), y.to_string());
        prop_assert!(sx.starts_with("PAT-"));
        prop_assert!(sx.len() >= "PAT-001".len());
        prop_assert_eq!(PatternId::parse(&sx), Some(x));
        if a < 1000 && b < 1000 {
            // Fixed-width ids sort the same as text and as numbers.
            prop_assert_eq!(sx.cmp(&sy), x.cmp(&y));
        }
    }
}
