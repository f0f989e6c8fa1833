//! Recency-driven trend and status classification.
//!
//! Both labels depend only on how long ago a pattern was last updated, not on
//! whether it matched anything in the current run.

use chrono::{DateTime, Utc};
use pm_common::{PatternId, PatternStatus, Trend};
use pm_config::LifecycleConfig;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{CatalogError, PatternStore, PatternUpdate};

/// Trend for a pattern idle for `days`.
pub fn classify_trend(days: f64, config: &LifecycleConfig) -> Trend {
    if days > config.decreasing_after_days {
        Trend::Decreasing
    } else if days < config.increasing_within_days {
        Trend::Increasing
    } else {
        Trend::Stable
    }
}

/// Status for a pattern idle for `days`.
pub fn classify_status(days: f64, config: &LifecycleConfig) -> PatternStatus {
    if days > config.obsolete_threshold_days {
        PatternStatus::Obsolete
    } else {
        PatternStatus::Active
    }
}

/// Outcome of one sweep over the active catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub patterns_swept: usize,
    pub trend_changes: usize,
    pub newly_obsolete: Vec<PatternId>,
}

/// Rewrites trend and status of every active pattern.
#[derive(Debug, Clone)]
pub struct TrendClassifier {
    config: LifecycleConfig,
}

impl TrendClassifier {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    /// Classify every active pattern and write both labels back, changed or
    /// not. `updated_at` is left alone. A store failure stops the sweep;
    /// patterns already written stay written.
    pub fn sweep(
        &self,
        store: &dyn PatternStore,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, CatalogError> {
        let mut report = SweepReport::default();

        for pattern in store.list_active()? {
            let days = pattern.days_since_update(now);
            let trend = classify_trend(days, &self.config);
            let status = classify_status(days, &self.config);

            store.update(
                pattern.pattern_id,
                &PatternUpdate {
                    trend: Some(trend),
                    status: Some(status),
                    ..Default::default()
                },
            )?;

            report.patterns_swept += 1;
            if trend != pattern.trend {
                report.trend_changes += 1;
                debug!(
                    pattern_id = %pattern.pattern_id,
                    from = %pattern.trend,
                    to = %trend,
                    days,
                    "trend changed"
                );
            }
            if !status.is_active() {
                info!(pattern_id = %pattern.pattern_id, days, "pattern marked obsolete");
                report.newly_obsolete.push(pattern.pattern_id);
            }
        }

        Ok(report)
    }
}
