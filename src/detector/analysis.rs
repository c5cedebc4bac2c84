//! Batch analysis over a finished series and online checks per tick.

use super::{classify, Anomaly, Baseline, BaselineScope, Metric, ThresholdPolicy};
use crate::config::{DetectionConfig, DetectionRule};
use crate::series::Sample;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// One rule evaluated over one scope.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub metric: Metric,
    pub policy: ThresholdPolicy,
    pub scope: BaselineScope,
    pub baseline: Option<Baseline>,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub sample_count: usize,
    pub outcomes: Vec<RuleOutcome>,
}

/// Per-outcome counts for logs and summaries.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub metric: Metric,
    pub scope: BaselineScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Baseline>,
    pub anomalies: usize,
}

impl AnalysisReport {
    /// All anomalies in originating sample order. The same sample flagged
    /// for the same metric and direction by several rules appears once,
    /// carrying the bounds, mode and scope of the first rule (in rule
    /// order, full scope before filtered) that flagged it. Per-rule results
    /// stay in `outcomes`.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        let mut all: Vec<&Anomaly> = self.outcomes.iter().flat_map(|o| &o.anomalies).collect();
        all.sort_by_key(|a| a.sample_index);
        let mut seen = HashSet::new();
        all.into_iter()
            .filter(|a| seen.insert((a.sample_index, a.metric, a.direction)))
            .cloned()
            .collect()
    }

    pub fn summaries(&self) -> Vec<OutcomeSummary> {
        self.outcomes
            .iter()
            .map(|o| OutcomeSummary {
                metric: o.metric,
                scope: o.scope,
                baseline: o.baseline,
                anomalies: o.anomalies.len(),
            })
            .collect()
    }
}

/// Applies the configured rules. Holds no statistics between calls, so
/// filtered and unfiltered baselines are always computed independently.
pub struct AnomalyDetector {
    config: DetectionConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    fn scopes(&self, rule: &DetectionRule) -> Vec<BaselineScope> {
        let mut scopes = vec![BaselineScope::Full];
        if let (Some(window), ThresholdPolicy::Statistical { .. }) =
            (self.config.business_hours, rule.policy)
        {
            scopes.push(BaselineScope::Filtered(window));
        }
        scopes
    }

    pub fn analyze(&self, series: &[Sample]) -> AnalysisReport {
        let mut outcomes = Vec::new();
        for rule in &self.config.rules {
            for scope in self.scopes(rule) {
                let detection = classify(series, rule.metric, &rule.policy, scope);
                debug!(
                    metric = %rule.metric,
                    scope = ?scope,
                    anomalies = detection.anomalies.len(),
                    "rule evaluated"
                );
                outcomes.push(RuleOutcome {
                    metric: rule.metric,
                    policy: rule.policy,
                    scope,
                    baseline: detection.baseline,
                    anomalies: detection.anomalies,
                });
            }
        }
        AnalysisReport {
            sample_count: series.len(),
            outcomes,
        }
    }

    /// Online check: analyze `snapshot` (a fixed-length view of a live
    /// series) and keep only anomalies on its newest sample.
    pub fn newest_anomalies(&self, snapshot: &[Sample]) -> Vec<Anomaly> {
        let Some(newest) = snapshot.len().checked_sub(1) else {
            return Vec::new();
        };
        let mut report = self.analyze(snapshot);
        for o in &mut report.outcomes {
            o.anomalies.retain(|a| a.sample_index == newest);
        }
        report.anomalies()
    }
}
