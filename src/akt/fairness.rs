//! Per-group outcome aggregation and disparity reporting.
//!
//! Rolling means keyed by (exam, subject, group). Groups under the minimum
//! sample count stay out of the disparity computation but still appear in
//! the report with their raw counts.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::akt::config::FairnessParams;
use crate::akt::types::{FairnessReport, GroupOutcome};

#[derive(Debug, Clone, Default)]
struct GroupStat {
    mean: f64,
    count: u64,
}

impl GroupStat {
    fn record(&mut self, outcome: f64) {
        self.count += 1;
        self.mean += (outcome - self.mean) / self.count as f64;
    }
}

pub struct FairnessMonitor {
    params: FairnessParams,
    snapshots: RwLock<HashMap<(String, String), HashMap<String, GroupStat>>>,
}

impl FairnessMonitor {
    pub fn new(params: FairnessParams) -> Self {
        Self {
            params,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, exam_code: &str, subject: &str, group: &str, outcome: f64) {
        let mut snapshots = self.snapshots.write();
        snapshots
            .entry((exam_code.to_string(), subject.to_string()))
            .or_default()
            .entry(group.to_string())
            .or_default()
            .record(outcome.clamp(0.0, 1.0));
    }

    pub fn report(&self, exam_code: &str, subject: &str) -> FairnessReport {
        let snapshots = self.snapshots.read();
        let mut groups: Vec<GroupOutcome> = snapshots
            .get(&(exam_code.to_string(), subject.to_string()))
            .map(|stats| {
                stats
                    .iter()
                    .map(|(group, stat)| GroupOutcome {
                        group: group.clone(),
                        average: stat.mean,
                        samples: stat.count,
                        included: stat.count >= self.params.min_group_samples,
                    })
                    .collect()
            })
            .unwrap_or_default();
        groups.sort_by(|a, b| a.group.cmp(&b.group));

        let included: Vec<&GroupOutcome> = groups.iter().filter(|g| g.included).collect();
        let disparity = if included.len() >= 2 {
            let max = included.iter().map(|g| g.average).fold(f64::MIN, f64::max);
            let min = included.iter().map(|g| g.average).fold(f64::MAX, f64::min);
            max - min
        } else {
            0.0
        };

        FairnessReport {
            exam_code: exam_code.to_string(),
            subject: subject.to_string(),
            groups,
            disparity,
            flagged: disparity > self.params.disparity_threshold,
        }
    }

    /// Every (exam, subject) key that has received at least one sample.
    pub fn observed_keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<(String, String)> = self.snapshots.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(min_samples: u64, threshold: f64) -> FairnessMonitor {
        FairnessMonitor::new(FairnessParams {
            disparity_threshold: threshold,
            min_group_samples: min_samples,
        })
    }

    #[test]
    fn rolling_mean_matches_batch_mean() {
        let monitor = monitor(1, 0.08);
        for outcome in [0.2, 0.4, 0.9] {
            monitor.record("NEET", "physics", "groupA", outcome);
        }
        let report = monitor.report("NEET", "physics");
        assert!((report.groups[0].average - 0.5).abs() < 1e-12);
        assert_eq!(report.groups[0].samples, 3);
    }

    #[test]
    fn disparity_flags_above_threshold() {
        let monitor = monitor(2, 0.08);
        for _ in 0..3 {
            monitor.record("NEET", "physics", "groupA", 0.8);
            monitor.record("NEET", "physics", "groupB", 0.6);
        }
        let report = monitor.report("NEET", "physics");
        assert!((report.disparity - 0.2).abs() < 1e-12);
        assert!(report.flagged);
    }

    #[test]
    fn small_groups_are_reported_but_excluded() {
        let monitor = monitor(5, 0.08);
        for _ in 0..5 {
            monitor.record("NEET", "physics", "groupA", 0.9);
            monitor.record("NEET", "physics", "groupB", 0.5);
        }
        monitor.record("NEET", "physics", "tiny", 0.0);

        let report = monitor.report("NEET", "physics");
        let tiny = report.groups.iter().find(|g| g.group == "tiny").unwrap();
        assert!(!tiny.included);
        assert_eq!(tiny.samples, 1);
        // Disparity computed from the two qualified groups only.
        assert!((report.disparity - 0.4).abs() < 1e-12);
    }

    #[test]
    fn keys_are_isolated() {
        let monitor = monitor(1, 0.08);
        monitor.record("examA", "subjectX", "groupA", 1.0);
        monitor.record("examA", "subjectX", "groupB", 0.0);

        let other_subject = monitor.report("examA", "subjectY");
        assert!(other_subject.groups.is_empty());
        assert_eq!(other_subject.disparity, 0.0);

        let other_exam = monitor.report("examB", "subjectX");
        assert!(other_exam.groups.is_empty());
        assert!(!other_exam.flagged);
    }

    #[test]
    fn single_qualified_group_has_no_disparity() {
        let monitor = monitor(1, 0.08);
        monitor.record("NEET", "physics", "only", 0.7);
        let report = monitor.report("NEET", "physics");
        assert_eq!(report.disparity, 0.0);
        assert!(!report.flagged);
    }
}
