use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryParams {
    /// Initial mastery for a concept never practiced before. Deliberately
    /// below 0.5 so first estimates do not overstate ability.
    pub default_prior: f64,
    /// Clamp applied before the posterior division.
    pub epsilon: f64,
    /// Mastery floor under which repeated misses trigger the recovery flag.
    pub recovery_floor: f64,
    /// Consecutive incorrect answers required to trigger recovery.
    pub recovery_streak: i32,
    /// Multiplicative gain stress applies to the effective slip rate.
    pub stress_slip_gain: f64,
    /// Multiplicative gain stress applies to the effective guess rate.
    pub stress_guess_gain: f64,
    /// Upper bound for either effective rate.
    pub max_effective_rate: f64,
    /// Upper bound for effective slip + guess combined.
    pub max_combined_rate: f64,
}

impl Default for MasteryParams {
    fn default() -> Self {
        Self {
            default_prior: 0.25,
            epsilon: 1e-6,
            recovery_floor: 0.3,
            recovery_streak: 3,
            stress_slip_gain: 0.5,
            stress_guess_gain: 0.3,
            max_effective_rate: 0.45,
            max_combined_rate: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEdge {
    pub from: String,
    pub to: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferParams {
    /// Damping applied on top of the edge weight. Kept below 1 so a chain of
    /// related concepts cannot amplify an update.
    pub transfer_factor: f64,
    pub edges: Vec<TransferEdge>,
}

impl Default for TransferParams {
    fn default() -> Self {
        Self {
            transfer_factor: 0.5,
            edges: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadParams {
    pub overrun_weight: f64,
    pub hesitation_weight: f64,
    pub keystroke_weight: f64,
    pub session_weight: f64,
    pub hesitation_norm_ms: f64,
    pub session_norm_minutes: f64,
    pub intrinsic_weight: f64,
    pub extraneous_weight: f64,
    pub overload_threshold: f64,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            overrun_weight: 0.4,
            hesitation_weight: 0.25,
            keystroke_weight: 0.15,
            session_weight: 0.2,
            hesitation_norm_ms: 8000.0,
            session_norm_minutes: 120.0,
            intrinsic_weight: 0.6,
            extraneous_weight: 0.4,
            overload_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingParams {
    pub difficulty_gain: f64,
    pub stress_gain: f64,
    /// Fraction of the budget a fully mastered concept gives back.
    pub mastery_discount: f64,
    pub fatigue_gain: f64,
    /// Additional milliseconds granted per minute of elapsed session time.
    pub session_drag_ms_per_minute: f64,
    pub session_drag_cap_ms: i64,
    pub min_time_ms: i64,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            difficulty_gain: 0.6,
            stress_gain: 0.35,
            mastery_discount: 0.4,
            fatigue_gain: 0.25,
            session_drag_ms_per_minute: 150.0,
            session_drag_cap_ms: 15_000,
            min_time_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPolicy {
    /// Hard per-question ceiling. Applied last, never exceeded.
    pub max_time_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub search_iterations: u32,
    /// Batches smaller than this are skipped by the refit worker.
    pub min_batch: usize,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            min_temperature: 0.05,
            max_temperature: 20.0,
            search_iterations: 80,
            min_batch: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairnessParams {
    pub disparity_threshold: f64,
    pub min_group_samples: u64,
}

impl Default for FairnessParams {
    fn default() -> Self {
        Self {
            disparity_threshold: 0.08,
            min_group_samples: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreParams {
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for StoreParams {
    fn default() -> Self {
        Self {
            read_timeout_ms: 25,
            write_timeout_ms: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AktConfig {
    pub mastery: MasteryParams,
    pub transfer: TransferParams,
    pub load: LoadParams,
    pub timing: TimingParams,
    pub calibration: CalibrationParams,
    pub fairness: FairnessParams,
    pub store: StoreParams,
    pub exams: HashMap<String, ExamPolicy>,
}

impl Default for AktConfig {
    fn default() -> Self {
        let mut exams = HashMap::new();
        exams.insert("NEET".to_string(), ExamPolicy { max_time_ms: 90_000 });
        exams.insert(
            "JEE_Mains".to_string(),
            ExamPolicy {
                max_time_ms: 180_000,
            },
        );
        exams.insert(
            "JEE_Advanced".to_string(),
            ExamPolicy {
                max_time_ms: 240_000,
            },
        );

        Self {
            mastery: MasteryParams::default(),
            transfer: TransferParams::default(),
            load: LoadParams::default(),
            timing: TimingParams::default(),
            calibration: CalibrationParams::default(),
            fairness: FairnessParams::default(),
            store: StoreParams::default(),
            exams,
        }
    }
}

impl AktConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("AKT_DEFAULT_PRIOR") {
            if let Ok(prior) = val.parse::<f64>() {
                config.mastery.default_prior = prior.clamp(0.0, 1.0);
            }
        }
        if let Ok(val) = std::env::var("AKT_RECOVERY_STREAK") {
            if let Ok(streak) = val.parse::<i32>() {
                config.mastery.recovery_streak = streak.max(1);
            }
        }
        if let Ok(val) = std::env::var("AKT_RECOVERY_FLOOR") {
            if let Ok(floor) = val.parse::<f64>() {
                config.mastery.recovery_floor = floor.clamp(0.0, 1.0);
            }
        }
        if let Ok(val) = std::env::var("AKT_DISPARITY_THRESHOLD") {
            if let Ok(threshold) = val.parse::<f64>() {
                config.fairness.disparity_threshold = threshold.max(0.0);
            }
        }
        if let Ok(val) = std::env::var("AKT_MIN_GROUP_SAMPLES") {
            if let Ok(min) = val.parse::<u64>() {
                config.fairness.min_group_samples = min;
            }
        }
        if let Ok(val) = std::env::var("AKT_STORE_READ_TIMEOUT_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.store.read_timeout_ms = ms.max(1);
            }
        }

        config
    }

    pub fn exam_policy(&self, exam_code: &str) -> Option<ExamPolicy> {
        self.exams.get(exam_code).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_exam_caps() {
        let config = AktConfig::default();
        assert_eq!(config.exam_policy("NEET").unwrap().max_time_ms, 90_000);
        assert_eq!(
            config.exam_policy("JEE_Mains").unwrap().max_time_ms,
            180_000
        );
        assert_eq!(
            config.exam_policy("JEE_Advanced").unwrap().max_time_ms,
            240_000
        );
        assert!(config.exam_policy("UNKNOWN").is_none());
    }

    #[test]
    fn combined_rate_bound_is_consistent() {
        let params = MasteryParams::default();
        assert!(params.max_combined_rate < 1.0);
        assert!(params.max_effective_rate * 2.0 <= params.max_combined_rate + f64::EPSILON);
    }
}
