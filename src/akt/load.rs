//! Cognitive load and stress estimation from behavioral signals.
//!
//! Deterministic function of its inputs — no hidden state — so identical
//! signals always produce identical scalars. Mobile and degraded-network
//! contexts raise extraneous load relative to an otherwise identical desktop
//! input.

use crate::akt::config::LoadParams;
use crate::akt::types::{BehavioralSignals, LoadProfile};

pub struct LoadEstimator<'a> {
    params: &'a LoadParams,
}

impl<'a> LoadEstimator<'a> {
    pub fn new(params: &'a LoadParams) -> Self {
        Self { params }
    }

    pub fn estimate(&self, signals: &BehavioralSignals) -> LoadProfile {
        let overrun = if signals.expected_time_ms > 0 {
            (signals.response_time_ms as f64 / signals.expected_time_ms as f64 - 1.0)
                .clamp(0.0, 1.0)
        } else {
            0.0
        };
        let hesitation =
            (signals.hesitation_ms.max(0) as f64 / self.params.hesitation_norm_ms).clamp(0.0, 1.0);
        let keystroke = signals.keystroke_variance.clamp(0.0, 1.0);
        let session =
            (signals.session_minutes.max(0.0) / self.params.session_norm_minutes).clamp(0.0, 1.0);

        let stress = (self.params.overrun_weight * overrun
            + self.params.hesitation_weight * hesitation
            + self.params.keystroke_weight * keystroke
            + self.params.session_weight * session)
            .clamp(0.0, 1.0);

        let intrinsic_load = signals.complexity.clamp(0.0, 1.0);

        // Contributions are scaled so the sum stays under 1; the device
        // differential survives without being flattened by the clamp.
        let extraneous_load = (signals.device.friction()
            + signals.network.friction()
            + 0.3 * hesitation
            + 0.1 * keystroke)
            .clamp(0.0, 1.0);

        let total_load = (self.params.intrinsic_weight * intrinsic_load
            + self.params.extraneous_weight * extraneous_load)
            .clamp(0.0, 1.0);

        LoadProfile {
            stress,
            intrinsic_load,
            extraneous_load,
            total_load,
            fatigue: session,
            overload_risk: total_load > self.params.overload_threshold,
        }
    }
}
