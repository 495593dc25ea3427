//! Per-question time budgeting.
//!
//! Multiplicative adjustments over a base expected time, an additive session
//! drag, then the exam's hard cap clamped last. Holding all else fixed,
//! rising stress or difficulty never shrinks the budget and rising mastery
//! never grows it.

use std::collections::HashMap;

use crate::akt::config::{ExamPolicy, TimingParams};
use crate::akt::types::{TimeAllocation, TimeFactor};

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("unknown exam code: {0}")]
    UnknownExam(String),
    #[error("invalid base time: {0}")]
    InvalidBaseTime(i64),
}

#[derive(Debug, Clone)]
pub struct AllocationInput {
    pub base_time_ms: i64,
    pub difficulty: f64,
    pub mastery: f64,
    pub stress: f64,
    pub fatigue: f64,
    pub session_minutes: f64,
}

pub struct TimeAllocator<'a> {
    params: &'a TimingParams,
    exams: &'a HashMap<String, ExamPolicy>,
}

impl<'a> TimeAllocator<'a> {
    pub fn new(params: &'a TimingParams, exams: &'a HashMap<String, ExamPolicy>) -> Self {
        Self { params, exams }
    }

    pub fn allocate(
        &self,
        exam_code: &str,
        input: &AllocationInput,
    ) -> Result<TimeAllocation, AllocationError> {
        let policy = self
            .exams
            .get(exam_code)
            .copied()
            .ok_or_else(|| AllocationError::UnknownExam(exam_code.to_string()))?;
        if input.base_time_ms <= 0 {
            return Err(AllocationError::InvalidBaseTime(input.base_time_ms));
        }

        let mut breakdown = Vec::with_capacity(7);
        let mut running = input.base_time_ms as f64;
        breakdown.push(TimeFactor {
            name: "baseTime".to_string(),
            value: running,
            delta_ms: input.base_time_ms,
        });

        let mut apply_multiplier = |name: &str, factor: f64, running: &mut f64| {
            let before = *running;
            *running *= factor;
            breakdown.push(TimeFactor {
                name: name.to_string(),
                value: factor,
                delta_ms: (*running - before).round() as i64,
            });
        };

        let difficulty_mult = 1.0 + self.params.difficulty_gain * input.difficulty.clamp(0.0, 1.0);
        apply_multiplier("difficulty", difficulty_mult, &mut running);

        let stress_mult = 1.0 + self.params.stress_gain * input.stress.clamp(0.0, 1.0);
        apply_multiplier("stress", stress_mult, &mut running);

        let mastery_mult = 1.0 - self.params.mastery_discount * input.mastery.clamp(0.0, 1.0);
        apply_multiplier("mastery", mastery_mult, &mut running);

        let fatigue_mult = 1.0 + self.params.fatigue_gain * input.fatigue.clamp(0.0, 1.0);
        apply_multiplier("fatigue", fatigue_mult, &mut running);

        let drag = (self.params.session_drag_ms_per_minute * input.session_minutes.max(0.0))
            .min(self.params.session_drag_cap_ms as f64);
        running += drag;
        breakdown.push(TimeFactor {
            name: "sessionDrag".to_string(),
            value: drag,
            delta_ms: drag.round() as i64,
        });

        let floored = running.max(self.params.min_time_ms as f64);
        let uncapped = floored.round() as i64;
        let final_time_ms = uncapped.min(policy.max_time_ms);
        let capped = uncapped > policy.max_time_ms;
        breakdown.push(TimeFactor {
            name: "examCap".to_string(),
            value: policy.max_time_ms as f64,
            delta_ms: final_time_ms - uncapped,
        });

        Ok(TimeAllocation {
            final_time_ms,
            capped,
            breakdown,
        })
    }
}
