//! Temperature scaling per (exam, subject).
//!
//! A single scalar temperature is fitted per key by minimizing the negative
//! log-likelihood of observed labels under the rescaled logits. Raw scores
//! cross the logit boundary on the way through `apply`; with no fitted entry
//! the score passes through unchanged.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::akt::config::CalibrationParams;

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("logits/labels length mismatch: {logits} logits vs {labels} labels")]
    LengthMismatch { logits: usize, labels: usize },
    #[error("empty calibration batch")]
    EmptyBatch,
    #[error("degenerate calibration batch: every label is {0}")]
    SingleClassLabels(bool),
}

const PROB_FLOOR: f64 = 1e-12;

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn logit(p: f64) -> f64 {
    let p = p.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR);
    (p / (1.0 - p)).ln()
}

fn nll(logits: &[f64], labels: &[bool], temperature: f64) -> f64 {
    logits
        .iter()
        .zip(labels)
        .map(|(&z, &y)| {
            let p = sigmoid(z / temperature).clamp(PROB_FLOOR, 1.0 - PROB_FLOOR);
            if y {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum()
}

pub struct CalibrationTable {
    params: CalibrationParams,
    entries: RwLock<HashMap<(String, String), f64>>,
}

impl CalibrationTable {
    pub fn new(params: CalibrationParams) -> Self {
        Self {
            params,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fit and store the temperature for one key. Never touches any other
    /// key. Fails explicitly on mismatched or single-class input; nothing is
    /// stored on failure.
    pub fn fit(
        &self,
        exam_code: &str,
        subject: &str,
        logits: &[f64],
        labels: &[bool],
    ) -> Result<f64, CalibrationError> {
        if logits.len() != labels.len() {
            return Err(CalibrationError::LengthMismatch {
                logits: logits.len(),
                labels: labels.len(),
            });
        }
        if logits.is_empty() {
            return Err(CalibrationError::EmptyBatch);
        }
        let positives = labels.iter().filter(|&&y| y).count();
        if positives == 0 || positives == labels.len() {
            return Err(CalibrationError::SingleClassLabels(positives > 0));
        }

        let temperature = self.minimize_nll(logits, labels);
        self.entries.write().insert(
            (exam_code.to_string(), subject.to_string()),
            temperature,
        );
        tracing::info!(
            exam_code,
            subject,
            temperature,
            samples = logits.len(),
            "calibration temperature fitted"
        );
        Ok(temperature)
    }

    /// Golden-section search on ln T over the configured bounds. Clamped
    /// probabilities keep the loss finite even for perfectly separable input.
    fn minimize_nll(&self, logits: &[f64], labels: &[bool]) -> f64 {
        let golden: f64 = (5f64.sqrt() - 1.0) / 2.0;
        let mut lo = self.params.min_temperature.ln();
        let mut hi = self.params.max_temperature.ln();

        let mut x1 = hi - golden * (hi - lo);
        let mut x2 = lo + golden * (hi - lo);
        let mut f1 = nll(logits, labels, x1.exp());
        let mut f2 = nll(logits, labels, x2.exp());

        for _ in 0..self.params.search_iterations {
            if f1 <= f2 {
                hi = x2;
                x2 = x1;
                f2 = f1;
                x1 = hi - golden * (hi - lo);
                f1 = nll(logits, labels, x1.exp());
            } else {
                lo = x1;
                x1 = x2;
                f1 = f2;
                x2 = lo + golden * (hi - lo);
                f2 = nll(logits, labels, x2.exp());
            }
        }

        ((lo + hi) / 2.0).exp()
    }

    /// Rescale a raw score using the stored temperature. With no entry the
    /// input is returned unchanged, bit for bit.
    pub fn apply(&self, exam_code: &str, subject: &str, raw_score: f64) -> f64 {
        let temperature = {
            let entries = self.entries.read();
            entries
                .get(&(exam_code.to_string(), subject.to_string()))
                .copied()
        };
        match temperature {
            None => raw_score,
            Some(t) => sigmoid(logit(raw_score) / t),
        }
    }

    pub fn temperature(&self, exam_code: &str, subject: &str) -> Option<f64> {
        self.entries
            .read()
            .get(&(exam_code.to_string(), subject.to_string()))
            .copied()
    }
}
