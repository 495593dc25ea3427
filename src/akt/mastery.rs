//! Bayesian mastery updates.
//!
//! The update is the standard knowledge-tracing posterior followed by a
//! learning transition, kept pure so the engine can run it under a per-key
//! lock and persist the result itself. Stress raises the effective slip and
//! guess rates (a stressed student slips and guesses more), bounded so the
//! parameter consistency precondition keeps holding.

use crate::akt::config::MasteryParams;
use crate::akt::types::ConceptParameters;

#[derive(Debug, thiserror::Error)]
pub enum MasteryError {
    #[error("inconsistent parameters for {concept_id}: slip {slip} + guess {guess} >= 1")]
    InconsistentParameters {
        concept_id: String,
        slip: f64,
        guess: f64,
    },
    #[error("parameter {name} out of range: {value}")]
    ParameterOutOfRange { name: &'static str, value: f64 },
    #[error("mastery probability out of range: {0}")]
    InvalidMastery(f64),
}

pub fn validate_parameters(params: &ConceptParameters) -> Result<(), MasteryError> {
    for (name, value) in [
        ("learnRate", params.learn_rate),
        ("slipRate", params.slip_rate),
        ("guessRate", params.guess_rate),
        ("forgettingRate", params.forgetting_rate),
    ] {
        if !(0.0..=1.0).contains(&value) || !value.is_finite() {
            return Err(MasteryError::ParameterOutOfRange { name, value });
        }
    }
    if params.slip_rate + params.guess_rate >= 1.0 {
        return Err(MasteryError::InconsistentParameters {
            concept_id: params.concept_id.clone(),
            slip: params.slip_rate,
            guess: params.guess_rate,
        });
    }
    Ok(())
}

/// Effective slip/guess after stress coupling. Each rate is capped, then the
/// pair is rescaled if the sum approaches 1, so the posterior stays a valid
/// evidence update.
pub fn stress_adjusted_rates(
    params: &ConceptParameters,
    stress: f64,
    config: &MasteryParams,
) -> (f64, f64) {
    let stress = stress.clamp(0.0, 1.0);
    let mut slip =
        (params.slip_rate * (1.0 + config.stress_slip_gain * stress)).min(config.max_effective_rate);
    let mut guess = (params.guess_rate * (1.0 + config.stress_guess_gain * stress))
        .min(config.max_effective_rate);

    let combined = slip + guess;
    if combined >= config.max_combined_rate {
        let scale = config.max_combined_rate / combined;
        slip *= scale;
        guess *= scale;
    }

    (slip, guess)
}

/// Posterior mastery after observing one response, before the learning
/// transition.
fn posterior(p: f64, slip: f64, guess: f64, is_correct: bool, epsilon: f64) -> f64 {
    let p = p.clamp(epsilon, 1.0 - epsilon);
    if is_correct {
        let evidence = p * (1.0 - slip);
        evidence / (evidence + (1.0 - p) * guess)
    } else {
        let evidence = p * slip;
        evidence / (evidence + (1.0 - p) * (1.0 - guess))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpdateResult {
    pub new_mastery: f64,
    pub effective_slip: f64,
    pub effective_guess: f64,
}

/// One full mastery update: validation, stress coupling, posterior, learning
/// transition. Pure; the caller owns persistence.
pub fn update(
    mastery: f64,
    params: &ConceptParameters,
    is_correct: bool,
    stress: f64,
    config: &MasteryParams,
) -> Result<UpdateResult, MasteryError> {
    if !(0.0..=1.0).contains(&mastery) || !mastery.is_finite() {
        return Err(MasteryError::InvalidMastery(mastery));
    }
    validate_parameters(params)?;

    let (slip, guess) = stress_adjusted_rates(params, stress, config);
    let observed = posterior(mastery, slip, guess, is_correct, config.epsilon);
    let learned = observed + (1.0 - observed) * params.learn_rate;

    Ok(UpdateResult {
        new_mastery: learned.clamp(0.0, 1.0),
        effective_slip: slip,
        effective_guess: guess,
    })
}

/// Mastery decay toward the concept prior since the last practice. Uses the
/// stored forgetting rate as a per-day decay, forward-only.
pub fn decay_toward_prior(mastery: f64, prior: f64, forgetting_rate: f64, elapsed_days: f64) -> f64 {
    if elapsed_days <= 0.0 || forgetting_rate <= 0.0 {
        return mastery;
    }
    let retention = (1.0 - forgetting_rate.clamp(0.0, 1.0)).powf(elapsed_days);
    (prior + (mastery - prior) * retention).clamp(0.0, 1.0)
}

/// Probability the student answers correctly given current mastery. Logged
/// alongside the observed label as the calibration training pair.
pub fn predicted_correct_probability(mastery: f64, slip: f64, guess: f64) -> f64 {
    (mastery * (1.0 - slip) + (1.0 - mastery) * guess).clamp(0.0, 1.0)
}

/// Recovery is a signal only. Downstream selection reduces difficulty; this
/// module never selects content.
pub fn recovery_triggered(consecutive_incorrect: i32, mastery: f64, config: &MasteryParams) -> bool {
    consecutive_incorrect >= config.recovery_streak && mastery < config.recovery_floor
}
