//! Property-based invariants for the pure algorithm layer.
//!
//! - Mastery updates stay in [0,1] and order correctly by outcome.
//! - Load scalars stay bounded for arbitrary signals.
//! - Time allocations never exceed the exam cap.
//! - Calibration with no stored temperature is the identity.

use proptest::prelude::*;

use disha_engine::akt::calibration::CalibrationTable;
use disha_engine::akt::config::{AktConfig, CalibrationParams, MasteryParams};
use disha_engine::akt::load::LoadEstimator;
use disha_engine::akt::mastery;
use disha_engine::akt::timing::{AllocationInput, TimeAllocator};
use disha_engine::akt::types::{BehavioralSignals, ConceptParameters, DeviceType, NetworkQuality};

fn arb_unit() -> impl Strategy<Value = f64> {
    (0u64..=1000u64).prop_map(|v| v as f64 / 1000.0)
}

/// Slip/guess pairs that satisfy the consistency precondition.
fn arb_slip_guess() -> impl Strategy<Value = (f64, f64)> {
    (1u64..=450u64, 1u64..=450u64).prop_map(|(s, g)| (s as f64 / 1000.0, g as f64 / 1000.0))
}

fn arb_device() -> impl Strategy<Value = DeviceType> {
    prop_oneof![
        Just(DeviceType::Desktop),
        Just(DeviceType::Mobile),
        Just(DeviceType::Tablet),
    ]
}

fn arb_network() -> impl Strategy<Value = NetworkQuality> {
    prop_oneof![
        Just(NetworkQuality::Good),
        Just(NetworkQuality::Degraded),
        Just(NetworkQuality::Poor),
    ]
}

fn arb_signals() -> impl Strategy<Value = BehavioralSignals> {
    (
        (0i64..=600_000i64),
        (1i64..=600_000i64),
        (0i64..=120_000i64),
        arb_unit(),
        arb_device(),
        arb_network(),
        (0u32..=600u32),
        arb_unit(),
    )
        .prop_map(
            |(
                response_time_ms,
                expected_time_ms,
                hesitation_ms,
                keystroke_variance,
                device,
                network,
                session_minutes,
                complexity,
            )| BehavioralSignals {
                response_time_ms,
                expected_time_ms,
                hesitation_ms,
                keystroke_variance,
                device,
                network,
                session_minutes: session_minutes as f64,
                complexity,
            },
        )
}

fn params(learn: f64, slip: f64, guess: f64) -> ConceptParameters {
    ConceptParameters {
        concept_id: "c".to_string(),
        learn_rate: learn,
        slip_rate: slip,
        guess_rate: guess,
        forgetting_rate: 0.0,
    }
}

proptest! {
    #[test]
    fn mastery_update_stays_in_unit_interval(
        p in arb_unit(),
        learn in arb_unit(),
        (slip, guess) in arb_slip_guess(),
        stress in arb_unit(),
        correct in any::<bool>(),
    ) {
        let config = MasteryParams::default();
        let result = mastery::update(p, &params(learn, slip, guess), correct, stress, &config)
            .expect("consistent parameters must update");
        prop_assert!((0.0..=1.0).contains(&result.new_mastery));
    }

    #[test]
    fn correct_outcome_dominates_incorrect(
        p in arb_unit(),
        learn in arb_unit(),
        (slip, guess) in arb_slip_guess(),
        stress in arb_unit(),
    ) {
        let config = MasteryParams::default();
        let up = mastery::update(p, &params(learn, slip, guess), true, stress, &config).unwrap();
        let down = mastery::update(p, &params(learn, slip, guess), false, stress, &config).unwrap();
        prop_assert!(up.new_mastery >= down.new_mastery - 1e-12);
    }

    #[test]
    fn effective_rates_stay_consistent_under_stress(
        (slip, guess) in arb_slip_guess(),
        stress in arb_unit(),
    ) {
        let config = MasteryParams::default();
        let (s, g) = mastery::stress_adjusted_rates(&params(0.2, slip, guess), stress, &config);
        prop_assert!(s >= 0.0 && s < 1.0);
        prop_assert!(g >= 0.0 && g < 1.0);
        prop_assert!(s + g < 1.0);
        prop_assert!(s >= slip - 1e-12);
        prop_assert!(g >= guess - 1e-12);
    }

    #[test]
    fn load_scalars_always_bounded(signals in arb_signals()) {
        let config = AktConfig::default();
        let profile = LoadEstimator::new(&config.load).estimate(&signals);
        for value in [
            profile.stress,
            profile.intrinsic_load,
            profile.extraneous_load,
            profile.total_load,
            profile.fatigue,
        ] {
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn mobile_extraneous_load_exceeds_desktop(signals in arb_signals()) {
        let config = AktConfig::default();
        let estimator = LoadEstimator::new(&config.load);
        let mut desktop = signals.clone();
        desktop.device = DeviceType::Desktop;
        let mut mobile = signals;
        mobile.device = DeviceType::Mobile;
        prop_assert!(
            estimator.estimate(&mobile).extraneous_load
                > estimator.estimate(&desktop).extraneous_load
        );
    }

    #[test]
    fn exam_caps_hold_for_any_input(
        base in 1i64..=10_000_000i64,
        difficulty in arb_unit(),
        mastery_level in arb_unit(),
        stress in arb_unit(),
        fatigue in arb_unit(),
        session in 0u32..=2000u32,
    ) {
        let config = AktConfig::default();
        let allocator = TimeAllocator::new(&config.timing, &config.exams);
        let input = AllocationInput {
            base_time_ms: base,
            difficulty,
            mastery: mastery_level,
            stress,
            fatigue,
            session_minutes: session as f64,
        };
        for (exam, cap) in [
            ("NEET", 90_000i64),
            ("JEE_Mains", 180_000i64),
            ("JEE_Advanced", 240_000i64),
        ] {
            let allocation = allocator.allocate(exam, &input).unwrap();
            prop_assert!(allocation.final_time_ms <= cap);
        }
    }

    #[test]
    fn unset_temperature_is_identity(raw in arb_unit()) {
        let table = CalibrationTable::new(CalibrationParams::default());
        prop_assert_eq!(table.apply("NEET", "physics", raw), raw);
    }

    #[test]
    fn calibrated_scores_stay_probabilities(
        raw in arb_unit(),
        logit_scale in 1u64..=50u64,
    ) {
        let table = CalibrationTable::new(CalibrationParams::default());
        let scale = logit_scale as f64 / 10.0;
        let logits = [-2.0 * scale, -scale, scale, 2.0 * scale];
        let labels = [false, false, true, true];
        table.fit("NEET", "physics", &logits, &labels).unwrap();
        let calibrated = table.apply("NEET", "physics", raw);
        prop_assert!((0.0..=1.0).contains(&calibrated));
    }
}
