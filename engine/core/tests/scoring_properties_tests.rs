// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Invariants of the pure scoring functions, checked over a grid of inputs
//! that includes boundary and non-finite values.

use bellwether_core::domain::mode::{select_mode, OperatingMode};
use bellwether_core::domain::scoring::{calculate_composite, calculate_uncertainty};
use bellwether_core::domain::signal::*;
use bellwether_core::domain::thresholds::DecisionThresholds;
use bellwether_core::domain::weights::{apply_bayesian_shrinkage, SegmentContext, WeightVector, WEIGHT_SUM_TOLERANCE};
use bellwether_core::domain::post::{Platform, TimeOfDay};

const SCORES: [f64; 8] = [0.0, 0.1, 0.49, 0.5, 0.7, 1.0, f64::NAN, 1.5];
const RATIOS: [f64; 7] = [0.0, 1.0, 2.0, 3.5, 5.0, 40.0, f64::INFINITY];
const CONFIDENCES: [f64; 3] = [0.0, 0.5, 1.0];

fn weight_vectors() -> Vec<WeightVector> {
    vec![
        WeightVector::global_default(),
        WeightVector::new(1.0, 0.0, 0.0, 0.0),
        WeightVector::new(0.25, 0.25, 0.25, 0.25),
        WeightVector::new(0.1, 0.1, 0.7, 0.1),
    ]
}

fn signals(sss: f64, ars: f64, evs: f64, trs: f64, confidence: f64) -> SignalBundle {
    SignalBundle {
        intent: IntentSignal::new(sss, confidence),
        author: AuthorSignal::new(ars, confidence),
        velocity: VelocitySignal::new(evs, confidence),
        topic: TopicSignal::new(trs, confidence),
        safety: SafetySignal::safe(),
        power_user: PowerUserSignal::new(false, confidence),
        competitor: CompetitorSignal::none(),
        temporal: TemporalContext::default(),
    }
}

#[test]
fn test_composite_and_interval_bounds_hold_everywhere() {
    for weights in weight_vectors() {
        for &sss in &SCORES {
            for &trs in &SCORES {
                for &evs in &RATIOS {
                    for &confidence in &CONFIDENCES {
                        let b = signals(sss, 0.5, evs, trs, confidence);
                        let composite = calculate_composite(&b.intent, &b.author, &b.velocity, &b.topic, &weights);
                        assert!(composite.value.is_finite());
                        assert!((0.0..=1.0).contains(&composite.value), "composite {}", composite.value);

                        let u = calculate_uncertainty(
                            &b.intent,
                            &b.author,
                            &b.velocity,
                            &b.topic,
                            &weights,
                            composite.value,
                        );
                        let ci = u.credible_interval;
                        assert!(0.0 <= ci.lower && ci.upper <= 1.0);
                        assert!(ci.lower <= composite.value && composite.value <= ci.upper);
                    }
                }
            }
        }
    }
}

#[test]
fn test_lower_confidence_never_narrows_the_interval() {
    let weights = WeightVector::global_default();
    let confident = signals(0.5, 0.5, 1.0, 0.5, 0.95);
    let doubtful = signals(0.5, 0.5, 1.0, 0.5, 0.2);

    let width = |b: &SignalBundle| {
        calculate_uncertainty(&b.intent, &b.author, &b.velocity, &b.topic, &weights, 0.5).half_width
    };
    assert!(width(&doubtful) > width(&confident));
}

#[test]
fn test_mode_probabilities_always_normalized() {
    let thresholds = DecisionThresholds::default();
    for &sss in &SCORES {
        for &ars in &SCORES {
            for &trs in &SCORES {
                for &evs in &RATIOS {
                    for power_user in [false, true] {
                        let mut b = signals(sss, ars, evs, trs, 0.9);
                        b.power_user.is_power_user = power_user;
                        let selection = select_mode(&b, &thresholds);

                        assert!((selection.probabilities.sum() - 1.0).abs() < 1e-4);
                        assert!(selection.probabilities.get(selection.mode) > 0.0);
                        assert_eq!(selection.confidence, selection.probabilities.get(selection.mode));
                        assert_eq!(selection.needs_review, selection.confidence < thresholds.review_cutoff());
                    }
                }
            }
        }
    }
}

#[test]
fn test_safety_and_relevance_gates() {
    let thresholds = DecisionThresholds::default();
    for &sss in &SCORES {
        for &evs in &RATIOS {
            let mut unsafe_post = signals(sss, 1.0, evs, 1.0, 1.0);
            unsafe_post.power_user.is_power_user = true;
            unsafe_post.safety = SafetySignal::disengage(["spam"]);
            let selection = select_mode(&unsafe_post, &thresholds);
            assert_eq!(selection.mode, OperatingMode::Disengaged);
            assert_eq!(selection.probabilities.disengaged, 1.0);

            let off_topic = signals(sss, 1.0, evs, 0.2, 1.0);
            assert_eq!(select_mode(&off_topic, &thresholds).mode, OperatingMode::Disengaged);
        }
    }
}

#[test]
fn test_documented_power_user_scenarios() {
    let thresholds = DecisionThresholds::default();

    let mut strong = signals(0.9, 0.8, 5.0, 0.85, 0.9);
    strong.power_user.is_power_user = true;
    assert_eq!(select_mode(&strong, &thresholds).mode, OperatingMode::Helpful);

    let mut borderline = signals(0.72, 0.0, 1.5, 0.85, 0.9);
    borderline.power_user.is_power_user = true;
    assert_eq!(select_mode(&borderline, &thresholds).mode, OperatingMode::Helpful);
}

#[test]
fn test_shrunk_weights_stay_normalized() {
    let global = WeightVector::global_default();
    let context = SegmentContext {
        platform: Some(Platform::Reddit),
        time_of_day: Some(TimeOfDay::Evening),
    };
    let segments = [
        WeightVector::new(0.7, 0.1, 0.1, 0.1),
        WeightVector::new(0.0, 0.0, 0.0, 1.0),
        WeightVector::new(0.2505, 0.2495, 0.25, 0.25),
    ];

    for segment in segments {
        for sample_size in [0_u64, 1, 30, 50, 1_000, 1_000_000] {
            for k in [0.0, 10.0, 50.0, 500.0] {
                let mut input = segment.clone().for_segment(&context, sample_size);
                input.is_validated = true;
                let shrunk = apply_bayesian_shrinkage(&input, &global, k);
                assert!(shrunk.is_validated);
                assert!((shrunk.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE);
                assert_eq!(shrunk.segment_key, "reddit:evening");
            }
        }
    }
}
