// Copyright (c) 2026 Bellwether Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Segment Weight Vectors
//!
//! A weight vector assigns one weight to each of the four scored signals
//! (intent, author, velocity, topic). Weights are learned offline per
//! *segment* (platform × time-of-day bucket) and stored by segment key.
//!
//! ## Invariants
//!
//! - A validated vector has non-negative, finite components summing to
//!   `1 ± WEIGHT_SUM_TOLERANCE`.
//! - [`apply_bayesian_shrinkage`] preserves that invariant.
//! - The GLOBAL vector is the prior every segment is shrunk toward and the
//!   fallback whenever a segment cannot be used.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::post::{Platform, Post, TimeOfDay};

/// Allowed deviation of a validated weight sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-3;

pub const GLOBAL_SEGMENT_KEY: &str = "GLOBAL";

/// Default shrinkage constant `k` in `n / (n + k)`
pub const DEFAULT_SHRINKAGE_K: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentType {
    Global,
    Platform,
    PlatformTimeOfDay,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Global => "GLOBAL",
            SegmentType::Platform => "PLATFORM",
            SegmentType::PlatformTimeOfDay => "PLATFORM_TIME_OF_DAY",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SegmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GLOBAL" => Ok(SegmentType::Global),
            "PLATFORM" => Ok(SegmentType::Platform),
            "PLATFORM_TIME_OF_DAY" => Ok(SegmentType::PlatformTimeOfDay),
            other => Err(format!("unknown segment type '{}'", other)),
        }
    }
}

/// Fields a segment key is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentContext {
    pub platform: Option<Platform>,
    pub time_of_day: Option<TimeOfDay>,
}

impl SegmentContext {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn for_post(post: &Post) -> Self {
        Self {
            platform: Some(post.platform),
            time_of_day: Some(TimeOfDay::from_timestamp(post.posted_at)),
        }
    }

    pub fn segment_type(&self) -> SegmentType {
        match (self.platform, self.time_of_day) {
            (Some(_), Some(_)) => SegmentType::PlatformTimeOfDay,
            (Some(_), None) => SegmentType::Platform,
            // A time bucket without a platform is not a learned segment
            (None, _) => SegmentType::Global,
        }
    }

    /// `twitter:morning`, `reddit`, or `GLOBAL`
    pub fn segment_key(&self) -> String {
        match (self.platform, self.time_of_day) {
            (Some(platform), Some(tod)) => format!("{}:{}", platform.as_str(), tod.as_str()),
            (Some(platform), None) => platform.as_str().to_string(),
            (None, _) => GLOBAL_SEGMENT_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    pub sss_weight: f64,
    pub ars_weight: f64,
    pub evs_weight: f64,
    pub trs_weight: f64,
    pub segment_type: SegmentType,
    pub segment_key: String,
    #[serde(default)]
    pub sample_size: u64,
    #[serde(default)]
    pub is_validated: bool,
}

impl WeightVector {
    pub fn new(sss: f64, ars: f64, evs: f64, trs: f64) -> Self {
        Self {
            sss_weight: sss,
            ars_weight: ars,
            evs_weight: evs,
            trs_weight: trs,
            segment_type: SegmentType::Global,
            segment_key: GLOBAL_SEGMENT_KEY.to_string(),
            sample_size: 0,
            is_validated: false,
        }
    }

    /// Built-in prior used when no GLOBAL vector is configured.
    pub fn global_default() -> Self {
        Self {
            is_validated: true,
            ..Self::new(0.35, 0.25, 0.15, 0.25)
        }
    }

    pub fn for_segment(mut self, context: &SegmentContext, sample_size: u64) -> Self {
        self.segment_type = context.segment_type();
        self.segment_key = context.segment_key();
        self.sample_size = sample_size;
        self
    }

    pub fn components(&self) -> [f64; 4] {
        [self.sss_weight, self.ars_weight, self.evs_weight, self.trs_weight]
    }

    pub fn sum(&self) -> f64 {
        self.components().iter().sum()
    }

    pub fn is_global(&self) -> bool {
        self.segment_type == SegmentType::Global
    }

    /// Structural check: finite, non-negative, sums to one.
    pub fn check_shape(&self) -> Result<(), WeightValidationError> {
        for (name, value) in ["sss", "ars", "evs", "trs"].iter().zip(self.components()) {
            if !value.is_finite() {
                return Err(WeightValidationError::NonFinite { component: (*name).to_string() });
            }
            if value < 0.0 {
                return Err(WeightValidationError::Negative { component: (*name).to_string(), value });
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightValidationError::BadSum(sum));
        }

        Ok(())
    }

    /// Full check applied to every record fetched from the weight store.
    pub fn validate(&self, min_sample_size: u64) -> Result<(), WeightValidationError> {
        self.check_shape()?;
        if self.sample_size < min_sample_size {
            return Err(WeightValidationError::InsufficientSamples {
                sample_size: self.sample_size,
                required: min_sample_size,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WeightValidationError {
    #[error("weight '{component}' is not finite")]
    NonFinite { component: String },

    #[error("weight '{component}' is negative ({value})")]
    Negative { component: String, value: f64 },

    #[error("weights sum to {0}, expected 1.0")]
    BadSum(f64),

    #[error("sample size {sample_size} below required minimum {required}")]
    InsufficientSamples { sample_size: u64, required: u64 },
}

impl WeightValidationError {
    /// Metric tag value
    pub fn reason(&self) -> &'static str {
        match self {
            WeightValidationError::NonFinite { .. } => "non_finite",
            WeightValidationError::Negative { .. } => "negative",
            WeightValidationError::BadSum(_) => "bad_sum",
            WeightValidationError::InsufficientSamples { .. } => "insufficient_samples",
        }
    }
}

/// Trust placed in the segment estimate: `n / (n + k)`.
///
/// A non-positive `k` disables shrinkage (full trust).
pub fn shrinkage_blend(sample_size: u64, k: f64) -> f64 {
    if !k.is_finite() || k <= 0.0 {
        return 1.0;
    }
    let n = sample_size as f64;
    n / (n + k)
}

/// Blend `segment` toward `global` in proportion to how little data backs it.
///
/// The result keeps the segment's identity (type, key, sample size) and is
/// renormalized by its actual sum, so a validated input yields a validated
/// output summing to one.
pub fn apply_bayesian_shrinkage(segment: &WeightVector, global: &WeightVector, k: f64) -> WeightVector {
    let blend = shrinkage_blend(segment.sample_size, k);

    let seg = segment.components();
    let glob = global.components();
    let mut blended = [0.0; 4];
    for i in 0..4 {
        blended[i] = blend * seg[i] + (1.0 - blend) * glob[i];
    }

    let total: f64 = blended.iter().sum();
    if total.is_finite() && total > 0.0 {
        for w in blended.iter_mut() {
            *w /= total;
        }
    }

    let mut shrunk = WeightVector {
        sss_weight: blended[0],
        ars_weight: blended[1],
        evs_weight: blended[2],
        trs_weight: blended[3],
        segment_type: segment.segment_type,
        segment_key: segment.segment_key.clone(),
        sample_size: segment.sample_size,
        is_validated: false,
    };
    shrunk.is_validated = segment.is_validated && shrunk.check_shape().is_ok();
    shrunk
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(sss: f64, ars: f64, evs: f64, trs: f64, n: u64) -> WeightVector {
        let ctx = SegmentContext { platform: Some(Platform::Twitter), time_of_day: Some(TimeOfDay::Morning) };
        WeightVector {
            is_validated: true,
            ..WeightVector::new(sss, ars, evs, trs).for_segment(&ctx, n)
        }
    }

    #[test]
    fn test_segment_keys() {
        let full = SegmentContext { platform: Some(Platform::Reddit), time_of_day: Some(TimeOfDay::Evening) };
        assert_eq!(full.segment_key(), "reddit:evening");
        assert_eq!(full.segment_type(), SegmentType::PlatformTimeOfDay);

        let platform_only = SegmentContext { platform: Some(Platform::Threads), time_of_day: None };
        assert_eq!(platform_only.segment_key(), "threads");
        assert_eq!(platform_only.segment_type(), SegmentType::Platform);

        let tod_only = SegmentContext { platform: None, time_of_day: Some(TimeOfDay::Night) };
        assert_eq!(tod_only.segment_key(), GLOBAL_SEGMENT_KEY);
        assert_eq!(SegmentContext::global().segment_type(), SegmentType::Global);
    }

    #[test]
    fn test_global_default_is_valid() {
        let global = WeightVector::global_default();
        assert!(global.check_shape().is_ok());
        assert!(global.is_validated);
        assert!(global.is_global());
    }

    #[test]
    fn test_validation_rejections() {
        assert!(matches!(
            segment(0.5, 0.5, 0.5, -0.5, 100).validate(10),
            Err(WeightValidationError::Negative { .. })
        ));
        assert!(matches!(
            segment(0.5, 0.5, 0.5, 0.5, 100).validate(10),
            Err(WeightValidationError::BadSum(_))
        ));
        assert!(matches!(
            segment(f64::NAN, 0.5, 0.25, 0.25, 100).validate(10),
            Err(WeightValidationError::NonFinite { .. })
        ));
        assert!(matches!(
            segment(0.25, 0.25, 0.25, 0.25, 5).validate(10),
            Err(WeightValidationError::InsufficientSamples { sample_size: 5, required: 10 })
        ));
        assert!(segment(0.25, 0.25, 0.25, 0.25, 10).validate(10).is_ok());
    }

    #[test]
    fn test_blend_grows_with_sample_size() {
        assert_eq!(shrinkage_blend(0, 50.0), 0.0);
        assert!((shrinkage_blend(50, 50.0) - 0.5).abs() < 1e-12);
        assert!(shrinkage_blend(5000, 50.0) > 0.99);
        assert_eq!(shrinkage_blend(10, 0.0), 1.0);
    }

    #[test]
    fn test_shrinkage_converges_to_global_at_zero_samples() {
        let global = WeightVector::global_default();
        let shrunk = apply_bayesian_shrinkage(&segment(0.7, 0.1, 0.1, 0.1, 0), &global, 50.0);
        for (a, b) in shrunk.components().iter().zip(global.components()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(shrunk.segment_key, "twitter:morning");
    }

    #[test]
    fn test_shrinkage_halfway_and_sums_to_one() {
        let global = WeightVector::global_default();
        let shrunk = apply_bayesian_shrinkage(&segment(0.7, 0.1, 0.1, 0.1, 50), &global, 50.0);
        assert!((shrunk.sss_weight - (0.7 + 0.35) / 2.0).abs() < 1e-9);
        assert!((shrunk.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!(shrunk.is_validated);
    }

    #[test]
    fn test_shrinkage_preserves_sum_over_grid() {
        let global = WeightVector::global_default();
        let candidates = [
            (0.25, 0.25, 0.25, 0.25),
            (1.0, 0.0, 0.0, 0.0),
            (0.1, 0.2, 0.3, 0.4),
            (0.0005, 0.3333, 0.3333, 0.3334),
        ];
        for (sss, ars, evs, trs) in candidates {
            for n in [0_u64, 1, 30, 49, 500, 1_000_000] {
                let shrunk = apply_bayesian_shrinkage(&segment(sss, ars, evs, trs, n), &global, 50.0);
                assert!(shrunk.is_validated);
                assert!((shrunk.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE, "n={} sum={}", n, shrunk.sum());
                assert!(shrunk.components().iter().all(|w| *w >= 0.0));
            }
        }
    }

    #[test]
    fn test_unvalidated_input_stays_unvalidated() {
        let global = WeightVector::global_default();
        let mut raw = segment(0.25, 0.25, 0.25, 0.25, 100);
        raw.is_validated = false;
        assert!(!apply_bayesian_shrinkage(&raw, &global, 50.0).is_validated);
    }
}
