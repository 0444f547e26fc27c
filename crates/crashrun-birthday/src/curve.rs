//! # Collision Curve
//!
//! Probability of at least one repeated value among `k` draws from a space of
//! `N` equally likely values, using the birthday-bound approximation
//!
//! ```text
//! P(k) = 1 - exp(-k(k-1) / 2N)
//! ```
//!
//! [`CollisionCurve`] yields `P(k)` for `k = 1, 2, ...` and stops right after
//! the first point that is within `tolerance` of 1.

use std::iter::FusedIterator;

use tracing::debug;

use crate::error::{BirthdayError, Result};

/// Width of the default hash space.
pub const SPACE_BITS: u32 = 16;

/// Size of the default hash space, `2^SPACE_BITS`.
pub const DEFAULT_SPACE_SIZE: f64 = 65536.0;

/// Default upper bound on the number of trials.
pub const MAX_TRIALS: u64 = 9999;

/// Default saturation tolerance.
pub const TOLERANCE: f64 = 1e-12;

/// Birthday-bound collision probability for `trials` draws from `space_size` values.
#[must_use]
pub fn collision_probability(trials: u64, space_size: f64) -> f64
{
    #[allow(clippy::cast_precision_loss)]
    let k = trials as f64;
    1.0 - (-0.5 * k * (k - 1.0) / space_size).exp()
}

/// One point of the curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint
{
    /// Number of draws, `k`.
    pub trials: u64,
    /// Approximate probability of a collision among those draws.
    pub probability: f64,
}

impl CurvePoint
{
    /// Whether this point is indistinguishable from 1 at `tolerance`.
    #[must_use]
    pub fn is_saturated(&self, tolerance: f64) -> bool
    {
        self.probability + tolerance > 1.0
    }
}

/// Parameters of a curve
///
/// The defaults are a 16-bit space, 9999 trials and a tolerance of `1e-12`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveParams
{
    /// Number of equally likely values, `N`.
    pub space_size: f64,
    /// Largest `k` evaluated.
    pub max_trials: u64,
    /// Saturation tolerance.
    pub tolerance: f64,
}

impl Default for CurveParams
{
    fn default() -> Self
    {
        Self {
            space_size: DEFAULT_SPACE_SIZE,
            max_trials: MAX_TRIALS,
            tolerance: TOLERANCE,
        }
    }
}

impl CurveParams
{
    /// Default parameters over a space of `2^bits` values.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidBits` unless `1 <= bits <= 64`.
    pub fn for_bits(bits: u32) -> Result<Self>
    {
        if !(1..=64).contains(&bits) {
            return Err(BirthdayError::InvalidBits(bits));
        }
        Ok(Self {
            space_size: 2f64.powi(i32::try_from(bits).map_err(|_| BirthdayError::InvalidBits(bits))?),
            ..Self::default()
        })
    }

    /// Replace the trial bound.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidMaxTrials` for zero.
    pub fn with_max_trials(mut self, max_trials: u64) -> Result<Self>
    {
        if max_trials == 0 {
            return Err(BirthdayError::InvalidMaxTrials);
        }
        self.max_trials = max_trials;
        Ok(self)
    }

    /// Replace the saturation tolerance.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidTolerance` unless `0 <= tolerance < 1`.
    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self>
    {
        if !tolerance.is_finite() || !(0.0..1.0).contains(&tolerance) {
            return Err(BirthdayError::InvalidTolerance(tolerance));
        }
        self.tolerance = tolerance;
        Ok(self)
    }
}

/// Iterator over the points of a curve, in increasing `k` order.
#[derive(Debug, Clone)]
pub struct CollisionCurve
{
    params: CurveParams,
    next_trials: u64,
    saturated: bool,
}

impl CollisionCurve
{
    /// Curve starting at one trial, stepping by one up to `params.max_trials`.
    #[must_use]
    pub fn new(params: CurveParams) -> Self
    {
        Self {
            params,
            next_trials: 1,
            saturated: false,
        }
    }
}

impl Default for CollisionCurve
{
    fn default() -> Self
    {
        Self::new(CurveParams::default())
    }
}

impl Iterator for CollisionCurve
{
    type Item = CurvePoint;

    fn next(&mut self) -> Option<CurvePoint>
    {
        if self.saturated || self.next_trials > self.params.max_trials {
            return None;
        }

        let trials = self.next_trials;
        self.next_trials += 1;

        let point = CurvePoint {
            trials,
            probability: collision_probability(trials, self.params.space_size),
        };

        // The saturating point itself is still yielded.
        if point.is_saturated(self.params.tolerance) {
            debug!(trials, probability = point.probability, "collision curve saturated");
            self.saturated = true;
        }

        Some(point)
    }
}

impl FusedIterator for CollisionCurve {}

/// First point of the curve within tolerance of 1, if the trial bound reaches it.
#[must_use]
pub fn saturation_point(params: CurveParams) -> Option<CurvePoint>
{
    CollisionCurve::new(params).find(|point| point.is_saturated(params.tolerance))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_single_draw_cannot_collide()
    {
        assert_eq!(collision_probability(1, DEFAULT_SPACE_SIZE), 0.0);
        assert_eq!(collision_probability(0, DEFAULT_SPACE_SIZE), 0.0);
    }

    #[test]
    fn test_default_params()
    {
        let params = CurveParams::default();
        assert_eq!(params.space_size, 2f64.powi(SPACE_BITS as i32));
        assert_eq!(params.max_trials, 9999);
        assert_eq!(params.tolerance, 1e-12);
    }

    #[test]
    fn test_for_bits_bounds()
    {
        assert_eq!(CurveParams::for_bits(16).unwrap(), CurveParams::default());
        assert_eq!(CurveParams::for_bits(1).unwrap().space_size, 2.0);
        assert!(matches!(CurveParams::for_bits(0), Err(BirthdayError::InvalidBits(0))));
        assert!(matches!(CurveParams::for_bits(65), Err(BirthdayError::InvalidBits(65))));
    }

    #[test]
    fn test_parameter_validation()
    {
        let params = CurveParams::default();
        assert!(matches!(params.with_max_trials(0), Err(BirthdayError::InvalidMaxTrials)));
        assert!(params.with_tolerance(-1e-9).is_err());
        assert!(params.with_tolerance(1.0).is_err());
        assert!(params.with_tolerance(f64::NAN).is_err());
        assert_eq!(params.with_tolerance(0.0).unwrap().tolerance, 0.0);
    }

    #[test]
    fn test_iterator_is_fused_after_saturation()
    {
        let params = CurveParams::for_bits(2).unwrap();
        let mut curve = CollisionCurve::new(params);
        let count = curve.by_ref().count();
        assert!(count < 100);
        assert!(curve.next().is_none());
        assert!(curve.next().is_none());
    }
}
