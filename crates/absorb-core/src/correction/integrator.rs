//! Discretised attenuation integral over the volume elements of a solid.
//!
//! For every element the attenuation along its incident and scattered paths
//! is `exp(-μ(λᵢ)·L₁ - μ(λ_f)·L₂)`; the factor is the volume-weighted mean
//! of that over all elements. The exponential is a type parameter
//! ([`ExpKernel`]) so the per-element loop is monomorphised for the chosen
//! [`ExpMethod`](crate::types::ExpMethod) and never dispatches dynamically.

use std::marker::PhantomData;
use std::ops::Range;

use crate::types::{AttenuationModel, ElementSet, VolumeElement, WavelengthPairing};

/// Below this many terms sums are accumulated linearly.
pub const PAIRWISE_BLOCK: usize = 1000;

/// Sum `term(i)` over `range` by recursive halving.
///
/// Ranges of at most [`PAIRWISE_BLOCK`] terms are summed left to right, so
/// for small inputs the result is bit-identical to a plain loop.
pub fn pairwise_sum<F>(range: Range<usize>, term: &F) -> f64
where
    F: Fn(usize) -> f64,
{
    let len = range.end.saturating_sub(range.start);
    if len <= PAIRWISE_BLOCK {
        let mut acc = 0.0;
        for i in range {
            acc += term(i);
        }
        return acc;
    }
    let mid = range.start + len / 2;
    pairwise_sum(range.start..mid, term) + pairwise_sum(mid..range.end, term)
}

/// An exponential implementation selected once per run.
pub trait ExpKernel: Send + Sync + 'static {
    fn exp(x: f64) -> f64;
}

/// `f64::exp`.
pub struct ExactExp;

impl ExpKernel for ExactExp {
    #[inline]
    fn exp(x: f64) -> f64 {
        x.exp()
    }
}

/// [`fast_exp`].
pub struct FastExp;

impl ExpKernel for FastExp {
    #[inline]
    fn exp(x: f64) -> f64 {
        fast_exp(x)
    }
}

/// Largest high word of a finite `f64`.
const MAX_FINITE_HIGH_WORD: f64 = 2_146_435_071.0;

/// Schraudolph's approximation: the scaled argument is written straight
/// into the exponent bits of the high word of an IEEE-754 double.
///
/// Relative error is a few percent. Arguments below about -709 give 0.
#[inline]
pub fn fast_exp(x: f64) -> f64 {
    let high = 1_512_775.0 * x + 1_072_632_447.0;
    if high <= 0.0 || high.is_nan() {
        return 0.0;
    }
    let high = high.min(MAX_FINITE_HIGH_WORD) as u32;
    f64::from_bits(u64::from(high) << 32)
}

/// Volume-weighted mean of `exp(exponent(i))` over `elements`.
pub fn attenuation_mean<E, F>(elements: &[VolumeElement], total_volume: f64, exponent: F) -> f64
where
    E: ExpKernel,
    F: Fn(usize) -> f64,
{
    let sum = pairwise_sum(0..elements.len(), &|i| E::exp(exponent(i)) * elements[i].volume);
    sum / total_volume
}

/// Attenuation integrator for one solid of one material.
pub struct Integrator<'a, E> {
    elements: &'a ElementSet,
    model: &'a AttenuationModel,
    _exp: PhantomData<E>,
}

impl<'a, E: ExpKernel> Integrator<'a, E> {
    pub fn new(elements: &'a ElementSet, model: &'a AttenuationModel) -> Self {
        Self {
            elements,
            model,
            _exp: PhantomData,
        }
    }

    /// Factor for equal incident and final wavelength.
    pub fn elastic(&self, lambda: f64, scattered: &[f64]) -> f64 {
        let mu = -self.model.total(lambda);
        let els = self.elements.elements();
        attenuation_mean::<E, _>(els, self.elements.total_volume(), |i| {
            mu * (els[i].incident_path + scattered[i])
        })
    }

    /// Factor with separate attenuation along the incident and scattered paths.
    pub fn inelastic(&self, lambda_i: f64, lambda_f: f64, scattered: &[f64]) -> f64 {
        let mu_i = -self.model.total(lambda_i);
        let mu_f = -self.model.total(lambda_f);
        let els = self.elements.elements();
        attenuation_mean::<E, _>(els, self.elements.total_volume(), |i| {
            mu_i * els[i].incident_path + mu_f * scattered[i]
        })
    }

    /// Factor for the bin at wavelength `lambda` of a spectrum with the
    /// given pairing.
    pub fn evaluate(&self, pairing: &WavelengthPairing, lambda: f64, scattered: &[f64]) -> f64 {
        if pairing.is_elastic() {
            return self.elastic(lambda, scattered);
        }
        let (lambda_i, lambda_f) = pairing.pair(lambda);
        self.inelastic(lambda_i, lambda_f, scattered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LinearCoefficients, VolumeElement};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn elements(paths: &[(f64, f64)]) -> ElementSet {
        ElementSet::new(
            paths
                .iter()
                .enumerate()
                .map(|(i, &(l1, v))| VolumeElement {
                    position: Vector3::new(i as f64, 0.0, 0.0),
                    volume: v,
                    incident_path: l1,
                })
                .collect(),
        )
    }

    #[test]
    fn test_pairwise_matches_linear_below_block() {
        let term = |i: usize| 1.0 / (i as f64 + 1.0);
        let linear = (0..PAIRWISE_BLOCK).fold(0.0, |acc, i| acc + term(i));
        assert_eq!(pairwise_sum(0..PAIRWISE_BLOCK, &term).to_bits(), linear.to_bits());
    }

    #[test]
    fn test_pairwise_large_sum() {
        let n = 1_000_000;
        let sum = pairwise_sum(0..n, &|_| 0.1);
        assert_relative_eq!(sum, 100_000.0, max_relative = 1e-12);
    }

    #[test]
    fn test_fast_exp_accuracy() {
        for x in [-5.0, -1.0, -0.3, -0.01] {
            let rel = (fast_exp(x) - x.exp()).abs() / x.exp();
            assert!(rel < 0.07, "fast_exp({x}) off by {rel}");
        }
        assert_eq!(fast_exp(-1000.0), 0.0);
        assert!(fast_exp(-2.0) < fast_exp(-1.0));
    }

    #[test]
    fn test_elastic_single_element() {
        let set = elements(&[(0.01, 2.0)]);
        let model = AttenuationModel::elastic(LinearCoefficients::new(50.0, 10.0)).unwrap();
        let integrator = Integrator::<ExactExp>::new(&set, &model);
        // μ = 60 m⁻¹ at 1.8 Å, L = 0.01 + 0.02
        let expected = (-60.0f64 * 0.03).exp();
        assert_relative_eq!(integrator.elastic(1.8, &[0.02]), expected, max_relative = 1e-14);
    }

    #[test]
    fn test_inelastic_splits_paths() {
        let set = elements(&[(0.01, 1.0)]);
        let model = AttenuationModel::elastic(LinearCoefficients::new(18.0, 0.0)).unwrap();
        let integrator = Integrator::<ExactExp>::new(&set, &model);
        // μ(0.9) = 9, μ(3.6) = 36
        let expected = (-9.0f64 * 0.01 - 36.0 * 0.02).exp();
        assert_relative_eq!(
            integrator.inelastic(0.9, 3.6, &[0.02]),
            expected,
            max_relative = 1e-14
        );
    }

    #[test]
    fn test_zero_attenuation_is_exactly_one() {
        let set = elements(&[(0.01, 0.3), (0.02, 0.1), (0.0, 0.7)]);
        let model = AttenuationModel::elastic(LinearCoefficients::new(0.0, 0.0)).unwrap();
        let integrator = Integrator::<ExactExp>::new(&set, &model);
        assert_eq!(integrator.elastic(2.5, &[0.1, 0.0, 0.3]), 1.0);
        assert_eq!(integrator.inelastic(1.0, 4.0, &[0.1, 0.0, 0.3]), 1.0);
    }
}
