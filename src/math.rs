//! Elementary vector and statistics helpers used by the classifiers.
//!
//! All results are `f64` regardless of the feature type.

use std::f64::consts::PI;

use crate::common_types::{Data, Feature};

/// Minkowski (Lp) distance between two vectors of equal, non-zero length.
///
/// Mismatched or empty inputs, and `p = 0`, log an error and yield `0.0`, so
/// callers that care must check them themselves. `p = 1` is Manhattan,
/// `p = 2` Euclidean.
pub fn lp<F: Feature>(a: &[F], b: &[F], p: u32) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        log::error!(
            "lp distance needs equal, non-empty vectors (got {} and {})",
            a.len(),
            b.len()
        );
        return 0.0;
    }
    if p == 0 {
        log::error!("lp distance needs p >= 1");
        return 0.0;
    }
    // factor out the largest gap so high exponents neither overflow nor underflow
    let gaps = || a.iter().zip(b).map(|(&x, &y)| -> f64 { (x - y).abs().as_() });
    let largest = gaps().fold(0.0, f64::max);
    if largest == 0.0 {
        return 0.0;
    }
    let exponent = i32::try_from(p).ok();
    let sum_of_powers: f64 = gaps()
        .map(|gap| {
            let ratio = gap / largest;
            exponent.map_or_else(|| ratio.powf(f64::from(p)), |e| ratio.powi(e))
        })
        .sum();
    largest * sum_of_powers.powf(1.0 / f64::from(p))
}

pub fn dot<F: Feature>(a: &[F], b: &[F]) -> f64 {
    if a.len() != b.len() {
        log::error!("dimensions of the two input vectors are not aligned");
        return 0.0;
    }
    a.iter().zip(b).map(|(&x, &y)| x.as_() * y.as_()).sum()
}

/// Element-wise sum; mismatched lengths log an error and yield an empty vector.
pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.len() != b.len() {
        log::error!("dimensions of the two input vectors are not aligned");
        return Vec::new();
    }
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

pub fn scale<F: Feature>(v: &[F], factor: f64) -> Vec<f64> {
    v.iter().map(|&x| x.as_() * factor).collect()
}

/// Matrix of pairwise dot products between the rows of `x`.
pub fn gram<F: Feature>(x: &Data<F>) -> Vec<Vec<f64>> {
    x.rows()
        .iter()
        .map(|a| x.rows().iter().map(|b| dot(a, b)).collect())
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn stdev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// `+1.0` unless the sign bit is set.
pub fn sign(v: f64) -> f64 {
    if v.is_sign_negative() { -1.0 } else { 1.0 }
}

/// Natural log of the normal density at `x`.
pub fn gaussian_log_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    -0.5 * z * z - (sigma * (2.0 * PI).sqrt()).ln()
}
