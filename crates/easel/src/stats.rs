// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Descriptive statistics shared by the cleaner, profiler and renderer.
//!
//! Everything here reads a polars [`Float64Chunked`]; nulls are skipped.
//! Standard deviation is always the sample (n - 1) estimator and quantiles
//! use linear interpolation between closest ranks.

use polars::prelude::*;

/// Builds a null-free array from plain values.
pub fn float64(values: &[f64]) -> Float64Chunked {
    Float64Chunked::from_slice("values".into(), values)
}

/// Number of non-null values.
pub fn count(values: &Float64Chunked) -> usize {
    values.len() - values.null_count()
}

/// Mean of the non-null values.
pub fn mean(values: &Float64Chunked) -> Option<f64> {
    values.mean()
}

/// Sample standard deviation; `None` below two values.
pub fn sample_std(values: &Float64Chunked) -> Option<f64> {
    if count(values) < 2 {
        return None;
    }
    values.std(1)
}

/// Linear-interpolated quantile, `q` in `[0, 1]`.
pub fn quantile(values: &Float64Chunked, q: f64) -> Option<f64> {
    values
        .quantile(q.clamp(0.0, 1.0), QuantileMethod::Linear)
        .ok()
        .flatten()
}

/// 0.5 quantile.
pub fn median(values: &Float64Chunked) -> Option<f64> {
    values.median()
}

/// Fences `[Q1 - k·IQR, Q3 + k·IQR]`, or `None` when the IQR is not positive.
pub fn iqr_bounds(values: &Float64Chunked, multiplier: f64) -> Option<(f64, f64)> {
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    (iqr > 0.0).then(|| (q1 - multiplier * iqr, q3 + multiplier * iqr))
}

/// Values outside the IQR fences for `multiplier`.
pub fn iqr_outlier_count(values: &Float64Chunked, multiplier: f64) -> usize {
    iqr_bounds(values, multiplier).map_or(0, |(low, high)| {
        values
            .into_iter()
            .filter(|v| v.is_some_and(|v| v < low || v > high))
            .count()
    })
}

/// Adjusted Fisher-Pearson sample skewness. Needs more than three values and
/// nonzero spread.
pub fn skewness(values: &Float64Chunked) -> Option<f64> {
    let n = count(values);
    if n <= 3 {
        return None;
    }
    let mean = mean(values)?;
    let std = sample_std(values)?;
    if std <= f64::EPSILON * mean.abs().max(1.0) {
        return None;
    }
    let n = n as f64;
    let cubed: f64 = values
        .into_iter()
        .flatten()
        .map(|v| ((v - mean) / std).powi(3))
        .sum();
    Some(n / ((n - 1.0) * (n - 2.0)) * cubed)
}

/// Pearson correlation over the rows where both sides are present. `None`
/// when either side has no variance or fewer than two such rows exist.
pub fn pearson(x: &Float64Chunked, y: &Float64Chunked) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .into_iter()
        .zip(y)
        .filter_map(|(a, b)| Some((a?, b?)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    let (xs, ys) = (float64(&xs), float64(&ys));
    let dx = &xs - xs.mean()?;
    let dy = &ys - ys.mean()?;
    let cov = (&dx * &dy).sum()?;
    let var_x = (&dx * &dx).sum()?;
    let var_y = (&dy * &dy).sum()?;
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_interpolate_linearly() {
        let values = float64(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(quantile(&values, 0.25), Some(1.75));
        assert_eq!(quantile(&values, 0.5), Some(2.5));
        assert_eq!(quantile(&values, 0.75), Some(3.25));
    }

    #[test]
    fn sample_std_uses_n_minus_one() {
        let std = sample_std(&float64(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0])).unwrap();
        assert!((std - 2.138_089_935).abs() < 1e-6);
        assert_eq!(sample_std(&float64(&[1.0])), None);
    }

    #[test]
    fn nulls_are_skipped() {
        let values = Float64Chunked::from_iter_options(
            "v".into(),
            [Some(1.0), None, Some(3.0)].into_iter(),
        );
        assert_eq!(count(&values), 2);
        assert_eq!(mean(&values), Some(2.0));
        assert_eq!(median(&values), Some(2.0));
    }

    #[test]
    fn constant_values_have_no_iqr_fences() {
        let flat = float64(&[5.0, 5.0, 5.0, 5.0]);
        assert_eq!(iqr_bounds(&flat, 1.5), None);
        assert_eq!(iqr_outlier_count(&flat, 1.5), 0);
    }

    #[test]
    fn skewness_matches_adjusted_estimator() {
        let skew = skewness(&float64(&[1.0, 2.0, 3.0, 4.0, 10.0])).unwrap();
        assert!((skew - 1.697_056_27).abs() < 1e-6);
        assert_eq!(skewness(&float64(&[1.0, 2.0, 3.0])), None);
    }

    #[test]
    fn pearson_detects_perfect_and_degenerate_relations() {
        let x = float64(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let y = float64(&[1.0, 3.0, 5.0, 7.0, 9.0]);
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        let flat = float64(&[3.0; 5]);
        assert_eq!(pearson(&x, &flat), None);
    }

    #[test]
    fn pearson_uses_complete_pairs_only() {
        let x = Float64Chunked::from_iter_options(
            "x".into(),
            [Some(1.0), Some(2.0), None, Some(3.0)].into_iter(),
        );
        let y = Float64Chunked::from_iter_options(
            "y".into(),
            [Some(2.0), Some(4.0), Some(100.0), Some(6.0)].into_iter(),
        );
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
    }
}
