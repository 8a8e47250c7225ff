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

//! Data reductions feeding the chart builders.

use crate::stats;
use crate::table::{format_number, Cell, Column, ColumnKind, Table};
use polars::prelude::ChunkAgg;
use std::collections::BTreeMap;

/// Sum of `value` per distinct `key` label, keys ascending, first `limit` kept.
/// Rows with a missing key are skipped; missing values add nothing.
pub fn group_sum(key: &Column, value: &Column, limit: usize) -> Vec<(String, f64)> {
    let mut groups: BTreeMap<String, f64> = BTreeMap::new();
    for (k, v) in key.cells().iter().zip(value.cells()) {
        if k.is_missing() {
            continue;
        }
        let total = groups.entry(k.to_string()).or_insert(0.0);
        if let Some(v) = v.as_number() {
            *total += v;
        }
    }
    groups.into_iter().take(limit).collect()
}

/// One histogram bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    /// Lower edge.
    pub low: f64,
    /// Upper edge.
    pub high: f64,
    /// Values in the bin.
    pub count: usize,
}

impl Bin {
    /// `low-high` with whole numbers shown plainly.
    pub fn label(&self) -> String {
        format!("{}-{}", short(self.low), short(self.high))
    }
}

/// Compact edge text.
fn short(v: f64) -> String {
    if v.fract().abs() < 1e-9 {
        format_number(v.round())
    } else {
        format!("{v:.2}")
    }
}

/// Equal-width bins over `[min, max]`, the last bin closed on the right.
/// A constant series gets a unit-wide range around its value.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let bins = bins.max(1);
    let values = stats::float64(values);
    let (Some(first), Some(last)) = (values.min(), values.max()) else {
        return Vec::new();
    };
    let (low, high) = if last > first {
        (first, last)
    } else {
        (first - 0.5, last + 0.5)
    };
    let width = (high - low) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values.into_iter().flatten() {
        let index = (((v - low) / width).floor() as usize).min(bins - 1);
        counts[index] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            low: low + width * i as f64,
            high: if i + 1 == bins {
                high
            } else {
                low + width * (i + 1) as f64
            },
            count,
        })
        .collect()
}

/// Non-empty bins ordered by count descending, ties in bin order.
pub fn binned_counts(values: &[f64], bins: usize) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = histogram(values, bins)
        .into_iter()
        .filter(|b| b.count > 0)
        .map(|b| (b.label(), b.count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// `(column, mean)` for the first `limit` numeric columns with values.
pub fn column_means(table: &Table, limit: usize) -> Vec<(String, f64)> {
    table
        .columns()
        .iter()
        .filter(|c| c.kind() == ColumnKind::Numeric)
        .take(limit)
        .filter_map(|c| Some((c.name().to_string(), stats::mean(&c.to_float64())?)))
        .collect()
}

/// `(column, mean, std)` for every numeric column with values.
pub fn column_summaries(table: &Table) -> Vec<(String, f64, f64)> {
    table
        .columns()
        .iter()
        .filter(|c| c.kind() == ColumnKind::Numeric)
        .filter_map(|c| {
            let values = c.to_float64();
            let mean = stats::mean(&values)?;
            Some((
                c.name().to_string(),
                mean,
                stats::sample_std(&values).unwrap_or(0.0),
            ))
        })
        .collect()
}

/// How many columns the table has of each kind, in first-seen order.
pub fn kind_distribution(table: &Table) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for column in table.columns() {
        let label = column.kind().as_str();
        match counts.iter_mut().find(|(k, _)| k == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Paired rows where both cells are numeric, sorted by x.
pub fn sorted_pairs(x: &Column, y: &Column) -> Vec<(f64, f64)> {
    let mut pairs: Vec<(f64, f64)> = x
        .cells()
        .iter()
        .zip(y.cells())
        .filter_map(|(a, b)| Some((axis_value(a)?, b.as_number()?)))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    pairs
}

/// Numbers as-is, datetimes as seconds since the epoch.
pub fn axis_value(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(v) => Some(*v),
        Cell::DateTime(dt) => Some(dt.and_utc().timestamp() as f64),
        _ => None,
    }
}
