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

//! Statistical profiling of a cleaned [`Table`].
//!
//! [`Profiler::profile`] is a pure function of its input and never fails:
//! degenerate tables produce empty sections instead of errors.

use crate::chart::ChartType;
use crate::config::ProfilingConfig;
use crate::stats;
use crate::table::{Column, ColumnKind, Table};
use chrono::NaiveDateTime;
use polars::prelude::{ChunkAgg, Float64Chunked};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Summary of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericStats {
    /// Non-missing values.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Median.
    pub median: f64,
    /// Sample standard deviation; `None` below two values.
    pub std: Option<f64>,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// `max - min`.
    pub range: f64,
    /// Sample skewness; `None` when undefined.
    pub skewness: Option<f64>,
    /// Values outside the IQR fences.
    pub outlier_count: usize,
}

/// A value and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    /// Display form.
    pub value: String,
    /// Occurrences.
    pub count: usize,
}

/// Summary of a text column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalStats {
    /// Non-missing values.
    pub count: usize,
    /// Distinct values.
    pub unique_count: usize,
    /// Most common value.
    pub most_frequent: Option<ValueCount>,
    /// Most common values, most frequent first.
    pub top_values: Vec<ValueCount>,
    /// Share of the most frequent value among non-missing values, in percent.
    pub concentration: f64,
}

/// Typical spacing of a datetime column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// A day or more.
    Daily,
    /// An hour or more.
    Hourly,
    /// A minute or more.
    Minutely,
    /// Under a minute.
    Irregular,
}

impl Frequency {
    /// Lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Hourly => "hourly",
            Frequency::Minutely => "minutely",
            Frequency::Irregular => "irregular",
        }
    }

    /// Bucket for a gap in milliseconds.
    fn from_millis(delta: i64) -> Self {
        match delta {
            d if d >= 86_400_000 => Frequency::Daily,
            d if d >= 3_600_000 => Frequency::Hourly,
            d if d >= 60_000 => Frequency::Minutely,
            _ => Frequency::Irregular,
        }
    }
}

/// Summary of a datetime column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalStats {
    /// Non-missing values.
    pub count: usize,
    /// Earliest timestamp.
    pub min: NaiveDateTime,
    /// Latest timestamp.
    pub max: NaiveDateTime,
    /// Whole days between earliest and latest.
    pub range_days: i64,
    /// Distinct timestamps.
    pub unique_count: usize,
    /// Most common gap; `None` below two values.
    pub inferred_frequency: Option<Frequency>,
    /// Any value carries a time of day.
    pub has_time_component: bool,
}

/// Kind-specific summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnStats {
    /// Numeric column.
    Numeric(NumericStats),
    /// Text column.
    Categorical(CategoricalStats),
    /// Datetime column.
    Temporal(TemporalStats),
    /// No values.
    Empty,
}

/// One column's profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    /// Column name.
    pub name: String,
    /// Column kind.
    pub kind: ColumnKind,
    /// Missing cells.
    pub missing_count: usize,
    /// Missing cells as a share of rows, in percent.
    pub missing_percentage: f64,
    /// Kind-specific summary.
    pub stats: ColumnStats,
}

/// Missing cells of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingShare {
    /// Column name.
    pub column: String,
    /// Missing cells.
    pub count: usize,
    /// Share of rows, in percent.
    pub percentage: f64,
}

/// Table-wide completeness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    /// Missing cells in the table.
    pub total_missing: usize,
    /// Columns with missing cells.
    pub missing_by_column: Vec<MissingShare>,
    /// Rows without a missing cell.
    pub complete_rows: usize,
    /// Rows repeating an earlier row.
    pub duplicate_rows: usize,
    /// Rows times columns.
    pub total_cells: usize,
}

impl DataQuality {
    /// Percentage of non-missing cells; an empty table counts as complete.
    pub fn completeness(&self) -> f64 {
        if self.total_cells == 0 {
            return 100.0;
        }
        100.0 * (1.0 - self.total_missing as f64 / self.total_cells as f64)
    }
}

/// Pairwise Pearson coefficients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    /// Numeric columns in table order.
    pub columns: Vec<String>,
    /// Row-major, `values[i][j]` pairs `columns[i]` with `columns[j]`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Coefficient for two named columns.
    pub fn get(&self, first: &str, second: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == first)?;
        let j = self.columns.iter().position(|c| c == second)?;
        self.values[i][j]
    }
    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }
    /// No columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Direction of a strong correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    /// r at or above the threshold.
    StrongPositive,
    /// r at or below minus the threshold.
    StrongNegative,
}

impl CorrelationStrength {
    /// Human label.
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationStrength::StrongPositive => "strong positive",
            CorrelationStrength::StrongNegative => "strong negative",
        }
    }
}

/// A column pair with |r| past the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrongCorrelation {
    /// Earlier column.
    pub first: String,
    /// Later column.
    pub second: String,
    /// Pearson r.
    pub coefficient: f64,
    /// Direction.
    pub strength: CorrelationStrength,
}

/// How skewed a column is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkewLevel {
    /// Past the moderate threshold.
    Moderate,
    /// Past the high threshold.
    High,
}

impl SkewLevel {
    /// Lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SkewLevel::Moderate => "moderate",
            SkewLevel::High => "high",
        }
    }
}

/// A column with notable skew.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkewedColumn {
    /// Column name.
    pub column: String,
    /// Sample skewness.
    pub skewness: f64,
    /// Severity.
    pub level: SkewLevel,
}

/// Suggested category and value pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grouping {
    /// Grouping column.
    pub category: String,
    /// Aggregated numeric column.
    pub value: String,
    /// Chart suited to the pair.
    pub chart: ChartType,
}

/// Heuristic observations about the table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternSet {
    /// Skewed numeric columns.
    pub skewed: Vec<SkewedColumn>,
    /// Columns whose names suggest time.
    pub time_series_candidates: Vec<String>,
    /// Columns that look like identifiers.
    pub id_like: Vec<String>,
    /// Text columns with many distinct values.
    pub high_cardinality: Vec<String>,
    /// Suggested groupings.
    pub groupings: Vec<Grouping>,
}

/// Everything the profiler learned about a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub columns: usize,
    /// Per-column profiles in table order.
    pub column_profiles: Vec<ColumnProfile>,
    /// Numeric column names.
    pub numeric_columns: Vec<String>,
    /// Text column names.
    pub categorical_columns: Vec<String>,
    /// Datetime column names.
    pub datetime_columns: Vec<String>,
    /// Completeness figures.
    pub quality: DataQuality,
    /// Matrix over numeric columns, when there are at least two.
    pub correlation: Option<CorrelationMatrix>,
    /// Pairs past the strong threshold.
    pub strong_correlations: Vec<StrongCorrelation>,
    /// Heuristic observations.
    pub patterns: PatternSet,
    /// Leading rows rendered as display strings; missing cells are empty.
    pub sample_rows: Vec<Vec<String>>,
}

/// Headline numbers carried into run reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSummary {
    /// Row count.
    pub rows: usize,
    /// Column count.
    pub columns: usize,
    /// Numeric columns.
    pub numeric_columns: usize,
    /// Text columns.
    pub categorical_columns: usize,
    /// Datetime columns.
    pub datetime_columns: usize,
    /// Strong pairs.
    pub strong_correlations: usize,
    /// Non-missing share, in percent.
    pub completeness: f64,
}

impl DatasetProfile {
    /// Profile of the named column.
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.column_profiles.iter().find(|c| c.name == name)
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.column_profiles.iter().map(|c| c.name.as_str())
    }

    /// Whether the table had the named column.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_profiles.iter().any(|c| c.name == name)
    }

    /// Headline numbers.
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            rows: self.rows,
            columns: self.columns,
            numeric_columns: self.numeric_columns.len(),
            categorical_columns: self.categorical_columns.len(),
            datetime_columns: self.datetime_columns.len(),
            strong_correlations: self.strong_correlations.len(),
            completeness: self.quality.completeness(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text report for the terminal.
    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str("Dataset Profile\n===============\n\n");
        report.push_str(&format!("Rows: {}\n", self.rows));
        report.push_str(&format!("Columns: {}\n", self.columns));
        report.push_str(&format!(
            "Completeness: {:.1}%\n",
            self.quality.completeness()
        ));
        report.push_str(&format!(
            "Complete rows: {}, duplicate rows: {}\n\n",
            self.quality.complete_rows, self.quality.duplicate_rows
        ));

        report.push_str("Columns\n-------\n");
        for column in &self.column_profiles {
            report.push_str(&format!(
                "  {} ({}, {:.1}% missing)",
                column.name,
                column.kind.as_str(),
                column.missing_percentage
            ));
            match &column.stats {
                ColumnStats::Numeric(s) => report.push_str(&format!(
                    ": mean {:.2}, median {:.2}, range {:.2}..{:.2}, outliers {}",
                    s.mean, s.median, s.min, s.max, s.outlier_count
                )),
                ColumnStats::Categorical(s) => {
                    report.push_str(&format!(": {} unique", s.unique_count));
                    if let Some(top) = &s.most_frequent {
                        report.push_str(&format!(
                            ", top '{}' ({:.1}%)",
                            top.value, s.concentration
                        ));
                    }
                }
                ColumnStats::Temporal(s) => report.push_str(&format!(
                    ": {} to {} ({} days)",
                    s.min.format("%Y-%m-%d"),
                    s.max.format("%Y-%m-%d"),
                    s.range_days
                )),
                ColumnStats::Empty => {}
            }
            report.push('\n');
        }

        if !self.strong_correlations.is_empty() {
            report.push_str("\nStrong correlations\n-------------------\n");
            for c in &self.strong_correlations {
                report.push_str(&format!(
                    "  {} ~ {}: {:.3} ({})\n",
                    c.first,
                    c.second,
                    c.coefficient,
                    c.strength.as_str()
                ));
            }
        }

        let patterns = &self.patterns;
        if !patterns.skewed.is_empty() {
            report.push_str("\nSkewed columns: ");
            let items: Vec<String> = patterns
                .skewed
                .iter()
                .map(|s| format!("{} ({})", s.column, s.level.as_str()))
                .collect();
            report.push_str(&items.join(", "));
            report.push('\n');
        }
        if !patterns.id_like.is_empty() {
            report.push_str(&format!("ID-like columns: {}\n", patterns.id_like.join(", ")));
        }
        if !patterns.time_series_candidates.is_empty() {
            report.push_str(&format!(
                "Time-series candidates: {}\n",
                patterns.time_series_candidates.join(", ")
            ));
        }
        report
    }
}

impl fmt::Display for DatasetProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

/// Computes [`DatasetProfile`]s.
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    /// Thresholds.
    config: ProfilingConfig,
}

impl Profiler {
    /// Profiler with the given thresholds.
    pub fn new(config: ProfilingConfig) -> Self {
        Self { config }
    }

    /// Active thresholds.
    pub fn config(&self) -> &ProfilingConfig {
        &self.config
    }

    /// Profiles `table`.
    pub fn profile(&self, table: &Table) -> DatasetProfile {
        let rows = table.row_count();
        let column_profiles: Vec<ColumnProfile> = table
            .columns()
            .iter()
            .map(|c| self.profile_column(c, rows))
            .collect();

        let numeric_columns = table.numeric_column_names();
        let categorical_columns = table.categorical_column_names();
        let datetime_columns = table.datetime_column_names();

        let correlation =
            (numeric_columns.len() >= 2).then(|| correlation_matrix(table, &numeric_columns));
        let strong_correlations = correlation
            .as_ref()
            .map(|m| strong_pairs(m, self.config.strong_correlation))
            .unwrap_or_default();

        let patterns = self.detect_patterns(
            table,
            &column_profiles,
            &categorical_columns,
            &numeric_columns,
        );

        let profile = DatasetProfile {
            rows,
            columns: table.column_count(),
            quality: data_quality(table, &column_profiles),
            sample_rows: sample_rows(table, self.config.sample_rows),
            column_profiles,
            numeric_columns,
            categorical_columns,
            datetime_columns,
            correlation,
            strong_correlations,
            patterns,
        };
        debug!(
            rows = profile.rows,
            columns = profile.columns,
            strong_correlations = profile.strong_correlations.len(),
            "Profiled dataset"
        );
        profile
    }

    /// Profile of one column.
    fn profile_column(&self, column: &Column, rows: usize) -> ColumnProfile {
        let kind = column.kind();
        let stats = match kind {
            ColumnKind::Numeric => numeric_stats(&column.to_float64(), self.config.iqr_multiplier)
                .map_or(ColumnStats::Empty, ColumnStats::Numeric),
            ColumnKind::Text => {
                ColumnStats::Categorical(categorical_stats(column, self.config.top_values))
            }
            ColumnKind::DateTime => temporal_stats(&column.datetimes())
                .map_or(ColumnStats::Empty, ColumnStats::Temporal),
            ColumnKind::Empty => ColumnStats::Empty,
        };
        let missing_count = column.missing_count();
        ColumnProfile {
            name: column.name().to_string(),
            kind,
            missing_count,
            missing_percentage: percentage(missing_count, rows),
            stats,
        }
    }

    /// Skew, time-series, identifier, cardinality and grouping heuristics.
    fn detect_patterns(
        &self,
        table: &Table,
        profiles: &[ColumnProfile],
        categorical: &[String],
        numeric: &[String],
    ) -> PatternSet {
        let mut patterns = PatternSet::default();
        let rows = table.row_count();

        for profile in profiles {
            match &profile.stats {
                ColumnStats::Numeric(NumericStats {
                    skewness: Some(skew),
                    ..
                }) if skew.abs() > self.config.moderate_skew => {
                    let level = if skew.abs() > self.config.high_skew {
                        SkewLevel::High
                    } else {
                        SkewLevel::Moderate
                    };
                    patterns.skewed.push(SkewedColumn {
                        column: profile.name.clone(),
                        skewness: *skew,
                        level,
                    });
                }
                ColumnStats::Categorical(stats) if rows > 0 => {
                    let ratio = stats.unique_count as f64 / rows as f64;
                    if ratio > self.config.id_ratio {
                        patterns.id_like.push(profile.name.clone());
                    } else if stats.unique_count > self.config.high_cardinality {
                        patterns.high_cardinality.push(profile.name.clone());
                    }
                }
                _ => {}
            }

            let lowered = profile.name.to_lowercase();
            if self
                .config
                .time_series_keywords
                .iter()
                .any(|k| lowered.contains(&k.to_lowercase()))
            {
                patterns.time_series_candidates.push(profile.name.clone());
            }
        }

        let limit = self.config.grouping_columns;
        for category in categorical.iter().take(limit) {
            for value in numeric.iter().take(limit) {
                patterns.groupings.push(Grouping {
                    category: category.clone(),
                    value: value.clone(),
                    chart: ChartType::Bar,
                });
            }
        }
        patterns
    }
}

/// `part` as a percentage of `whole`; zero for an empty whole.
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Summary of the non-null values; `None` when there are none.
pub fn numeric_stats(values: &Float64Chunked, iqr_multiplier: f64) -> Option<NumericStats> {
    let min = values.min()?;
    let max = values.max()?;
    Some(NumericStats {
        count: stats::count(values),
        mean: stats::mean(values)?,
        median: stats::median(values)?,
        std: stats::sample_std(values),
        min,
        max,
        range: max - min,
        skewness: stats::skewness(values),
        outlier_count: stats::iqr_outlier_count(values, iqr_multiplier),
    })
}

/// Frequency ranking of non-missing values. Equal counts keep first-seen order.
pub fn value_counts(column: &Column) -> Vec<ValueCount> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<ValueCount> = Vec::new();
    for label in column.labels() {
        match index.get(&label) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(label.clone(), counts.len());
                counts.push(ValueCount {
                    value: label,
                    count: 1,
                });
            }
        }
    }
    // stable sort keeps first-seen order among ties
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Value counts and concentration of a text column.
fn categorical_stats(column: &Column, top: usize) -> CategoricalStats {
    let ranked = value_counts(column);
    let count = column.non_missing_count();
    let most_frequent = ranked.first().cloned();
    let concentration = most_frequent
        .as_ref()
        .map_or(0.0, |m| percentage(m.count, count));
    CategoricalStats {
        count,
        unique_count: ranked.len(),
        most_frequent,
        top_values: ranked.into_iter().take(top).collect(),
        concentration,
    }
}

/// Summary of timestamps; `None` when there are none.
pub fn temporal_stats(values: &[NaiveDateTime]) -> Option<TemporalStats> {
    let mut sorted = values.to_vec();
    sorted.sort();
    let min = *sorted.first()?;
    let max = *sorted.last()?;
    let mut unique = sorted.clone();
    unique.dedup();
    Some(TemporalStats {
        count: sorted.len(),
        min,
        max,
        range_days: (max - min).num_days(),
        unique_count: unique.len(),
        inferred_frequency: infer_frequency(&sorted),
        has_time_component: sorted.iter().any(|dt| dt.time() != chrono::NaiveTime::MIN),
    })
}

/// Classifies the most common gap between consecutive sorted timestamps.
/// Ties between equally common gaps go to the shorter gap.
fn infer_frequency(sorted: &[NaiveDateTime]) -> Option<Frequency> {
    if sorted.len() < 2 {
        return None;
    }
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for pair in sorted.windows(2) {
        *counts
            .entry((pair[1] - pair[0]).num_milliseconds())
            .or_insert(0) += 1;
    }
    let (delta, _) = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))?;
    Some(Frequency::from_millis(delta))
}

/// Pairwise-complete Pearson correlation over the named numeric columns.
pub fn correlation_matrix(table: &Table, columns: &[String]) -> CorrelationMatrix {
    let series: Vec<Float64Chunked> = columns
        .iter()
        .map(|name| {
            table
                .column(name)
                .map_or_else(|| stats::float64(&[]), Column::to_float64)
        })
        .collect();

    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = if i == j {
                stats::pearson(&series[i], &series[j]).map(|_| 1.0)
            } else {
                stats::pearson(&series[i], &series[j])
            };
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    }
}

/// Off-diagonal pairs with `|r|` strictly above the threshold, upper triangle only.
pub fn strong_pairs(matrix: &CorrelationMatrix, threshold: f64) -> Vec<StrongCorrelation> {
    let mut pairs = Vec::new();
    for i in 0..matrix.len() {
        for j in (i + 1)..matrix.len() {
            let Some(r) = matrix.values[i][j] else {
                continue;
            };
            if r.abs() > threshold {
                pairs.push(StrongCorrelation {
                    first: matrix.columns[i].clone(),
                    second: matrix.columns[j].clone(),
                    coefficient: r,
                    strength: if r > 0.0 {
                        CorrelationStrength::StrongPositive
                    } else {
                        CorrelationStrength::StrongNegative
                    },
                });
            }
        }
    }
    pairs
}

/// Completeness figures from the column profiles.
fn data_quality(table: &Table, profiles: &[ColumnProfile]) -> DataQuality {
    DataQuality {
        total_missing: profiles.iter().map(|p| p.missing_count).sum(),
        missing_by_column: profiles
            .iter()
            .map(|p| MissingShare {
                column: p.name.clone(),
                count: p.missing_count,
                percentage: p.missing_percentage,
            })
            .collect(),
        complete_rows: table.complete_row_count(),
        duplicate_rows: table.duplicate_flags().into_iter().filter(|d| *d).count(),
        total_cells: table.row_count() * table.column_count(),
    }
}

/// First `limit` rows as display strings.
fn sample_rows(table: &Table, limit: usize) -> Vec<Vec<String>> {
    (0..table.row_count().min(limit))
        .map(|i| table.row(i).into_iter().map(ToString::to_string).collect())
        .collect()
}
