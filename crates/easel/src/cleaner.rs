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

//! Table repair.
//!
//! [`Cleaner::clean`] runs ten passes in a fixed order. Every pass is also
//! public on its own, reports how many rows or values it touched, and leaves
//! an already-clean table unchanged.

use crate::config::{CleaningConfig, KeyColumnPolicy};
use crate::error::{CleanError, CleanResult, ConfigError, ConfigResult};
use crate::loader::delimited::disambiguate_headers;
use crate::logging::log_pass;
use crate::stats;
use crate::table::{
    classify_datetime, classify_number, Cell, Column, ColumnKind, DateTimeParse, NumberParse,
    Table,
};
use chrono::{Local, Months, NaiveDateTime};
use polars::prelude::Float64Chunked;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

/// Upper bound on clip-and-recompute rounds per column.
const MAX_CAPPING_ROUNDS: usize = 100_000;

/// Share of σ a value may sit beyond a capping bound and still count as inside.
const CAPPING_TOLERANCE: f64 = 1e-9;

/// Cleaning passes in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningPass {
    /// Empty rows and columns, header names.
    StructuralTrim,
    /// Whitespace, null literals, opaque-id rows.
    TextNormalization,
    /// Rows missing key-column values.
    KeyColumns,
    /// Exact duplicate rows.
    Deduplication,
    /// Text columns retyped as numbers or datetimes.
    TypeCoercion,
    /// Rows outside the IQR fences.
    IqrOutliers,
    /// Values beyond mean ± k·σ.
    ExtremeValueCapping,
    /// Rows dated past the horizon.
    FutureDates,
    /// Opening plus allocated against closing.
    BalanceConsistency,
    /// Emptied columns and the minimum row count.
    FinalValidation,
}

impl CleaningPass {
    /// Every pass, in the order [`Cleaner::clean`] runs them.
    pub const ALL: [CleaningPass; 10] = [
        CleaningPass::StructuralTrim,
        CleaningPass::TextNormalization,
        CleaningPass::KeyColumns,
        CleaningPass::Deduplication,
        CleaningPass::TypeCoercion,
        CleaningPass::IqrOutliers,
        CleaningPass::ExtremeValueCapping,
        CleaningPass::FutureDates,
        CleaningPass::BalanceConsistency,
        CleaningPass::FinalValidation,
    ];

    /// Stable snake_case name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            CleaningPass::StructuralTrim => "structural_trim",
            CleaningPass::TextNormalization => "text_normalization",
            CleaningPass::KeyColumns => "key_columns",
            CleaningPass::Deduplication => "deduplication",
            CleaningPass::TypeCoercion => "type_coercion",
            CleaningPass::IqrOutliers => "iqr_outliers",
            CleaningPass::ExtremeValueCapping => "extreme_value_capping",
            CleaningPass::FutureDates => "future_dates",
            CleaningPass::BalanceConsistency => "balance_consistency",
            CleaningPass::FinalValidation => "final_validation",
        }
    }
}

/// One pass's effect.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Which pass ran.
    pub pass: CleaningPass,
    /// Rows, cells or columns it touched.
    pub affected: usize,
}

/// IQR result for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    /// Column name.
    pub column: String,
    /// Rows outside the fences, removed or not.
    pub flagged: usize,
    /// Flagged rows were dropped.
    pub removed: bool,
}

/// A column that changed type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coercion {
    /// Column name.
    pub column: String,
    /// New kind.
    pub kind: ColumnKind,
    /// Values that parsed.
    pub converted: usize,
    /// Values that failed to convert and became missing.
    pub invalidated: usize,
}

/// Everything [`Cleaner::clean`] did to a table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningReport {
    /// Rows and columns before cleaning.
    pub input_shape: (usize, usize),
    /// Rows and columns after cleaning.
    pub output_shape: (usize, usize),
    /// Per-pass counts in execution order.
    pub passes: Vec<PassReport>,
    /// Duplicate rows dropped.
    pub duplicates_removed: usize,
    /// Columns retyped.
    pub coercions: Vec<Coercion>,
    /// Columns with IQR outliers.
    pub outliers: Vec<OutlierReport>,
    /// Cells clipped to the σ bounds.
    pub capped_values: usize,
    /// Rows dropped for future dates.
    pub future_dates_removed: usize,
    /// Rows failing the balance check, when it applies.
    pub balance_inconsistencies: Option<usize>,
}

impl CleaningReport {
    /// Count recorded for `pass`, if it ran.
    pub fn affected(&self, pass: CleaningPass) -> Option<usize> {
        self.passes
            .iter()
            .find(|p| p.pass == pass)
            .map(|p| p.affected)
    }
    /// Sum over all passes.
    pub fn total_affected(&self) -> usize {
        self.passes.iter().map(|p| p.affected).sum()
    }
    /// Logs and appends a pass result.
    fn record(&mut self, pass: CleaningPass, affected: usize, table: &Table) {
        log_pass(pass.name(), affected, table.row_count());
        self.passes.push(PassReport { pass, affected });
    }
}

/// Runs the cleaning passes over a table.
pub struct Cleaner {
    /// Thresholds and policies.
    config: CleaningConfig,
    /// Compiled opaque identifier pattern.
    opaque_id: Regex,
    /// Reference time for the future-date pass.
    now: NaiveDateTime,
}

impl Cleaner {
    /// Compiles the opaque-id pattern; fails on an invalid regex.
    pub fn new(config: CleaningConfig) -> ConfigResult<Self> {
        let opaque_id =
            Regex::new(&config.opaque_id_pattern).map_err(|e| ConfigError::InvalidValue {
                field: "cleaning.opaque_id_pattern".to_string(),
                value: e.to_string(),
            })?;
        Ok(Self {
            config,
            opaque_id,
            now: Local::now().naive_local(),
        })
    }

    /// Fixes "now" for the future-date pass.
    pub fn with_reference_time(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Runs every pass and reports what each changed.
    pub fn clean(&self, mut table: Table) -> CleanResult<(Table, CleaningReport)> {
        let mut report = CleaningReport {
            input_shape: (table.row_count(), table.column_count()),
            ..CleaningReport::default()
        };

        let affected = self.structural_trim(&mut table);
        report.record(CleaningPass::StructuralTrim, affected, &table);

        let affected = self.normalize_text(&mut table);
        report.record(CleaningPass::TextNormalization, affected, &table);

        let affected = self.filter_key_columns(&mut table);
        report.record(CleaningPass::KeyColumns, affected, &table);

        let affected = self.deduplicate(&mut table);
        report.duplicates_removed = affected;
        report.record(CleaningPass::Deduplication, affected, &table);

        report.coercions = self.coerce_types(&mut table);
        let affected = report
            .coercions
            .iter()
            .map(|c| c.converted + c.invalidated)
            .sum();
        report.record(CleaningPass::TypeCoercion, affected, &table);

        report.outliers = self.handle_iqr_outliers(&mut table);
        let affected: usize = report.outliers.iter().map(|o| o.flagged).sum();
        report.record(CleaningPass::IqrOutliers, affected, &table);

        report.capped_values = self.cap_extreme_values(&mut table);
        report.record(CleaningPass::ExtremeValueCapping, report.capped_values, &table);

        report.future_dates_removed = self.remove_future_dates(&mut table);
        report.record(CleaningPass::FutureDates, report.future_dates_removed, &table);

        report.balance_inconsistencies = self.check_balance(&table);
        if let Some(inconsistent) = report.balance_inconsistencies.filter(|n| *n > 0) {
            warn!(rows = inconsistent, "Balance columns do not reconcile");
        }
        let affected = report.balance_inconsistencies.unwrap_or(0);
        report.record(CleaningPass::BalanceConsistency, affected, &table);

        let affected = self.finalize(&mut table)?;
        report.record(CleaningPass::FinalValidation, affected, &table);

        report.output_shape = (table.row_count(), table.column_count());
        info!(
            rows_in = report.input_shape.0,
            rows_out = report.output_shape.0,
            columns_out = report.output_shape.1,
            duplicates = report.duplicates_removed,
            capped = report.capped_values,
            "Cleaning complete"
        );
        Ok((table, report))
    }

    /// Drops fully-missing rows and columns and normalises column names.
    /// Returns rows plus columns removed.
    pub fn structural_trim(&self, table: &mut Table) -> usize {
        let keep: Vec<bool> = (0..table.row_count())
            .map(|row| table.row(row).iter().any(|c| !c.is_missing()))
            .collect();
        let rows = table.retain_rows(&keep);
        let columns = table.retain_columns(|c| !c.is_all_missing());
        let names: Vec<String> = table
            .columns()
            .iter()
            .map(|c| normalize_column_name(c.name()))
            .collect();
        for (column, name) in table.columns_mut().iter_mut().zip(disambiguate_headers(names)) {
            if column.name() != name {
                column.set_name(name);
            }
        }
        rows + columns
    }

    /// Trims and collapses whitespace, nulls literal missing markers, and
    /// removes rows carrying an opaque identifier cell. Returns cells changed
    /// plus rows removed.
    pub fn normalize_text(&self, table: &mut Table) -> usize {
        let mut changed = 0;
        for column in table.columns_mut() {
            for cell in column.cells_mut() {
                let Cell::Text(text) = cell else { continue };
                let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
                let replacement = if collapsed.is_empty()
                    || self.config.null_literals.iter().any(|n| *n == collapsed)
                {
                    Cell::Missing
                } else {
                    Cell::Text(collapsed)
                };
                if *cell != replacement {
                    *cell = replacement;
                    changed += 1;
                }
            }
        }
        let keep: Vec<bool> = (0..table.row_count())
            .map(|row| {
                !table
                    .row(row)
                    .iter()
                    .any(|c| c.as_text().is_some_and(|t| self.opaque_id.is_match(t)))
            })
            .collect();
        changed + table.retain_rows(&keep)
    }

    /// Applies the key-column policy. Returns rows removed.
    pub fn filter_key_columns(&self, table: &mut Table) -> usize {
        let keys: Vec<usize> = match &self.config.key_columns {
            KeyColumnPolicy::Leading(n) => (0..(*n).min(table.column_count())).collect(),
            KeyColumnPolicy::Named(names) => names
                .iter()
                .filter_map(|name| table.column_index(name))
                .collect(),
            KeyColumnPolicy::Disabled => Vec::new(),
        };
        if keys.is_empty() {
            return 0;
        }
        let keep: Vec<bool> = (0..table.row_count())
            .map(|row| {
                keys.iter()
                    .all(|col| table.cell(row, *col).is_some_and(|c| !c.is_missing()))
            })
            .collect();
        table.retain_rows(&keep)
    }

    /// Drops repeated rows, keeping the first. Returns rows removed.
    pub fn deduplicate(&self, table: &mut Table) -> usize {
        let keep: Vec<bool> = table.duplicate_flags().into_iter().map(|d| !d).collect();
        table.retain_rows(&keep)
    }

    /// Retypes text columns: datetime for date/time-named columns when any
    /// value parses, numeric when more than the threshold share parses.
    pub fn coerce_types(&self, table: &mut Table) -> Vec<Coercion> {
        let mut coercions = Vec::new();
        for index in 0..table.column_count() {
            let column = &table.columns()[index];
            if column.kind() != ColumnKind::Text {
                continue;
            }
            let lower = column.name().to_lowercase();
            let datetime_named = self
                .config
                .datetime_keywords
                .iter()
                .any(|k| lower.contains(&k.to_lowercase()));
            let converted = if datetime_named {
                self.coerce_datetime(column)
                    .or_else(|| self.coerce_numeric(column))
            } else {
                self.coerce_numeric(column)
            };
            if let Some((column, coercion)) = converted {
                info!(
                    column = %coercion.column,
                    kind = coercion.kind.as_str(),
                    invalidated = coercion.invalidated,
                    "Coerced column type"
                );
                table.replace_column(index, column);
                coercions.push(coercion);
            }
        }
        coercions
    }

    /// Datetime version of `column`, if any value parses.
    fn coerce_datetime(&self, column: &Column) -> Option<(Column, Coercion)> {
        let parsed: Vec<Option<DateTimeParse>> = column
            .cells()
            .iter()
            .map(|c| {
                c.as_text()
                    .map(|t| classify_datetime(t, &self.config.temporal_formats))
            })
            .collect();
        let successes = parsed
            .iter()
            .filter(|p| matches!(p, Some(DateTimeParse::DateTime(_))))
            .count();
        if successes == 0 {
            return None;
        }
        let invalidated = column.non_missing_count() - successes;
        let cells = parsed
            .into_iter()
            .map(|p| p.and_then(DateTimeParse::value).map_or(Cell::Missing, Cell::DateTime))
            .collect();
        Some((
            Column::new(column.name(), cells),
            Coercion {
                column: column.name().to_string(),
                kind: ColumnKind::DateTime,
                converted: successes,
                invalidated,
            },
        ))
    }

    /// Numeric version of `column`, if enough values parse.
    fn coerce_numeric(&self, column: &Column) -> Option<(Column, Coercion)> {
        let parsed: Vec<Option<NumberParse>> = column
            .cells()
            .iter()
            .map(|c| c.as_text().map(classify_number))
            .collect();
        let non_missing = column.non_missing_count();
        let successes = parsed
            .iter()
            .filter(|p| matches!(p, Some(NumberParse::Number(_))))
            .count();
        if non_missing == 0
            || successes as f64 / non_missing as f64 <= self.config.numeric_coercion_threshold
        {
            return None;
        }
        let cells = parsed
            .into_iter()
            .map(|p| p.and_then(NumberParse::value).map_or(Cell::Missing, Cell::Number))
            .collect();
        Some((
            Column::new(column.name(), cells),
            Coercion {
                column: column.name().to_string(),
                kind: ColumnKind::Numeric,
                converted: successes,
                invalidated: non_missing - successes,
            },
        ))
    }

    /// Flags values outside the IQR fences column by column. A column's
    /// flagged rows are removed only when they exceed the configured share
    /// of the current table. Removal shifts the quartiles, so the sweep
    /// repeats until no column removes anything. A column's report counts
    /// every removed row plus whatever the final sweep still flags.
    pub fn handle_iqr_outliers(&self, table: &mut Table) -> Vec<OutlierReport> {
        // (column, rows removed, flagged in the latest sweep without removal)
        let mut tally: Vec<(String, usize, usize)> = Vec::new();
        loop {
            let mut removed_any = false;
            for name in table.numeric_column_names() {
                let Some(index) = table.column_index(&name) else {
                    continue;
                };
                let values = table.columns()[index].to_float64();
                let flags: Vec<bool> = stats::iqr_bounds(&values, self.config.iqr_multiplier)
                    .map(|(low, high)| {
                        values
                            .into_iter()
                            .map(|v| v.is_some_and(|v| v < low || v > high))
                            .collect()
                    })
                    .unwrap_or_default();
                let flagged = flags.iter().filter(|f| **f).count();
                let position = tally.iter().position(|(column, ..)| *column == name);
                if flagged == 0 {
                    if let Some(i) = position {
                        tally[i].2 = 0;
                    }
                    continue;
                }
                let removed =
                    flagged as f64 > self.config.iqr_removal_fraction * table.row_count() as f64;
                if removed {
                    let keep: Vec<bool> = flags.iter().map(|f| !f).collect();
                    table.retain_rows(&keep);
                    removed_any = true;
                }
                info!(column = %name, flagged, removed, "IQR outliers");
                let entry = match position {
                    Some(i) => &mut tally[i],
                    None => {
                        tally.push((name, 0, 0));
                        let last = tally.len() - 1;
                        &mut tally[last]
                    }
                };
                if removed {
                    entry.1 += flagged;
                    entry.2 = 0;
                } else {
                    entry.2 = flagged;
                }
            }
            if !removed_any {
                break;
            }
        }
        tally
            .into_iter()
            .filter(|(_, removed, flagged)| removed + flagged > 0)
            .map(|(column, removed, flagged)| OutlierReport {
                column,
                flagged: removed + flagged,
                removed: removed > 0,
            })
            .collect()
    }

    /// Clips values beyond mean ± k·σ to the bound. Clipping narrows σ, so
    /// the bounds are recomputed and the clip repeated until every value
    /// sits inside the bounds of the clipped column. Returns cells changed.
    pub fn cap_extreme_values(&self, table: &mut Table) -> usize {
        let mut capped = 0;
        for column in table.columns_mut() {
            if column.kind() != ColumnKind::Numeric {
                continue;
            }
            let original = column.to_float64();
            let Some(clipped) = self.clip_to_fixed_point(&original) else {
                continue;
            };
            for (cell, value) in column.cells_mut().iter_mut().zip(&clipped) {
                if let (Cell::Number(v), Some(value)) = (cell, value) {
                    if *v != value {
                        *v = value;
                        capped += 1;
                    }
                }
            }
        }
        capped
    }

    /// `None` when nothing lies outside the bounds.
    fn clip_to_fixed_point(&self, values: &Float64Chunked) -> Option<Float64Chunked> {
        let sigma = self.config.capping_sigma;
        let mut current: Option<Float64Chunked> = None;
        for _ in 0..MAX_CAPPING_ROUNDS {
            let column = current.as_ref().unwrap_or(values);
            let (Some(mean), Some(std)) = (stats::mean(column), stats::sample_std(column)) else {
                return current;
            };
            if std <= 0.0 {
                return current;
            }
            let (low, high) = (mean - sigma * std, mean + sigma * std);
            let slack = std * CAPPING_TOLERANCE;
            let outside = column
                .into_iter()
                .flatten()
                .any(|v| v < low - slack || v > high + slack);
            if !outside {
                return current;
            }
            let next: Float64Chunked = column
                .into_iter()
                .map(|v| v.map(|v| v.clamp(low, high)))
                .collect();
            current = Some(next);
        }
        warn!(
            rounds = MAX_CAPPING_ROUNDS,
            "Extreme value capping did not settle"
        );
        current
    }

    /// Latest acceptable date.
    pub fn future_horizon(&self) -> NaiveDateTime {
        let months = Months::new(12 * self.config.future_horizon_years.max(0) as u32);
        self.now.checked_add_months(months).unwrap_or(NaiveDateTime::MAX)
    }

    /// Drops rows with any date past the horizon. Returns rows removed.
    pub fn remove_future_dates(&self, table: &mut Table) -> usize {
        let horizon = self.future_horizon();
        let datetime_columns: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind() == ColumnKind::DateTime)
            .map(|(i, _)| i)
            .collect();
        if datetime_columns.is_empty() {
            return 0;
        }
        let keep: Vec<bool> = (0..table.row_count())
            .map(|row| {
                datetime_columns.iter().all(|col| {
                    table
                        .cell(row, *col)
                        .and_then(Cell::as_datetime)
                        .map_or(true, |v| v <= horizon)
                })
            })
            .collect();
        table.retain_rows(&keep)
    }

    /// Rows where `opening + allocated` differs from `closing` by more than
    /// the tolerance. `None` unless all three columns exist and are numeric.
    pub fn check_balance(&self, table: &Table) -> Option<usize> {
        let balance = &self.config.balance;
        let column = |name: &str| {
            table
                .column(name)
                .filter(|c| c.kind() == ColumnKind::Numeric)
        };
        let opening = column(&balance.opening)?;
        let allocated = column(&balance.allocated)?;
        let closing = column(&balance.closing)?;
        let inconsistent = (0..table.row_count())
            .filter(|row| {
                match (
                    opening.cells()[*row].as_number(),
                    allocated.cells()[*row].as_number(),
                    closing.cells()[*row].as_number(),
                ) {
                    (Some(o), Some(a), Some(c)) => (o + a - c).abs() > balance.tolerance,
                    _ => false,
                }
            })
            .count();
        Some(inconsistent)
    }

    /// Drops columns emptied by earlier passes and enforces the minimum row count.
    pub fn finalize(&self, table: &mut Table) -> CleanResult<usize> {
        let dropped = table.retain_columns(|c| !c.is_all_missing());
        if table.row_count() < self.config.min_rows || table.column_count() == 0 {
            return Err(CleanError::InsufficientData {
                remaining: table.row_count(),
                minimum: self.config.min_rows,
            });
        }
        Ok(dropped)
    }
}

/// Strips whitespace and byte order marks.
fn normalize_column_name(name: &str) -> String {
    name.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .to_string()
}
