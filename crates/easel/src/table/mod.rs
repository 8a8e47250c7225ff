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

//! In-memory columnar table.
//!
//! A [`Table`] is an ordered list of named [`Column`]s of equal length. Each
//! column holds [`Cell`]s of a single kind plus [`Cell::Missing`] markers.

pub mod classify;

pub use classify::{classify_datetime, classify_number, DateTimeParse, NumberParse};

use chrono::NaiveDateTime;
use polars::prelude::{Float64Chunked, NewChunkedArray};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One table value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Absent or null.
    Missing,
    /// Finite number.
    Number(f64),
    /// Text.
    Text(String),
    /// Timestamp without zone.
    DateTime(NaiveDateTime),
}

impl Cell {
    /// True for [`Cell::Missing`].
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
    /// Numeric value, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
    /// Text value, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
    /// Timestamp, if any.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
    /// Hashable form used for duplicate detection.
    pub(crate) fn key(&self) -> CellKey<'_> {
        match self {
            Cell::Missing => CellKey::Missing,
            // -0.0 and 0.0 compare equal, so they must hash equal
            Cell::Number(v) => CellKey::Number(if *v == 0.0 { 0 } else { v.to_bits() }),
            Cell::Text(s) => CellKey::Text(s),
            Cell::DateTime(dt) => CellKey::DateTime(*dt),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Number(v) => write!(f, "{}", format_number(*v)),
            Cell::Text(s) => f.write_str(s),
            Cell::DateTime(dt) => {
                if dt.time() == chrono::NaiveTime::MIN {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

/// Whole numbers print without a fractional part.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Hashable mirror of [`Cell`]; numbers compare by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum CellKey<'a> {
    /// Absent.
    Missing,
    /// `f64` bits, with both zeros folded.
    Number(u64),
    /// Borrowed text.
    Text(&'a str),
    /// Timestamp.
    DateTime(NaiveDateTime),
}

/// What a column's non-missing cells hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Numbers.
    Numeric,
    /// Text, or a mix of kinds.
    Text,
    /// Timestamps.
    DateTime,
    /// Every cell is missing.
    Empty,
}

impl ColumnKind {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Text => "text",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Empty => "empty",
        }
    }
}

/// Named cells, one per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Header.
    name: String,
    /// Values in row order.
    cells: Vec<Cell>,
}

impl Column {
    /// Column from raw cells.
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
    /// All-numeric column.
    pub fn from_numbers(name: impl Into<String>, values: &[f64]) -> Self {
        Self::new(name, values.iter().map(|v| Cell::Number(*v)).collect())
    }
    /// All-text column.
    pub fn from_texts(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(
            name,
            values.iter().map(|v| Cell::Text((*v).to_string())).collect(),
        )
    }
    /// Header.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// Renames the column.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
    /// Values in row order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
    /// Mutable values.
    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }
    /// Row count.
    pub fn len(&self) -> usize {
        self.cells.len()
    }
    /// No rows.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
    /// Kind of the non-missing cells. A column mixing kinds reports `Text`.
    pub fn kind(&self) -> ColumnKind {
        let mut kind = ColumnKind::Empty;
        for cell in &self.cells {
            let cell_kind = match cell {
                Cell::Missing => continue,
                Cell::Number(_) => ColumnKind::Numeric,
                Cell::Text(_) => return ColumnKind::Text,
                Cell::DateTime(_) => ColumnKind::DateTime,
            };
            if kind == ColumnKind::Empty {
                kind = cell_kind;
            } else if kind != cell_kind {
                return ColumnKind::Text;
            }
        }
        kind
    }
    /// Missing cells.
    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }
    /// Present cells.
    pub fn non_missing_count(&self) -> usize {
        self.len() - self.missing_count()
    }
    /// Every cell is missing.
    pub fn is_all_missing(&self) -> bool {
        self.cells.iter().all(Cell::is_missing)
    }
    /// Non-missing numeric values in row order.
    pub fn numbers(&self) -> Vec<f64> {
        self.cells.iter().filter_map(Cell::as_number).collect()
    }
    /// Numeric cells as a polars array aligned with the rows; every other
    /// cell becomes null.
    pub fn to_float64(&self) -> Float64Chunked {
        Float64Chunked::from_iter_options(
            self.name.as_str().into(),
            self.cells.iter().map(Cell::as_number),
        )
    }
    /// Non-missing timestamps in row order.
    pub fn datetimes(&self) -> Vec<NaiveDateTime> {
        self.cells.iter().filter_map(Cell::as_datetime).collect()
    }
    /// Non-missing values rendered as strings, in row order.
    pub fn labels(&self) -> Vec<String> {
        self.cells
            .iter()
            .filter(|c| !c.is_missing())
            .map(ToString::to_string)
            .collect()
    }
    /// Rewrites every non-missing cell as text.
    pub fn into_text(self) -> Self {
        let cells = self
            .cells
            .into_iter()
            .map(|cell| match cell {
                Cell::Missing | Cell::Text(_) => cell,
                other => Cell::Text(other.to_string()),
            })
            .collect();
        Self {
            name: self.name,
            cells,
        }
    }
    /// Keeps cells whose flag is `true`.
    fn retain(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.cells.retain(|_| *flags.next().unwrap_or(&true));
    }
}

/// Ordered, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Columns in header order.
    columns: Vec<Column>,
}

impl Table {
    /// Shorter columns are padded with missing cells to the longest length.
    pub fn new(mut columns: Vec<Column>) -> Self {
        let rows = columns.iter().map(Column::len).max().unwrap_or(0);
        for column in &mut columns {
            column.cells.resize(rows, Cell::Missing);
        }
        Self { columns }
    }

    /// Builds a table from row-major cells. Short rows are padded with missing cells.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();
        for row in rows {
            let mut cells = row.into_iter();
            for column in &mut columns {
                column.cells.push(cells.next().unwrap_or(Cell::Missing));
            }
        }
        Self { columns }
    }

    /// Row count.
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }
    /// Column count.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
    /// No rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0 || self.columns.is_empty()
    }
    /// Columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
    /// Mutable columns.
    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }
    /// Column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
    /// Position of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
    /// Headers in order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
    /// Cell at `row` of the `column`th column.
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.columns.get(column)?.cells.get(row)
    }
    /// One row's cells, left to right.
    pub fn row(&self, index: usize) -> Vec<&Cell> {
        self.columns
            .iter()
            .filter_map(|c| c.cells.get(index))
            .collect()
    }
    /// Swaps in `column` at `index`; out-of-range indexes are ignored.
    pub fn replace_column(&mut self, index: usize, column: Column) {
        if let Some(slot) = self.columns.get_mut(index) {
            *slot = column;
        }
    }
    /// Appends `column`, padding every column to the longest with missing cells.
    pub fn push_column(&mut self, column: Column) {
        self.columns.push(column);
        let rows = self.columns.iter().map(Column::len).max().unwrap_or(0);
        for column in &mut self.columns {
            column.cells.resize(rows, Cell::Missing);
        }
    }

    /// Keeps rows whose flag is `true`; returns how many were removed.
    pub fn retain_rows(&mut self, keep: &[bool]) -> usize {
        let before = self.row_count();
        for column in &mut self.columns {
            column.retain(keep);
        }
        before - self.row_count()
    }

    /// Keeps columns matching the predicate; returns how many were removed.
    pub fn retain_columns<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Column) -> bool,
    {
        let before = self.columns.len();
        self.columns.retain(|c| predicate(c));
        before - self.columns.len()
    }

    /// Names of columns of `kind`.
    pub fn names_of_kind(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind() == kind)
            .map(|c| c.name.clone())
            .collect()
    }
    /// Numeric column names.
    pub fn numeric_column_names(&self) -> Vec<String> {
        self.names_of_kind(ColumnKind::Numeric)
    }
    /// Text columns are the categorical columns.
    pub fn categorical_column_names(&self) -> Vec<String> {
        self.names_of_kind(ColumnKind::Text)
    }
    /// Datetime column names.
    pub fn datetime_column_names(&self) -> Vec<String> {
        self.names_of_kind(ColumnKind::DateTime)
    }

    /// Per row, whether an identical row appeared earlier.
    pub fn duplicate_flags(&self) -> Vec<bool> {
        let rows = self.row_count();
        let mut seen: HashSet<Vec<CellKey<'_>>> = HashSet::with_capacity(rows);
        (0..rows)
            .map(|row| {
                let key: Vec<CellKey<'_>> = self
                    .columns
                    .iter()
                    .map(|c| c.cells[row].key())
                    .collect();
                !seen.insert(key)
            })
            .collect()
    }

    /// Rows with no missing cell.
    pub fn complete_row_count(&self) -> usize {
        (0..self.row_count())
            .filter(|row| self.columns.iter().all(|c| !c.cells[*row].is_missing()))
            .count()
    }
}
