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

//! Spreadsheet workbooks (.xlsx / .xls) through calamine.

use super::delimited::disambiguate_headers;
use crate::error::{LoadError, LoadResult};
use crate::table::classify::excel_serial_to_datetime;
use crate::table::{classify_datetime, Cell, Column, ColumnKind, Table};
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Dimensions of one worksheet, gathered before any sheet is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInfo {
    /// Sheet name as stored in the workbook.
    pub name: String,
    /// 1-based last used row; 0 for an empty sheet.
    pub max_row: usize,
    /// 1-based last used column; 0 for an empty sheet.
    pub max_col: usize,
    /// More than a single cell is in use.
    pub has_data: bool,
    /// Rows below the header.
    pub estimated_records: usize,
}

/// Explicit sheet choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    /// Exact name, falling back to a case-insensitive match.
    Name(String),
    /// 1-based.
    Position(usize),
}

impl SheetSelector {
    /// Bare integers select by position; anything else by name.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<usize>() {
            Ok(position) => SheetSelector::Position(position),
            Err(_) => SheetSelector::Name(raw.to_string()),
        }
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::Name(name) => write!(f, "{name}"),
            SheetSelector::Position(position) => write!(f, "#{position}"),
        }
    }
}

/// Zero-based column indices selected by a spreadsheet-style range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRange {
    /// Range as the user wrote it.
    raw: String,
    /// Sorted, without repeats.
    columns: Vec<usize>,
}

impl ColumnRange {
    /// Accepts `A:D`, `B`, and comma lists such as `A,C:E`.
    pub fn parse(raw: &str) -> LoadResult<Self> {
        let invalid = |reason: &str| LoadError::InvalidRange {
            range: raw.to_string(),
            reason: reason.to_string(),
        };
        let mut columns = Vec::new();
        for part in raw.split(',').map(str::trim) {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }
            let (start, end) = match part.split_once(':') {
                Some((a, b)) => (column_index(a.trim()), column_index(b.trim())),
                None => (column_index(part), column_index(part)),
            };
            let (Some(start), Some(end)) = (start, end) else {
                return Err(invalid("column letters expected"));
            };
            if start > end {
                return Err(invalid("range start is after range end"));
            }
            for column in start..=end {
                if !columns.contains(&column) {
                    columns.push(column);
                }
            }
        }
        columns.sort_unstable();
        Ok(Self {
            raw: raw.to_string(),
            columns,
        })
    }
    /// Selected indices, ascending.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }
    /// Range text as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// `A` → 0, `Z` → 25, `AA` → 26.
fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    letters.chars().try_fold(0usize, |acc, ch| {
        ch.is_ascii_alphabetic()
            .then(|| acc * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1))
    })
    .map(|n| n - 1)
}

/// Opens any workbook format calamine recognises.
fn open(path: &Path) -> LoadResult<Sheets<BufReader<File>>> {
    open_workbook_auto(path).map_err(|e| LoadError::UnreadableFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Parsed cells of one sheet.
fn read_range(
    workbook: &mut Sheets<BufReader<File>>,
    path: &Path,
    sheet: &str,
) -> LoadResult<Range<Data>> {
    workbook
        .worksheet_range(sheet)
        .map_err(|e| LoadError::UnreadableFile {
            path: path.display().to_string(),
            reason: format!("sheet '{sheet}': {e}"),
        })
}

/// Dimensions of a parsed sheet.
fn sheet_info(name: &str, range: &Range<Data>) -> SheetInfo {
    let (max_row, max_col) = match range.end() {
        Some((row, col)) if !range.is_empty() => (row as usize + 1, col as usize + 1),
        _ => (0, 0),
    };
    let has_data = max_row > 1 || max_col > 1;
    SheetInfo {
        name: name.to_string(),
        max_row,
        max_col,
        has_data,
        estimated_records: if has_data { max_row.saturating_sub(1) } else { 0 },
    }
}

/// Every sheet of the workbook with its parsed cells, read through a single
/// handle.
fn survey(path: &Path) -> LoadResult<Vec<(SheetInfo, Range<Data>)>> {
    let mut workbook = open(path)?;
    let names: Vec<String> = workbook.sheet_names().to_vec();
    if names.is_empty() {
        return Err(LoadError::NoSheets {
            path: path.display().to_string(),
        });
    }
    let mut sheets = Vec::with_capacity(names.len());
    for name in &names {
        let range = read_range(&mut workbook, path, name)?;
        let info = sheet_info(name, &range);
        debug!(
            sheet = %info.name,
            max_row = info.max_row,
            max_col = info.max_col,
            estimated_records = info.estimated_records,
            "Inspected sheet"
        );
        sheets.push((info, range));
    }
    Ok(sheets)
}

/// Dimensions of every sheet in workbook order.
pub fn inventory(path: &Path) -> LoadResult<Vec<SheetInfo>> {
    Ok(survey(path)?.into_iter().map(|(info, _)| info).collect())
}

/// Largest estimated record count among sheets with data, preferring names
/// outside the blacklist. Ties go to the earlier sheet.
pub fn auto_select<'a>(sheets: &'a [SheetInfo], blacklist: &[String]) -> Option<&'a SheetInfo> {
    /// Earliest sheet with the most records.
    fn first_largest<'a>(
        candidates: impl Iterator<Item = &'a SheetInfo>,
    ) -> Option<&'a SheetInfo> {
        candidates.fold(None, |best: Option<&'a SheetInfo>, sheet| match best {
            Some(b) if b.estimated_records >= sheet.estimated_records => Some(b),
            _ => Some(sheet),
        })
    }
    let blacklisted = |sheet: &SheetInfo| {
        let lower = sheet.name.to_lowercase();
        blacklist.iter().any(|word| lower.contains(&word.to_lowercase()))
    };
    first_largest(sheets.iter().filter(|s| s.has_data && !blacklisted(s)))
        .or_else(|| first_largest(sheets.iter().filter(|s| s.has_data)))
        .or_else(|| sheets.first())
}

/// Sheet named or numbered by the selector.
fn resolve<'a>(sheets: &'a [SheetInfo], selector: &SheetSelector) -> LoadResult<&'a SheetInfo> {
    let found = match selector {
        SheetSelector::Name(name) => sheets
            .iter()
            .find(|s| s.name == *name)
            .or_else(|| sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name))),
        SheetSelector::Position(position) => position
            .checked_sub(1)
            .and_then(|index| sheets.get(index)),
    };
    found.ok_or_else(|| LoadError::SheetNotFound {
        requested: selector.to_string(),
        available: sheets
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Loaded sheet plus the inventory it was chosen from.
pub struct WorkbookSelection {
    /// Cells of the chosen sheet.
    pub table: Table,
    /// Name of the chosen sheet.
    pub sheet: String,
    /// Every sheet, chosen or not.
    pub inventory: Vec<SheetInfo>,
}

/// Chooses a sheet (explicitly or by size) and converts it, optionally
/// restricted to a column range, into a table.
pub fn read_workbook(
    path: &Path,
    selector: Option<&SheetSelector>,
    range: Option<&ColumnRange>,
    blacklist: &[String],
    temporal_formats: &[String],
) -> LoadResult<WorkbookSelection> {
    let (sheets, mut ranges): (Vec<SheetInfo>, Vec<Range<Data>>) =
        survey(path)?.into_iter().unzip();
    let chosen = match selector {
        Some(selector) => resolve(&sheets, selector)?,
        None => auto_select(&sheets, blacklist).ok_or_else(|| LoadError::NoSheets {
            path: path.display().to_string(),
        })?,
    };
    let sheet = chosen.name.clone();
    info!(sheet = %sheet, requested = ?selector, "Selected sheet");
    let index = sheets
        .iter()
        .position(|s| s.name == sheet)
        .unwrap_or_default();
    let data = ranges.swap_remove(index);
    let selection_label = match range {
        Some(range) => format!("{sheet}!{}", range.as_str()),
        None => sheet.clone(),
    };
    let table = range_to_table(&data, range, temporal_formats).ok_or(
        LoadError::EmptySelection {
            selection: selection_label,
        },
    )?;
    Ok(WorkbookSelection {
        table,
        sheet,
        inventory: sheets,
    })
}

/// Spreadsheet value to table cell. Booleans count as 0/1.
fn data_to_cell(data: &Data, temporal_formats: &[String]) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Float(v) if v.is_finite() => Cell::Number(*v),
        Data::Float(_) => Cell::Missing,
        Data::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Data::String(s) if s.trim().is_empty() => Cell::Missing,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => {
            excel_serial_to_datetime(dt.as_f64()).map_or(Cell::Missing, Cell::DateTime)
        }
        Data::DateTimeIso(s) => classify_datetime(s, temporal_formats)
            .value()
            .map_or_else(|| Cell::Text(s.clone()), Cell::DateTime),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// First row of the (restricted) range is the header. Fully empty rows and
/// columns are dropped; `None` when nothing remains.
fn range_to_table(
    data: &Range<Data>,
    range: Option<&ColumnRange>,
    temporal_formats: &[String],
) -> Option<Table> {
    let start_col = data.start().map_or(0, |(_, col)| col as usize);
    let grid: Vec<Vec<Cell>> = data
        .rows()
        .map(|row| {
            row.iter()
                .enumerate()
                .filter(|(offset, _)| {
                    range.map_or(true, |r| r.columns().contains(&(start_col + offset)))
                })
                .map(|(_, cell)| data_to_cell(cell, temporal_formats))
                .collect()
        })
        .collect();
    let mut rows: Vec<Vec<Cell>> = grid
        .into_iter()
        .filter(|row| row.iter().any(|c| !c.is_missing()))
        .collect();
    if rows.is_empty() {
        return None;
    }
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let used: Vec<bool> = (0..width)
        .map(|col| rows.iter().any(|row| row.get(col).is_some_and(|c| !c.is_missing())))
        .collect();
    for row in &mut rows {
        let mut flags = used.iter();
        row.retain(|_| *flags.next().unwrap_or(&false));
    }
    let header_row = rows.remove(0);
    let headers = disambiguate_headers(
        header_row
            .iter()
            .map(ToString::to_string)
            .collect(),
    );
    if rows.is_empty() {
        return None;
    }
    let table = Table::from_rows(headers, rows);
    let columns = table
        .columns()
        .iter()
        .cloned()
        .map(|column| match column.kind() {
            ColumnKind::Text => column.into_text(),
            _ => column,
        })
        .collect::<Vec<Column>>();
    Some(Table::new(columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(name: &str, max_row: usize) -> SheetInfo {
        SheetInfo {
            name: name.to_string(),
            max_row,
            max_col: 4,
            has_data: true,
            estimated_records: max_row - 1,
        }
    }

    fn blacklist() -> Vec<String> {
        vec!["summary".to_string(), "readme".to_string()]
    }

    #[test]
    fn column_letters_map_to_indices() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("z"), Some(25));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn ranges_accept_lists_and_spans() {
        let range = ColumnRange::parse("A, C:E").unwrap();
        assert_eq!(range.columns(), &[0, 2, 3, 4]);
        assert!(ColumnRange::parse("D:B").is_err());
        assert!(ColumnRange::parse("A,,B").is_err());
    }

    #[test]
    fn blacklisted_sheets_lose_to_data_sheets() {
        let sheets = vec![sheet("Summary", 500), sheet("Data", 20), sheet("More", 20)];
        assert_eq!(auto_select(&sheets, &blacklist()).unwrap().name, "Data");
    }

    #[test]
    fn blacklisted_sheet_is_used_when_nothing_else_has_data() {
        let sheets = vec![sheet("ReadMe", 3)];
        assert_eq!(auto_select(&sheets, &blacklist()).unwrap().name, "ReadMe");
    }

    #[test]
    fn positional_and_case_insensitive_selection() {
        let sheets = vec![sheet("First", 3), sheet("Second", 3)];
        assert_eq!(resolve(&sheets, &SheetSelector::Position(2)).unwrap().name, "Second");
        assert_eq!(
            resolve(&sheets, &SheetSelector::Name("first".into())).unwrap().name,
            "First"
        );
        assert!(resolve(&sheets, &SheetSelector::Position(0)).is_err());
        assert_eq!(SheetSelector::parse("2"), SheetSelector::Position(2));
    }
}
