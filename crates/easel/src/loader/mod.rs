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

//! Source detection and loading.
//!
//! The extension decides the reader: `.csv` goes through encoding recovery
//! and the CSV parser, `.xlsx`/`.xls` through sheet inventory and selection.

pub mod delimited;
pub mod workbook;

pub use delimited::{decode_with_fallback, parse_delimited, TextEncoding};
pub use workbook::{auto_select, ColumnRange, SheetInfo, SheetSelector};

use crate::config::LoaderConfig;
use crate::error::{LoadError, LoadResult};
use crate::table::Table;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Reader family chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// `.csv`.
    Delimited,
    /// `.xlsx` or `.xls`.
    Spreadsheet,
}

impl SourceKind {
    /// Kind for `path`; unknown extensions are rejected.
    pub fn detect(path: &Path) -> LoadResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(SourceKind::Delimited),
            "xlsx" | "xls" => Ok(SourceKind::Spreadsheet),
            _ => Err(LoadError::UnsupportedFormat { extension }),
        }
    }
}

/// Where a table came from.
#[derive(Debug, Clone, Serialize)]
pub struct SourceMetadata {
    /// Reader used.
    pub kind: SourceKind,
    /// Input path.
    pub path: PathBuf,
    /// Encoding that decoded a delimited file.
    pub encoding: Option<TextEncoding>,
    /// Sheet read from a workbook.
    pub sheet: Option<String>,
    /// Column range applied, normalised.
    pub range: Option<String>,
    /// Every sheet in the workbook.
    pub inventory: Vec<SheetInfo>,
}

impl SourceMetadata {
    /// File name without directories, used in titles.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A table with its provenance.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    /// Loaded rows.
    pub table: Table,
    /// Provenance.
    pub source: SourceMetadata,
}

/// Caller's workbook selection.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Sheet to read; auto-selected when absent.
    pub sheet: Option<SheetSelector>,
    /// Column range such as `A:F`.
    pub range: Option<String>,
}

/// Workbook inventory for `list-sheets`.
#[derive(Debug, Clone, Serialize)]
pub struct SheetListing {
    /// Every sheet, in workbook order.
    pub sheets: Vec<SheetInfo>,
    /// Sheet a load without a selector would read.
    pub auto_selected: Option<String>,
}

/// Reads supported files into tables.
pub struct Loader {
    /// Encodings and sheet blacklist.
    config: LoaderConfig,
    /// Formats used to type workbook date cells.
    temporal_formats: Vec<String>,
}

impl Loader {
    /// Loader with the given settings.
    pub fn new(config: LoaderConfig, temporal_formats: Vec<String>) -> Self {
        Self {
            config,
            temporal_formats,
        }
    }

    /// Reads `path` with the reader its extension selects.
    pub fn load(&self, path: &Path, options: &LoadOptions) -> LoadResult<LoadedTable> {
        match SourceKind::detect(path)? {
            SourceKind::Delimited => {
                if options.sheet.is_some() || options.range.is_some() {
                    warn!(
                        path = %path.display(),
                        "Sheet and range options ignored for delimited input"
                    );
                }
                let (table, encoding) = delimited::read_delimited(path, &self.config.encodings)?;
                Ok(LoadedTable {
                    table,
                    source: SourceMetadata {
                        kind: SourceKind::Delimited,
                        path: path.to_path_buf(),
                        encoding: Some(encoding),
                        sheet: None,
                        range: None,
                        inventory: Vec::new(),
                    },
                })
            }
            SourceKind::Spreadsheet => {
                let range = options
                    .range
                    .as_deref()
                    .map(ColumnRange::parse)
                    .transpose()?;
                let selection = workbook::read_workbook(
                    path,
                    options.sheet.as_ref(),
                    range.as_ref(),
                    &self.config.sheet_blacklist,
                    &self.temporal_formats,
                )?;
                Ok(LoadedTable {
                    table: selection.table,
                    source: SourceMetadata {
                        kind: SourceKind::Spreadsheet,
                        path: path.to_path_buf(),
                        encoding: None,
                        sheet: Some(selection.sheet),
                        range: range.map(|r| r.as_str().to_string()),
                        inventory: selection.inventory,
                    },
                })
            }
        }
    }

    /// Inventories a workbook without loading it.
    pub fn list_sheets(&self, path: &Path) -> LoadResult<SheetListing> {
        if SourceKind::detect(path)? != SourceKind::Spreadsheet {
            return Err(LoadError::NotAWorkbook {
                path: path.display().to_string(),
            });
        }
        let sheets = workbook::inventory(path)?;
        let auto_selected =
            auto_select(&sheets, &self.config.sheet_blacklist).map(|s| s.name.clone());
        Ok(SheetListing {
            sheets,
            auto_selected,
        })
    }
}
