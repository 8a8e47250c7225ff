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

use easel::error::LoadError;
use easel::loader::TextEncoding;
use easel::{
    Cell, Cleaner, CleaningConfig, ColumnKind, LoadOptions, Loader, LoaderConfig, SheetSelector,
};
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn loader() -> Loader {
    Loader::new(
        LoaderConfig::default(),
        easel::config::default_temporal_formats(),
    )
}

/// A "Summary" sheet with a few notes and a larger "Data" sheet.
fn write_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("report.xlsx");
    let mut workbook = Workbook::new();

    let summary = workbook.add_worksheet();
    summary.set_name("Summary").unwrap();
    summary.write_string(0, 0, "Note").unwrap();
    summary.write_string(1, 0, "Quarterly export").unwrap();

    let data = workbook.add_worksheet();
    data.set_name("Data").unwrap();
    data.write_string(0, 0, "Region").unwrap();
    data.write_string(0, 1, "Revenue").unwrap();
    data.write_string(0, 2, "Units").unwrap();
    let rows = [
        ("North", 1200.0, 12.0),
        ("South", 900.0, 9.0),
        ("East", 1500.0, 15.0),
        ("West", 700.0, 7.0),
        ("North", 1100.0, 11.0),
        ("South", 950.0, 10.0),
    ];
    for (i, (region, revenue, units)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        data.write_string(row, 0, *region).unwrap();
        data.write_number(row, 1, *revenue).unwrap();
        data.write_number(row, 2, *units).unwrap();
    }

    workbook.save(&path).unwrap();
    path
}

#[test]
fn byte_order_mark_does_not_survive_cleaning() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bom.csv");
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"Name,Score\nada,1\nbob,2\n");
    fs::write(&path, bytes).unwrap();

    let loaded = loader().load(&path, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.source.encoding, Some(TextEncoding::Utf8));
    let (table, _) = Cleaner::new(CleaningConfig::lenient())
        .unwrap()
        .clean(loaded.table)
        .unwrap();
    assert_eq!(table.column_names(), vec!["Name", "Score"]);
    assert_eq!(table.column("Score").unwrap().kind(), ColumnKind::Numeric);
}

#[test]
fn latin1_bytes_fall_back_after_utf8_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("latin.csv");
    fs::write(&path, b"City,Visitors\nCaf\xe9 Town,10\nM\xfcnster,20\n").unwrap();

    let loaded = loader().load(&path, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.source.encoding, Some(TextEncoding::Latin1));
    assert_eq!(
        loaded.table.cell(0, 0),
        Some(&Cell::Text("Café Town".to_string()))
    );
    assert_eq!(
        loaded.table.cell(1, 0),
        Some(&Cell::Text("Münster".to_string()))
    );
}

#[test]
fn plain_utf8_is_tried_first() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.csv");
    fs::write(&path, "City,Visitors\nZürich,5\n").unwrap();

    let loaded = loader().load(&path, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.source.encoding, Some(TextEncoding::Utf8));
    assert_eq!(loaded.source.file_name(), "plain.csv");
}

#[test]
fn undecodable_bytes_fail_when_only_utf8_is_allowed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("strict.csv");
    fs::write(&path, b"City\nCaf\xe9\n").unwrap();
    let strict = Loader::new(
        LoaderConfig {
            encodings: vec![TextEncoding::Utf8],
            ..LoaderConfig::default()
        },
        Vec::new(),
    );

    let err = strict.load(&path, &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, LoadError::UnreadableFile { .. }));
    assert!(err.to_string().contains("utf-8"));
}

#[test]
fn missing_file_is_unreadable() {
    let dir = TempDir::new().unwrap();
    let err = loader()
        .load(&dir.path().join("absent.csv"), &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(err, LoadError::UnreadableFile { .. }));
}

#[test]
fn workbook_listing_skips_metadata_sheets() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path());

    let listing = loader().list_sheets(&path).unwrap();
    let names: Vec<&str> = listing.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Summary", "Data"]);
    assert!(listing.sheets.iter().all(|s| s.has_data));
    assert_eq!(listing.auto_selected.as_deref(), Some("Data"));
}

#[test]
fn workbook_loads_the_auto_selected_sheet() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path());

    let loaded = loader().load(&path, &LoadOptions::default()).unwrap();
    assert_eq!(loaded.source.sheet.as_deref(), Some("Data"));
    assert_eq!(loaded.source.inventory.len(), 2);
    assert_eq!(loaded.table.row_count(), 6);
    assert_eq!(loaded.table.column_names(), vec!["Region", "Revenue", "Units"]);
    assert_eq!(loaded.table.column("Revenue").unwrap().numbers()[2], 1500.0);
}

#[test]
fn explicit_sheet_and_range_are_honoured() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path());

    let by_position = loader()
        .load(
            &path,
            &LoadOptions {
                sheet: Some(SheetSelector::parse("1")),
                range: None,
            },
        )
        .unwrap();
    assert_eq!(by_position.source.sheet.as_deref(), Some("Summary"));
    assert_eq!(by_position.table.column_names(), vec!["Note"]);

    let ranged = loader()
        .load(
            &path,
            &LoadOptions {
                sheet: Some(SheetSelector::parse("Data")),
                range: Some("A:B".to_string()),
            },
        )
        .unwrap();
    assert_eq!(ranged.table.column_names(), vec!["Region", "Revenue"]);
    assert_eq!(ranged.source.range.as_deref(), Some("A:B"));
}

#[test]
fn unknown_sheet_lists_what_exists() {
    let dir = TempDir::new().unwrap();
    let path = write_workbook(dir.path());

    let err = loader()
        .load(
            &path,
            &LoadOptions {
                sheet: Some(SheetSelector::parse("Pivot")),
                range: None,
            },
        )
        .unwrap_err();
    match err {
        LoadError::SheetNotFound {
            requested,
            available,
        } => {
            assert_eq!(requested, "Pivot");
            assert!(available.contains("Summary"));
            assert!(available.contains("Data"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn listing_sheets_of_a_csv_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flat.csv");
    fs::write(&path, "a\n1\n").unwrap();
    assert!(matches!(
        loader().list_sheets(&path),
        Err(LoadError::NotAWorkbook { .. })
    ));
}
