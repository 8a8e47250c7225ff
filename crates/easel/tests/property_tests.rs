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

use easel::chart::ChartType;
use easel::narrative::truncate_text;
use easel::profiler::{correlation_matrix, strong_pairs};
use easel::selector::{recommend_for, MAX_CHARTS};
use easel::{Cell, Cleaner, CleaningConfig, Column, Table};
use proptest::prelude::*;
use std::collections::HashSet;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(256);
    ProptestConfig {
        cases,
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn numeric_table(columns: &[Vec<f64>]) -> (Table, Vec<String>) {
    let names: Vec<String> = (0..columns.len()).map(|i| format!("m{i}")).collect();
    let table = Table::new(
        names
            .iter()
            .zip(columns)
            .map(|(name, values)| Column::from_numbers(name.as_str(), values))
            .collect(),
    );
    (table, names)
}

fn region_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        4 => prop::sample::select(vec!["north", "south", "east"])
            .prop_map(|r| Cell::Text(r.to_string())),
        1 => Just(Cell::Missing),
    ]
}

/// Text as a loader leaves it: mostly numbers, some extreme, some words.
fn amount_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        6 => (-100.0f64..100.0).prop_map(|v| Cell::Text(format!("{v:.2}"))),
        1 => (1e3f64..1e7).prop_map(|v| Cell::Text(format!("{v:.2}"))),
        1 => Just(Cell::Text("pending".to_string())),
        1 => Just(Cell::Missing),
    ]
}

fn units_cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        6 => (-100.0f64..100.0).prop_map(Cell::Number),
        1 => (1e3f64..1e7).prop_map(Cell::Number),
        1 => (-1e7f64..-1e3).prop_map(Cell::Number),
        1 => Just(Cell::Missing),
    ]
}

fn names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn correlation_is_symmetric_with_unit_diagonal(
        columns in prop::collection::vec(prop::collection::vec(-1000.0f64..1000.0, 12), 2..5)
    ) {
        let (table, names) = numeric_table(&columns);
        let matrix = correlation_matrix(&table, &names);
        prop_assert_eq!(matrix.len(), names.len());
        for i in 0..matrix.len() {
            if let Some(diagonal) = matrix.values[i][i] {
                prop_assert_eq!(diagonal, 1.0);
            }
            for j in 0..matrix.len() {
                prop_assert_eq!(matrix.values[i][j], matrix.values[j][i]);
                if let Some(r) = matrix.values[i][j] {
                    prop_assert!(r.abs() <= 1.0 + 1e-9, "r = {}", r);
                }
            }
        }
    }

    #[test]
    fn strong_pairs_are_unique_and_above_threshold(
        columns in prop::collection::vec(prop::collection::vec(-50.0f64..50.0, 8), 2..6),
        threshold in 0.0f64..0.95,
    ) {
        let (table, names) = numeric_table(&columns);
        let matrix = correlation_matrix(&table, &names);
        let pairs = strong_pairs(&matrix, threshold);
        let mut seen = HashSet::new();
        for pair in &pairs {
            prop_assert!(pair.first != pair.second);
            prop_assert!(pair.coefficient.abs() > threshold);
            let key = if pair.first < pair.second {
                (pair.first.clone(), pair.second.clone())
            } else {
                (pair.second.clone(), pair.first.clone())
            };
            prop_assert!(seen.insert(key), "duplicate pair {} / {}", pair.first, pair.second);
        }
    }

    #[test]
    fn selector_respects_cap_and_column_counts(numeric in 0usize..6, categorical in 0usize..5) {
        let numeric = names("n", numeric);
        let categorical = names("c", categorical);
        let charts = recommend_for(&numeric, &categorical);

        prop_assert!(charts.len() <= MAX_CHARTS);
        if numeric.len() < 2 {
            prop_assert!(charts
                .iter()
                .all(|c| !matches!(c.chart_type(), ChartType::Scatter | ChartType::Heatmap)));
        }
        if numeric.is_empty() && categorical.is_empty() {
            prop_assert!(charts.is_empty());
        }
        for chart in &charts {
            for column in chart.referenced_columns() {
                prop_assert!(
                    numeric.iter().chain(&categorical).any(|n| n == column),
                    "unknown column {}", column
                );
            }
        }
    }

    #[test]
    fn cleaning_twice_equals_cleaning_once(
        rows in prop::collection::vec((region_cell(), amount_cell(), units_cell()), 5..40),
        copies in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let mut cells: Vec<Vec<Cell>> = rows
            .into_iter()
            .enumerate()
            .map(|(i, (region, amount, units))| {
                vec![
                    Cell::Text(format!("row{i}")),
                    region,
                    Cell::Text(if i % 2 == 0 { "web" } else { "store" }.to_string()),
                    amount,
                    units,
                ]
            })
            .collect();
        for copy in copies {
            let row = cells[copy.index(cells.len())].clone();
            cells.push(row);
        }
        let headers = ["Label", "Region", "Channel", "Amount", "Units"]
            .map(String::from)
            .to_vec();
        let table = Table::from_rows(headers, cells);
        let cleaner = Cleaner::new(CleaningConfig::default()).unwrap();

        let Ok((once, _)) = cleaner.clean(table) else {
            return Ok(());
        };
        let twice = cleaner.clean(once.clone());
        prop_assert!(twice.is_ok(), "second clean failed: {:?}", twice.as_ref().err());
        let (twice, second) = twice.unwrap();
        prop_assert_eq!(&twice, &once);
        prop_assert_eq!(second.duplicates_removed, 0);
        prop_assert_eq!(second.capped_values, 0);
        prop_assert!(second.outliers.iter().all(|o| !o.removed));
    }

    #[test]
    fn truncation_never_exceeds_the_limit(text in "[a-z ]{0,200}", limit in 4usize..120) {
        let truncated = truncate_text(&text, limit);
        prop_assert!(truncated.chars().count() <= limit);
        if text.chars().count() <= limit {
            prop_assert_eq!(truncated, text);
        } else {
            prop_assert!(truncated.ends_with("..."));
        }
    }
}
