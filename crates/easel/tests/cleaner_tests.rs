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

use easel::stats;
use easel::{Cleaner, CleaningConfig, CleaningPass, Column, Table};

fn labelled(amounts: &[f64]) -> Table {
    let labels: Vec<String> = (0..amounts.len()).map(|i| format!("r{i}")).collect();
    let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
    Table::new(vec![
        Column::from_texts("Label", &labels),
        Column::from_numbers("Amount", amounts),
    ])
}

fn cleaner() -> Cleaner {
    Cleaner::new(CleaningConfig::default()).unwrap()
}

#[test]
fn rare_outlier_is_kept_by_iqr_then_capped() {
    let mut amounts: Vec<f64> = (10..30).map(f64::from).collect();
    amounts.push(1000.0);

    let (table, report) = cleaner().clean(labelled(&amounts)).unwrap();

    assert_eq!(table.row_count(), 21);
    assert_eq!(report.outliers.len(), 1);
    assert_eq!(report.outliers[0].column, "Amount");
    assert_eq!(report.outliers[0].flagged, 1);
    assert!(!report.outliers[0].removed);
    assert_eq!(report.capped_values, 1);

    let capped = table.column("Amount").unwrap().numbers()[20];
    assert!(capped < 1000.0 && capped > 29.0, "{capped}");

    let amounts = table.column("Amount").unwrap().to_float64();
    let mean = stats::mean(&amounts).unwrap();
    let std = stats::sample_std(&amounts).unwrap();
    assert!(capped <= mean + 3.0 * std * (1.0 + 1e-9));
}

#[test]
fn cleaning_twice_changes_nothing_after_capping() {
    let mut amounts: Vec<f64> = (10..30).map(f64::from).collect();
    amounts.push(1000.0);

    let (once, first) = cleaner().clean(labelled(&amounts)).unwrap();
    let (twice, second) = cleaner().clean(once.clone()).unwrap();
    let (thrice, _) = cleaner().clean(twice.clone()).unwrap();

    assert_eq!(first.capped_values, 1);
    assert_eq!(second.capped_values, 0);
    assert_eq!(second.outliers, first.outliers);
    assert_eq!(once, twice);
    assert_eq!(twice, thrice);
}

#[test]
fn frequent_outliers_are_removed_before_capping_sees_them() {
    let mut amounts: Vec<f64> = (10..27).map(f64::from).collect();
    amounts.extend([1000.0, 1100.0, 1200.0]);

    let (table, report) = cleaner().clean(labelled(&amounts)).unwrap();

    assert_eq!(report.outliers[0].flagged, 3);
    assert!(report.outliers[0].removed);
    assert_eq!(table.row_count(), 17);
    assert_eq!(report.capped_values, 0);
    assert_eq!(report.affected(CleaningPass::IqrOutliers), Some(3));

    let remaining = table.column("Amount").unwrap().to_float64();
    let before = stats::iqr_outlier_count(&stats::float64(&amounts), 1.5);
    assert!(stats::iqr_outlier_count(&remaining, 1.5) <= before);

    let (again, report) = cleaner().clean(table.clone()).unwrap();
    assert_eq!(again, table);
    assert!(report.outliers.iter().all(|o| !o.removed));
}

#[test]
fn passes_are_reported_in_execution_order() {
    let amounts: Vec<f64> = (1..=8).map(f64::from).collect();
    let (_, report) = cleaner().clean(labelled(&amounts)).unwrap();
    let order: Vec<CleaningPass> = report.passes.iter().map(|p| p.pass).collect();
    assert_eq!(order, CleaningPass::ALL.to_vec());
    assert_eq!(report.total_affected(), 0);
}

#[test]
fn lenient_config_keeps_a_single_row() {
    let cleaner = Cleaner::new(CleaningConfig::lenient()).unwrap();
    let (table, report) = cleaner.clean(labelled(&[42.0])).unwrap();
    assert_eq!(table.row_count(), 1);
    assert_eq!(report.output_shape, (1, 2));
}
