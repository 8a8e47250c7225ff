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

//! Deterministic chart recommendations derived from a profile.

use crate::chart::ChartSpec;
use crate::profiler::DatasetProfile;

/// Most charts a deck carries.
pub const MAX_CHARTS: usize = 5;

/// Ordered candidates: bar, pie, line, scatter, heatmap, secondary bar,
/// truncated to [`MAX_CHARTS`].
pub fn recommend(profile: &DatasetProfile) -> Vec<ChartSpec> {
    recommend_for(&profile.numeric_columns, &profile.categorical_columns)
}

/// Recommendations from column names alone.
pub fn recommend_for(numeric: &[String], categorical: &[String]) -> Vec<ChartSpec> {
    let mut charts = Vec::with_capacity(MAX_CHARTS + 1);
    let num0 = numeric.first().map(String::as_str);
    let cat0 = categorical.first().map(String::as_str);

    match (cat0, num0) {
        (Some(cat), Some(num)) => charts.push(ChartSpec::bar(
            Some(cat),
            Some(num),
            format!("{cat} vs {num}"),
            "Show relationship between category and numeric data",
        )),
        (None, Some(num)) => charts.push(ChartSpec::bar(
            Some(num),
            None,
            format!("{num} Distribution"),
            "Show distribution of numeric data",
        )),
        (Some(cat), None) => charts.push(ChartSpec::bar(
            Some(cat),
            None,
            format!("{cat} Distribution"),
            "Show category distribution",
        )),
        (None, None) => {}
    }

    match (cat0, num0) {
        (Some(cat), Some(num)) => charts.push(ChartSpec::pie(
            Some(cat),
            Some(num),
            format!("{cat} by {num}"),
            "Show proportional breakdown with values",
        )),
        (Some(cat), None) => charts.push(ChartSpec::pie(
            Some(cat),
            None,
            format!("{cat} Proportions"),
            "Show proportional breakdown",
        )),
        _ => {}
    }

    if let Some(first) = num0 {
        let second = numeric.get(1).map_or(first, String::as_str);
        charts.push(ChartSpec::line(
            Some(first),
            Some(second),
            "Trend Analysis",
            "Show data trends over sequence",
        ));
    }

    if let [n0, n1, ..] = numeric {
        charts.push(ChartSpec::scatter(
            n0,
            n1,
            format!("{n0} vs {n1}"),
            "Show correlation between variables",
        ));
        charts.push(ChartSpec::heatmap(
            "Correlation Matrix",
            "Show correlations between all numeric variables",
        ));
    }

    if let ([_, cat2, ..], [_, num2, ..]) = (categorical, numeric) {
        charts.push(ChartSpec::bar(
            Some(cat2.as_str()),
            Some(num2.as_str()),
            format!("{cat2} vs {num2}"),
            "Show additional relationship between category and numeric data",
        ));
    }

    charts.truncate(MAX_CHARTS);
    charts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartKind, ChartType};

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn types(charts: &[ChartSpec]) -> Vec<ChartType> {
        charts.iter().map(ChartSpec::chart_type).collect()
    }

    #[test]
    fn mixed_columns_lead_with_category_bar() {
        let charts = recommend_for(&names(&["Value"]), &names(&["Category"]));
        assert_eq!(
            charts[0].kind,
            ChartKind::Bar {
                x: Some("Category".into()),
                y: Some("Value".into())
            }
        );
        assert_eq!(charts[0].title, "Category vs Value");
        assert_eq!(
            types(&charts),
            vec![ChartType::Bar, ChartType::Pie, ChartType::Line]
        );
    }

    #[test]
    fn numeric_only_tables_get_histogram_and_relations() {
        let charts = recommend_for(&names(&["a", "b"]), &[]);
        assert_eq!(
            types(&charts),
            vec![
                ChartType::Bar,
                ChartType::Line,
                ChartType::Scatter,
                ChartType::Heatmap
            ]
        );
        assert_eq!(charts[0].title, "a Distribution");
        assert_eq!(charts[1].kind.y(), Some("b"));
    }

    #[test]
    fn categorical_only_tables_get_distribution_and_proportions() {
        let charts = recommend_for(&[], &names(&["Region"]));
        assert_eq!(types(&charts), vec![ChartType::Bar, ChartType::Pie]);
        assert_eq!(charts[1].title, "Region Proportions");
    }

    #[test]
    fn secondary_bar_is_truncated_away() {
        let charts = recommend_for(&names(&["n0", "n1"]), &names(&["c0", "c1"]));
        assert_eq!(charts.len(), MAX_CHARTS);
        assert_eq!(charts[4].chart_type(), ChartType::Heatmap);
        assert!(charts.iter().all(|c| c.title != "c1 vs n1"));
    }

    #[test]
    fn single_numeric_never_yields_scatter_or_heatmap() {
        let charts = recommend_for(&names(&["n0"]), &names(&["c0", "c1"]));
        assert!(!types(&charts).contains(&ChartType::Scatter));
        assert!(!types(&charts).contains(&ChartType::Heatmap));
        assert_eq!(charts.len(), 3);
    }

    #[test]
    fn empty_profiles_recommend_nothing() {
        assert!(recommend_for(&[], &[]).is_empty());
    }
}
