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

//! Prompt text built from a dataset profile.

use crate::profiler::{ColumnStats, DatasetProfile};
use std::fmt::Write;

/// System message sent with every request.
pub const SYSTEM_PROMPT: &str = "You are a data-analyst assistant. Output ONLY valid JSON.";

/// Column names listed per kind.
const PREVIEW_COLUMNS: usize = 5;
/// Columns described with statistics.
const DETAILED_COLUMNS: usize = 3;
/// Sample rows quoted.
const SAMPLE_ROWS: usize = 2;
/// Fields quoted per sample row.
const SAMPLE_FIELDS: usize = 4;

/// What the analysis must cover.
const ANALYSIS_REQUIREMENTS: &str = "\
ANALYSIS REQUIREMENTS:
- Focus on the most significant patterns, correlations, and insights
- Consider data quality issues (missing values, outliers, skewness)
- Identify business-relevant findings and actionable insights
- Use statistical evidence to support your insights
- Keep insights concise and slide-friendly (max 100 characters per insight)
- Generate overview slides with 5-8 bullet points each
- Include detailed findings, trends, and recommendations";

/// How charts should be chosen.
const CHART_STRATEGY: &str = "\
CHART SELECTION STRATEGY:
- Bar charts: for comparing categories or showing distributions
- Pie charts: for proportional analysis (limit to 5-8 categories)
- Line charts: for trends, time series, or ordered data
- Scatter plots: for exploring relationships between numeric variables
- Heatmaps: for correlation matrices or multi-dimensional comparisons";

/// Required JSON shape.
const OUTPUT_FORMAT: &str = r#"OUTPUT FORMAT - return only this JSON structure:
{
  "title": "Compelling, concise presentation title (max 60 chars)",
  "insights": [
    "Key insight with data evidence (max 100 chars)",
    "Business finding with statistical support (max 100 chars)",
    "Pattern discovery with implications (max 100 chars)",
    "Data quality observation (max 100 chars)"
  ],
  "slides": [
    {
      "title": "Executive Summary (max 50 chars)",
      "content": ["Dataset contains X records with Y key metrics analyzed", "Primary finding: ..."],
      "slide_type": "overview"
    },
    {
      "title": "Key Findings & Insights (max 50 chars)",
      "content": ["Statistical correlation: ...", "Distribution pattern: ..."],
      "slide_type": "insights"
    },
    {
      "title": "Data Quality Assessment (max 50 chars)",
      "content": ["Completeness: ...", "Outliers: ..."],
      "slide_type": "quality"
    }
  ],
  "recommended_charts": [
    {
      "type": "bar|pie|line|scatter|heatmap",
      "x_column": "specific_column_name",
      "y_column": "specific_column_name_or_null",
      "title": "Specific, descriptive chart title",
      "purpose": "Why this chart reveals important insights"
    }
  ]
}

CRITICAL REQUIREMENTS:
1. Recommend 4-6 charts of different types
2. Use only column names listed above
3. Base insights on the statistical evidence provided"#;

/// The full user message sent to the narrative service.
pub fn build_prompt(profile: &DatasetProfile, file_name: &str) -> String {
    format!(
        "You are an expert data analyst creating a presentation from this dataset analysis.\n\n\
         {}\n\n{ANALYSIS_REQUIREMENTS}\n\n{CHART_STRATEGY}\n\n{OUTPUT_FORMAT}",
        data_summary(profile, file_name)
    )
}

/// Plain-text digest of the profile, one section per concern.
pub fn data_summary(profile: &DatasetProfile, file_name: &str) -> String {
    let mut out = String::new();
    // writes into a String cannot fail
    let _ = write_summary(&mut out, profile, file_name);
    out.trim_end().to_string()
}

/// Writes the dataset summary section.
fn write_summary(
    out: &mut String,
    profile: &DatasetProfile,
    file_name: &str,
) -> std::fmt::Result {
    let quality = &profile.quality;
    writeln!(out, "DATASET OVERVIEW:")?;
    writeln!(out, "- File: {file_name}")?;
    writeln!(
        out,
        "- Size: {} rows × {} columns",
        group_thousands(profile.rows),
        profile.columns
    )?;
    let complete_share = if profile.rows == 0 {
        0.0
    } else {
        quality.complete_rows as f64 / profile.rows as f64 * 100.0
    };
    writeln!(
        out,
        "- Data Quality: {} complete rows ({complete_share:.1}%)",
        group_thousands(quality.complete_rows)
    )?;
    if quality.duplicate_rows > 0 {
        writeln!(out, "- Duplicates: {} rows", quality.duplicate_rows)?;
    }

    writeln!(out, "\nCOLUMN ANALYSIS:")?;
    writeln!(
        out,
        "- Numeric columns ({}): {}",
        profile.numeric_columns.len(),
        preview(&profile.numeric_columns)
    )?;
    writeln!(
        out,
        "- Categorical columns ({}): {}",
        profile.categorical_columns.len(),
        preview(&profile.categorical_columns)
    )?;
    if !profile.datetime_columns.is_empty() {
        writeln!(
            out,
            "- DateTime columns: {}",
            profile.datetime_columns.join(", ")
        )?;
    }

    let numeric: Vec<_> = profile
        .column_profiles
        .iter()
        .filter_map(|p| match &p.stats {
            ColumnStats::Numeric(stats) => Some((&p.name, stats)),
            _ => None,
        })
        .take(DETAILED_COLUMNS)
        .collect();
    if !numeric.is_empty() {
        writeln!(out, "\nSTATISTICAL INSIGHTS:")?;
        for (name, stats) in numeric {
            writeln!(
                out,
                "- {name}: mean={:.2}, range=[{:.2}, {:.2}], std={:.2}, outliers={}",
                stats.mean,
                stats.min,
                stats.max,
                stats.std.unwrap_or(0.0),
                stats.outlier_count
            )?;
            if let Some(skew) = stats.skewness.filter(|s| s.abs() > 1.0) {
                let direction = if skew > 0.0 { "positively" } else { "negatively" };
                writeln!(out, "  Data is {direction} skewed ({skew:.2})")?;
            }
        }
    }

    let categorical: Vec<_> = profile
        .column_profiles
        .iter()
        .filter_map(|p| match &p.stats {
            ColumnStats::Categorical(stats) => Some((&p.name, stats)),
            _ => None,
        })
        .take(DETAILED_COLUMNS)
        .collect();
    if !categorical.is_empty() {
        writeln!(out, "\nCATEGORICAL INSIGHTS:")?;
        for (name, stats) in categorical {
            let top = stats
                .most_frequent
                .as_ref()
                .map(|v| v.value.as_str())
                .unwrap_or("");
            writeln!(
                out,
                "- {name}: {} unique values, most frequent='{top}' ({:.1}%)",
                stats.unique_count, stats.concentration
            )?;
        }
    }

    if !profile.strong_correlations.is_empty() {
        writeln!(out, "\nCORRELATION INSIGHTS:")?;
        for pair in profile.strong_correlations.iter().take(DETAILED_COLUMNS) {
            writeln!(
                out,
                "- {} <-> {}: {:.3} ({})",
                pair.first,
                pair.second,
                pair.coefficient,
                pair.strength.as_str()
            )?;
        }
    }

    let patterns = &profile.patterns;
    if !patterns.time_series_candidates.is_empty()
        || !patterns.skewed.is_empty()
        || !patterns.groupings.is_empty()
    {
        writeln!(out, "\nDATA PATTERNS:")?;
        if !patterns.time_series_candidates.is_empty() {
            writeln!(
                out,
                "- Time-based columns detected: {}",
                patterns.time_series_candidates.join(", ")
            )?;
        }
        if !patterns.skewed.is_empty() {
            let names: Vec<&str> = patterns
                .skewed
                .iter()
                .take(2)
                .map(|s| s.column.as_str())
                .collect();
            writeln!(out, "- Skewed distributions: {}", names.join(", "))?;
        }
        if let Some(grouping) = patterns.groupings.first() {
            writeln!(
                out,
                "- Recommended analysis: {} vs {}",
                grouping.category, grouping.value
            )?;
        }
    }

    let missing: Vec<_> = quality
        .missing_by_column
        .iter()
        .filter(|m| m.count > 0)
        .take(DETAILED_COLUMNS)
        .collect();
    if !missing.is_empty() {
        writeln!(out, "\nMISSING DATA:")?;
        for share in missing {
            writeln!(
                out,
                "- {}: {} missing ({:.1}%)",
                share.column, share.count, share.percentage
            )?;
        }
    }

    writeln!(out, "\nSAMPLE DATA (first {SAMPLE_ROWS} rows):")?;
    let names: Vec<&str> = profile.column_names().collect();
    for (i, row) in profile.sample_rows.iter().take(SAMPLE_ROWS).enumerate() {
        let fields: Vec<String> = names
            .iter()
            .zip(row)
            .take(SAMPLE_FIELDS)
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let more = if row.len() > SAMPLE_FIELDS { "..." } else { "" };
        writeln!(out, "- Row {}: {}{more}", i + 1, fields.join(", "))?;
    }
    Ok(())
}

/// Leading names, with a count of the rest.
fn preview(names: &[String]) -> String {
    let shown = names
        .iter()
        .take(PREVIEW_COLUMNS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > PREVIEW_COLUMNS {
        format!("{shown}...")
    } else {
        shown
    }
}

/// `1234567` as `1,234,567`.
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
