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

//! Declarative chart descriptions.
//!
//! [`ChartSpec`] is the in-process form: a closed variant per chart type
//! carrying only the columns that type uses. [`ChartSpecWire`] is the JSON
//! shape exchanged with the narrative service.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The five chart families the renderer can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    /// Grouped totals, histograms or column means as vertical bars.
    Bar,
    /// Category shares.
    Pie,
    /// Ordered values joined by a line.
    Line,
    /// One point per row over two numeric columns.
    Scatter,
    /// Correlation matrix of the numeric columns.
    Heatmap,
}

impl ChartType {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Pie => "pie",
            ChartType::Line => "line",
            ChartType::Scatter => "scatter",
            ChartType::Heatmap => "heatmap",
        }
    }

    /// Case-insensitive, surrounding whitespace ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bar" => Some(ChartType::Bar),
            "pie" => Some(ChartType::Pie),
            "line" => Some(ChartType::Line),
            "scatter" => Some(ChartType::Scatter),
            "heatmap" => Some(ChartType::Heatmap),
            _ => None,
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chart type plus the columns it plots. A missing column lets the renderer
/// pick a sensible default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChartKind {
    /// Bars over an optional category and value column.
    Bar {
        /// Category or binned numeric column.
        x: Option<String>,
        /// Value summed per category.
        y: Option<String>,
    },
    /// Slices over an optional category and value column.
    Pie {
        /// Category or binned numeric column.
        x: Option<String>,
        /// Value summed per slice.
        y: Option<String>,
    },
    /// Line over an optional ordering and value column.
    Line {
        /// Ordering column.
        x: Option<String>,
        /// Plotted value.
        y: Option<String>,
    },
    /// Points over two numeric columns.
    Scatter {
        /// Horizontal axis.
        x: Option<String>,
        /// Vertical axis.
        y: Option<String>,
    },
    /// Always covers every numeric column.
    Heatmap,
}

impl ChartKind {
    /// Family of this variant.
    pub fn chart_type(&self) -> ChartType {
        match self {
            ChartKind::Bar { .. } => ChartType::Bar,
            ChartKind::Pie { .. } => ChartType::Pie,
            ChartKind::Line { .. } => ChartType::Line,
            ChartKind::Scatter { .. } => ChartType::Scatter,
            ChartKind::Heatmap => ChartType::Heatmap,
        }
    }

    /// Horizontal or category column, if named.
    pub fn x(&self) -> Option<&str> {
        match self {
            ChartKind::Bar { x, .. }
            | ChartKind::Pie { x, .. }
            | ChartKind::Line { x, .. }
            | ChartKind::Scatter { x, .. } => x.as_deref(),
            ChartKind::Heatmap => None,
        }
    }

    /// Value column, if named.
    pub fn y(&self) -> Option<&str> {
        match self {
            ChartKind::Bar { y, .. }
            | ChartKind::Pie { y, .. }
            | ChartKind::Line { y, .. }
            | ChartKind::Scatter { y, .. } => y.as_deref(),
            ChartKind::Heatmap => None,
        }
    }

    /// Heatmaps discard both columns.
    fn from_parts(chart_type: ChartType, x: Option<String>, y: Option<String>) -> Self {
        match chart_type {
            ChartType::Bar => ChartKind::Bar { x, y },
            ChartType::Pie => ChartKind::Pie { x, y },
            ChartType::Line => ChartKind::Line { x, y },
            ChartType::Scatter => ChartKind::Scatter { x, y },
            ChartType::Heatmap => ChartKind::Heatmap,
        }
    }
}

/// A chart to draw, with the caption shown on its slide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartSpec {
    /// What to plot.
    pub kind: ChartKind,
    /// Slide and image title.
    pub title: String,
    /// One-line statement of what the chart shows.
    pub purpose: String,
}

impl ChartSpec {
    /// Spec from an already-built kind.
    pub fn new(kind: ChartKind, title: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            purpose: purpose.into(),
        }
    }

    /// Bar chart over optional columns.
    pub fn bar(
        x: Option<&str>,
        y: Option<&str>,
        title: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self::new(
            ChartKind::Bar {
                x: x.map(str::to_string),
                y: y.map(str::to_string),
            },
            title,
            purpose,
        )
    }

    /// Pie chart over optional columns.
    pub fn pie(
        x: Option<&str>,
        y: Option<&str>,
        title: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self::new(
            ChartKind::Pie {
                x: x.map(str::to_string),
                y: y.map(str::to_string),
            },
            title,
            purpose,
        )
    }

    /// Line chart over optional columns.
    pub fn line(
        x: Option<&str>,
        y: Option<&str>,
        title: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self::new(
            ChartKind::Line {
                x: x.map(str::to_string),
                y: y.map(str::to_string),
            },
            title,
            purpose,
        )
    }

    /// Scatter plot of `y` against `x`.
    pub fn scatter(
        x: &str,
        y: &str,
        title: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self::new(
            ChartKind::Scatter {
                x: Some(x.to_string()),
                y: Some(y.to_string()),
            },
            title,
            purpose,
        )
    }

    /// Correlation heatmap.
    pub fn heatmap(title: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self::new(ChartKind::Heatmap, title, purpose)
    }

    /// Family of the chart.
    pub fn chart_type(&self) -> ChartType {
        self.kind.chart_type()
    }

    /// Columns the spec names, x first.
    pub fn referenced_columns(&self) -> Vec<&str> {
        self.kind.x().into_iter().chain(self.kind.y()).collect()
    }

    /// Same chart type over the same columns.
    pub fn same_chart(&self, other: &ChartSpec) -> bool {
        self.kind == other.kind
    }
}

/// Loosely typed chart object as the narrative service writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpecWire {
    /// Chart family name, matched case-insensitively.
    #[serde(rename = "type")]
    pub chart_type: String,
    /// Horizontal or category column.
    #[serde(default)]
    pub x_column: Option<String>,
    /// Value column.
    #[serde(default)]
    pub y_column: Option<String>,
    /// Blank titles are replaced on conversion.
    #[serde(default)]
    pub title: String,
    /// Free-text purpose.
    #[serde(default)]
    pub purpose: String,
}

/// A wire chart whose type names none of the five families.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown chart type '{0}'")]
pub struct UnknownChartType(pub String);

impl TryFrom<ChartSpecWire> for ChartSpec {
    type Error = UnknownChartType;

    fn try_from(wire: ChartSpecWire) -> Result<Self, Self::Error> {
        let chart_type =
            ChartType::parse(&wire.chart_type).ok_or(UnknownChartType(wire.chart_type))?;
        let non_blank = |c: Option<String>| c.filter(|s| !s.trim().is_empty());
        let title = if wire.title.trim().is_empty() {
            format!("{} chart", chart_type.as_str())
        } else {
            wire.title
        };
        let x = non_blank(wire.x_column);
        let y = non_blank(wire.y_column);
        Ok(ChartSpec {
            kind: ChartKind::from_parts(chart_type, x, y),
            title,
            purpose: wire.purpose,
        })
    }
}

impl From<&ChartSpec> for ChartSpecWire {
    fn from(spec: &ChartSpec) -> Self {
        Self {
            chart_type: spec.chart_type().as_str().to_string(),
            x_column: spec.kind.x().map(str::to_string),
            y_column: spec.kind.y().map(str::to_string),
            title: spec.title.clone(),
            purpose: spec.purpose.clone(),
        }
    }
}

impl Serialize for ChartSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ChartSpecWire::from(self).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_objects_convert_into_closed_variants() {
        let wire: ChartSpecWire = serde_json::from_value(json!({
            "type": "Bar",
            "x_column": "Region",
            "y_column": null,
            "title": "Sales by Region",
            "purpose": "compare"
        }))
        .unwrap();
        let spec = ChartSpec::try_from(wire).unwrap();
        assert_eq!(
            spec.kind,
            ChartKind::Bar {
                x: Some("Region".into()),
                y: None
            }
        );
    }

    #[test]
    fn heatmaps_drop_column_fields() {
        let wire = ChartSpecWire {
            chart_type: "heatmap".into(),
            x_column: Some("a".into()),
            y_column: Some("b".into()),
            title: "Correlation Matrix".into(),
            purpose: String::new(),
        };
        let spec = ChartSpec::try_from(wire).unwrap();
        assert_eq!(spec.kind, ChartKind::Heatmap);
        assert!(spec.referenced_columns().is_empty());
    }

    #[test]
    fn unknown_types_are_rejected() {
        let wire = ChartSpecWire {
            chart_type: "radar".into(),
            x_column: None,
            y_column: None,
            title: String::new(),
            purpose: String::new(),
        };
        let err = ChartSpec::try_from(wire).unwrap_err();
        assert_eq!(err, UnknownChartType("radar".into()));
        assert_eq!(err.to_string(), "unknown chart type 'radar'");
    }
}
