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

//! Chart rendering.
//!
//! A [`ChartSpec`] is reduced against the cleaned table, laid out as a
//! backend-agnostic [`RenderFrame`] and serialised to SVG in the run's
//! [`ArtifactScope`]. The deck embeds the stored files. Failures never reach
//! the caller of [`ChartRenderer::render`]: they become a placeholder image
//! and are counted on the scope.

pub mod aggregate;
mod artifacts;
pub mod axis;
pub mod charts;
mod frame;
mod primitives;
mod svg;

pub use artifacts::ArtifactScope;
pub use frame::RenderFrame;
pub use primitives::{
    palette, CirclePrimitive, Color, LinePrimitive, LineStrokeStyle, RectPrimitive, TextHAlign,
    TextPrimitive, WedgePrimitive, PALETTE,
};
pub use svg::{escape_xml, to_svg};

use crate::chart::{ChartKind, ChartSpec, ChartType};
use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::logging::log_recovered_failure;
use crate::profiler::{correlation_matrix, value_counts};
use crate::table::{Column, ColumnKind, Table};
use charts::{HeatScale, ValueAxis, XAxis};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a rendered chart's SVG lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartImage {
    /// Written into the artifact scope.
    Stored(PathBuf),
    /// Held in memory because the artifact could not be written.
    Inline(String),
}

/// Outcome of rendering one spec.
#[derive(Debug, Clone)]
pub struct RenderedChart {
    /// Slide title.
    pub title: String,
    /// Requested chart family.
    pub chart_type: ChartType,
    /// The chart or its placeholder.
    pub image: ChartImage,
    /// The spec could not be drawn and a placeholder stands in.
    pub placeholder: bool,
}

impl RenderedChart {
    /// SVG markup, read back from the artifact when one was written.
    pub fn svg(&self) -> RenderResult<String> {
        match &self.image {
            ChartImage::Stored(path) => {
                fs::read_to_string(path).map_err(|source| RenderError::Artifact {
                    path: path.display().to_string(),
                    source,
                })
            }
            ChartImage::Inline(svg) => Ok(svg.clone()),
        }
    }

    /// Artifact location, if the chart was stored.
    pub fn path(&self) -> Option<&Path> {
        match &self.image {
            ChartImage::Stored(path) => Some(path),
            ChartImage::Inline(_) => None,
        }
    }
}

/// Plain SVG naming the chart, for when even the drawn placeholder fails.
pub fn minimal_placeholder(width: u32, height: u32, title: &str) -> String {
    format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{width}' height='{height}'>\
         <text x='20' y='40'>Chart: {}</text></svg>",
        escape_xml(title)
    )
}

/// Draws chart specs against one cleaned table.
pub struct ChartRenderer<'a> {
    /// Source data.
    table: &'a Table,
    /// Canvas size and reduction limits.
    config: RenderConfig,
}

/// Numeric columns feed value axes.
fn is_numeric(column: &Column) -> bool {
    column.kind() == ColumnKind::Numeric
}

/// Text and datetime columns can act as categories.
fn is_categorical(column: &Column) -> bool {
    matches!(column.kind(), ColumnKind::Text | ColumnKind::DateTime)
}

impl<'a> ChartRenderer<'a> {
    /// Renderer over `table`.
    pub fn new(table: &'a Table, config: RenderConfig) -> Self {
        Self { table, config }
    }

    /// Canvas size in pixels.
    fn size(&self) -> (f64, f64) {
        (f64::from(self.config.width), f64::from(self.config.height))
    }

    /// Column by name; `None` for an absent or unknown name.
    fn column(&self, name: Option<&str>) -> Option<&'a Column> {
        name.and_then(|n| self.table.column(n))
    }

    /// Numeric columns in table order.
    fn numeric_columns(&self) -> Vec<&'a Column> {
        self.table.columns().iter().filter(|c| is_numeric(c)).collect()
    }

    /// Error for a spec whose reduction came out empty.
    fn nothing_to_plot(spec: &ChartSpec) -> RenderError {
        RenderError::NoPlottableValues {
            chart: spec.title.clone(),
        }
    }

    /// Lays out the chart without serialising it.
    pub fn frame(&self, spec: &ChartSpec) -> RenderResult<RenderFrame> {
        let frame = match &spec.kind {
            ChartKind::Bar { x, y } => self.bar(spec, x.as_deref(), y.as_deref()),
            ChartKind::Pie { x, .. } => self.pie(spec, x.as_deref()),
            ChartKind::Line { x, y } => self.line(spec, x.as_deref(), y.as_deref()),
            ChartKind::Scatter { x, y } => self.scatter(spec, x.as_deref(), y.as_deref()),
            ChartKind::Heatmap => self.heatmap(spec),
        }?;
        frame.validate()?;
        Ok(frame)
    }

    /// Lays out and serialises the chart.
    pub fn render_svg(&self, spec: &ChartSpec) -> RenderResult<String> {
        to_svg(&self.frame(spec)?)
    }

    /// Renders into `scope`. A failed chart is replaced by a placeholder; an
    /// artifact that cannot be written keeps the markup in memory.
    pub fn render(&self, spec: &ChartSpec, scope: &mut ArtifactScope) -> RenderedChart {
        let (svg, placeholder) = match self.render_svg(spec) {
            Ok(svg) => (svg, false),
            Err(error) => {
                log_recovered_failure("render", &spec.title, &error);
                scope.record_placeholder();
                (self.placeholder_svg(&spec.title), true)
            }
        };
        let image = match scope.store(spec.chart_type().as_str(), &svg) {
            Ok(path) => ChartImage::Stored(path),
            Err(error) => {
                log_recovered_failure("render", &spec.title, &error);
                ChartImage::Inline(svg)
            }
        };
        debug!(
            chart = %spec.title,
            kind = spec.chart_type().as_str(),
            placeholder = placeholder,
            "Rendered chart"
        );
        RenderedChart {
            title: spec.title.clone(),
            chart_type: spec.chart_type(),
            image,
            placeholder,
        }
    }

    /// Grey panel carrying the intended title.
    pub fn placeholder_svg(&self, title: &str) -> String {
        to_svg(&charts::placeholder(self.size(), title)).unwrap_or_else(|_| {
            minimal_placeholder(self.config.width, self.config.height, title)
        })
    }

    /// Group sums, a histogram, value counts or column means, depending on
    /// which columns resolve.
    fn bar(
        &self,
        spec: &ChartSpec,
        x: Option<&str>,
        y: Option<&str>,
    ) -> RenderResult<RenderFrame> {
        let padding = self.config.axis_padding;
        match (self.column(x), self.column(y)) {
            (Some(xc), Some(yc)) if is_categorical(xc) && is_numeric(yc) => {
                let bars = aggregate::group_sum(xc, yc, self.config.top_groups);
                if bars.is_empty() {
                    return Err(Self::nothing_to_plot(spec));
                }
                let sums: Vec<f64> = bars.iter().map(|(_, v)| *v).collect();
                let y_axis = ValueAxis::numeric(yc.name(), &sums, padding, true);
                Ok(charts::bar_chart(self.size(), &spec.title, xc.name(), &bars, &y_axis))
            }
            (Some(xc), _) if is_numeric(xc) => {
                let values = xc.numbers();
                let bins = aggregate::histogram(&values, self.config.histogram_bins);
                if bins.is_empty() {
                    return Err(Self::nothing_to_plot(spec));
                }
                let edges = [bins[0].low, bins[bins.len() - 1].high];
                let mut x_axis = ValueAxis::numeric(xc.name(), &edges, padding, false);
                x_axis.magnitude = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Ok(charts::histogram_chart(self.size(), &spec.title, &bins, &x_axis, padding))
            }
            (Some(xc), None) if is_categorical(xc) => {
                let bars: Vec<(String, f64)> = value_counts(xc)
                    .into_iter()
                    .take(self.config.top_groups)
                    .map(|v| (v.value, v.count as f64))
                    .collect();
                if bars.is_empty() {
                    return Err(Self::nothing_to_plot(spec));
                }
                let max = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max);
                let y_axis = ValueAxis::counts(axis::FREQUENCY_LABEL, max, padding);
                Ok(charts::bar_chart(self.size(), &spec.title, xc.name(), &bars, &y_axis))
            }
            _ => {
                let bars = aggregate::column_means(self.table, self.config.mean_columns);
                if bars.is_empty() {
                    return Err(Self::nothing_to_plot(spec));
                }
                let means: Vec<f64> = bars.iter().map(|(_, v)| *v).collect();
                let y_axis = ValueAxis::numeric("Average Values", &means, padding, true)
                    .labelled("Average Values");
                Ok(charts::bar_chart(self.size(), &spec.title, "", &bars, &y_axis))
            }
        }
    }

    /// Binned numbers, category counts or the column-kind mix.
    fn pie(&self, spec: &ChartSpec, x: Option<&str>) -> RenderResult<RenderFrame> {
        let slices: Vec<(String, f64)> = match self.column(x) {
            Some(xc) if is_numeric(xc) => {
                aggregate::binned_counts(&xc.numbers(), self.config.pie_bins)
                    .into_iter()
                    .map(|(label, n)| (label, n as f64))
                    .collect()
            }
            Some(xc) if is_categorical(xc) => value_counts(xc)
                .into_iter()
                .take(self.config.pie_slices)
                .map(|v| (v.value, v.count as f64))
                .collect(),
            _ => aggregate::kind_distribution(self.table)
                .into_iter()
                .map(|(label, n)| (label, n as f64))
                .collect(),
        };
        if slices.iter().all(|(_, v)| *v <= 0.0) {
            return Err(Self::nothing_to_plot(spec));
        }
        Ok(charts::pie_chart(self.size(), &spec.title, &slices))
    }

    /// `y` ordered by `x`, or the first numeric column against row index.
    fn line(
        &self,
        spec: &ChartSpec,
        x: Option<&str>,
        y: Option<&str>,
    ) -> RenderResult<RenderFrame> {
        let padding = self.config.axis_padding;
        if let (Some(xc), Some(yc)) = (self.column(x), self.column(y)) {
            if is_numeric(yc) {
                let (points, x_axis) = match xc.kind() {
                    ColumnKind::Numeric => {
                        let points = aggregate::sorted_pairs(xc, yc);
                        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
                        let axis = ValueAxis::numeric(xc.name(), &xs, padding, false);
                        (points, XAxis::Values(axis))
                    }
                    ColumnKind::DateTime => {
                        let points = aggregate::sorted_pairs(xc, yc);
                        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
                        (points, XAxis::Values(ValueAxis::dates(xc.name(), &xs, padding)))
                    }
                    _ => {
                        let mut labelled: Vec<(String, f64)> = xc
                            .cells()
                            .iter()
                            .zip(yc.cells())
                            .filter_map(|(a, b)| {
                                Some((a.as_text()?.to_string(), b.as_number()?))
                            })
                            .collect();
                        labelled.sort_by(|a, b| a.0.cmp(&b.0));
                        let points: Vec<(f64, f64)> = labelled
                            .iter()
                            .enumerate()
                            .map(|(i, (_, v))| (i as f64, *v))
                            .collect();
                        let categories: Vec<String> =
                            labelled.into_iter().map(|(k, _)| k).collect();
                        (
                            points,
                            XAxis::Categories {
                                label: xc.name().to_string(),
                                categories,
                            },
                        )
                    }
                };
                if points.is_empty() {
                    return Err(Self::nothing_to_plot(spec));
                }
                let ys: Vec<f64> = points.iter().map(|p: &(f64, f64)| p.1).collect();
                let y_axis = ValueAxis::numeric(yc.name(), &ys, padding, false);
                return Ok(charts::line_chart(
                    self.size(),
                    &spec.title,
                    &points,
                    &x_axis,
                    &y_axis,
                ));
            }
        }

        let first = self
            .numeric_columns()
            .into_iter()
            .next()
            .ok_or_else(|| Self::nothing_to_plot(spec))?;
        let points: Vec<(f64, f64)> = first
            .cells()
            .iter()
            .enumerate()
            .filter_map(|(i, c)| Some((i as f64, c.as_number()?)))
            .collect();
        if points.is_empty() {
            return Err(Self::nothing_to_plot(spec));
        }
        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        let x_axis =
            XAxis::Values(ValueAxis::numeric("Index", &xs, padding, false).labelled("Index"));
        let y_axis = ValueAxis::numeric(first.name(), &ys, padding, false);
        Ok(charts::line_chart(self.size(), &spec.title, &points, &x_axis, &y_axis))
    }

    /// Complete pairs of two numeric columns, falling back to the first two.
    fn scatter(
        &self,
        spec: &ChartSpec,
        x: Option<&str>,
        y: Option<&str>,
    ) -> RenderResult<RenderFrame> {
        let (xc, yc) = match (self.column(x), self.column(y)) {
            (Some(xc), Some(yc)) if is_numeric(xc) && is_numeric(yc) => (xc, yc),
            _ => match self.numeric_columns().as_slice() {
                [first, second, ..] => (*first, *second),
                _ => return Err(Self::nothing_to_plot(spec)),
            },
        };
        let points: Vec<(f64, f64)> = xc
            .cells()
            .iter()
            .zip(yc.cells())
            .filter_map(|(a, b)| Some((a.as_number()?, b.as_number()?)))
            .collect();
        if points.is_empty() {
            return Err(Self::nothing_to_plot(spec));
        }
        let padding = self.config.axis_padding;
        let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
        Ok(charts::scatter_chart(
            self.size(),
            &spec.title,
            &points,
            &ValueAxis::numeric(xc.name(), &xs, padding, false),
            &ValueAxis::numeric(yc.name(), &ys, padding, false),
        ))
    }

    /// Correlation matrix, or mean and std per column below two numeric columns.
    fn heatmap(&self, spec: &ChartSpec) -> RenderResult<RenderFrame> {
        let numeric = self.table.numeric_column_names();
        if numeric.len() >= 2 {
            let matrix = correlation_matrix(self.table, &numeric);
            return Ok(charts::heatmap_chart(
                self.size(),
                &spec.title,
                &matrix.columns,
                &matrix.columns,
                &matrix.values,
                HeatScale::Correlation,
            ));
        }
        let summaries = aggregate::column_summaries(self.table);
        if summaries.is_empty() {
            return Err(Self::nothing_to_plot(spec));
        }
        let rows: Vec<String> = summaries.iter().map(|s| s.0.clone()).collect();
        let values: Vec<Vec<Option<f64>>> = summaries
            .iter()
            .map(|(_, mean, std)| vec![Some(*mean), Some(*std)])
            .collect();
        Ok(charts::heatmap_chart(
            self.size(),
            &spec.title,
            &rows,
            &["mean".to_string(), "std".to_string()],
            &values,
            HeatScale::Sequential,
        ))
    }
}
