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

//! Frame builders, one per chart shape. Builders take already-reduced data
//! and lay it out in pixel space; they never touch a
//! [`Table`](crate::table::Table).

use crate::render::aggregate::Bin;
use crate::render::axis::{self, Scale, FREQUENCY_LABEL};
use crate::render::{
    palette, CirclePrimitive, Color, LinePrimitive, RectPrimitive, RenderFrame, TextHAlign,
    TextPrimitive, WedgePrimitive,
};
use std::f64::consts::TAU;

/// Ticks aimed for per value axis.
const TICK_TARGET: usize = 6;
/// Category label length before clipping.
const MAX_LABEL_CHARS: usize = 24;
/// Line and scatter colour.
const SERIES: Color = Color::rgb(0.122, 0.467, 0.706);
/// Histogram bar fill.
const HISTOGRAM_FILL: Color = Color::rgba(0.529, 0.808, 0.922, 0.7);
/// Correlation scale at -1.
const COOL: Color = Color::rgb(0.230, 0.299, 0.754);
/// Correlation scale at 0.
const NEUTRAL: Color = Color::rgb(0.865, 0.865, 0.865);
/// Correlation scale at 1.
const WARM: Color = Color::rgb(0.706, 0.016, 0.150);
/// Sequential scale minimum.
const VIRIDIS_LOW: Color = Color::rgb(0.267, 0.005, 0.329);
/// Sequential scale maximum.
const VIRIDIS_HIGH: Color = Color::rgb(0.993, 0.906, 0.144);

/// Pixel rectangle inside the axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Right edge.
    pub right: f64,
    /// Bottom edge.
    pub bottom: f64,
}

impl PlotArea {
    /// Area with the default margins.
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_margins(width, height, 90.0, 30.0, 60.0, 110.0)
    }

    /// Area inset by the given margins, never narrower than one pixel.
    pub fn with_margins(
        width: f64,
        height: f64,
        left: f64,
        right: f64,
        top: f64,
        bottom: f64,
    ) -> Self {
        Self {
            left,
            top,
            right: (width - right).max(left + 1.0),
            bottom: (height - bottom).max(top + 1.0),
        }
    }

    /// Horizontal extent.
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Vertical extent.
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// How tick values print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFormat {
    /// Abbreviated numbers.
    Number,
    /// Values are seconds since the epoch.
    Date,
}

/// A numeric axis: title, padded domain and the magnitude that picks tick text.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueAxis {
    /// Axis title.
    pub label: String,
    /// Lower end of the padded domain.
    pub min: f64,
    /// Upper end of the padded domain.
    pub max: f64,
    /// Largest data value; picks K/M tick text.
    pub magnitude: f64,
    /// Tick text style.
    pub format: TickFormat,
}

impl ValueAxis {
    /// Axis over `values` padded by `padding` of the range. `include_zero`
    /// anchors bar baselines. The unit suffix is inferred from `column`.
    pub fn numeric(column: &str, values: &[f64], padding: f64, include_zero: bool) -> Self {
        let (mut low, mut high) = bounds(values);
        if include_zero {
            low = low.min(0.0);
            high = high.max(0.0);
        }
        let data_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (min, max) = axis::padded_range(low, high, padding);
        Self {
            label: format!("{column}{}", axis::detect_unit(column, data_max)),
            min,
            max,
            magnitude: data_max,
            format: TickFormat::Number,
        }
    }

    /// Count axis starting at zero.
    pub fn counts(label: &str, max_count: f64, padding: f64) -> Self {
        let (_, max) = axis::padded_range(0.0, max_count.max(1.0), padding);
        Self {
            label: label.to_string(),
            min: 0.0,
            max,
            magnitude: max_count,
            format: TickFormat::Number,
        }
    }

    /// Date axis over epoch seconds.
    pub fn dates(column: &str, values: &[f64], padding: f64) -> Self {
        let (low, high) = bounds(values);
        let (min, max) = axis::padded_range(low, high, padding);
        Self {
            label: column.to_string(),
            min,
            max,
            magnitude: 0.0,
            format: TickFormat::Date,
        }
    }

    /// Plain label, no unit inference.
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Text for the tick at `value`.
    pub fn tick_text(&self, value: f64) -> String {
        match self.format {
            TickFormat::Number => axis::format_tick(value, self.magnitude),
            TickFormat::Date => chrono::DateTime::from_timestamp(value as i64, 0)
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| axis::format_tick(value, 0.0)),
        }
    }
}

/// Min and max of `values`; `(0, 1)` when empty.
fn bounds(values: &[f64]) -> (f64, f64) {
    let low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if low.is_finite() && high.is_finite() {
        (low, high)
    } else {
        (0.0, 1.0)
    }
}

/// Horizontal axis of a line chart.
#[derive(Debug, Clone, PartialEq)]
pub enum XAxis {
    /// Continuous values.
    Values(ValueAxis),
    /// Ordinal positions `0..n` labelled with these strings.
    Categories {
        /// Axis title.
        label: String,
        /// Tick labels in position order.
        categories: Vec<String>,
    },
}

/// Label shortened to [`MAX_LABEL_CHARS`] with an ellipsis.
fn clip_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        label.to_string()
    } else {
        let head: String = label.chars().take(MAX_LABEL_CHARS - 3).collect();
        format!("{head}...")
    }
}

/// Empty frame carrying the chart title.
fn base_frame(width: f64, height: f64, title: &str) -> RenderFrame {
    let mut frame = RenderFrame::new(width, height);
    frame.push_text(
        TextPrimitive::new(
            clip_title(title),
            width / 2.0,
            34.0,
            18.0,
            Color::TEXT,
            TextHAlign::Center,
        )
        .bold(),
    );
    frame
}

/// `title`, or "Chart" when blank.
fn clip_title(title: &str) -> String {
    if title.trim().is_empty() {
        "Chart".to_string()
    } else {
        title.to_string()
    }
}

/// Left and bottom axis lines.
fn draw_axes_lines(frame: &mut RenderFrame, area: PlotArea) {
    let PlotArea {
        left,
        top,
        right,
        bottom,
    } = area;
    frame.push_line(LinePrimitive::new(left, top, left, bottom, 1.0, Color::BLACK));
    frame.push_line(LinePrimitive::new(left, bottom, right, bottom, 1.0, Color::BLACK));
}

/// Value-axis ticks, grid and title; returns the vertical scale.
fn draw_y_axis(frame: &mut RenderFrame, area: PlotArea, axis: &ValueAxis) -> Scale {
    let scale = Scale::new((axis.min, axis.max), (area.bottom, area.top));
    for tick in axis::nice_ticks(axis.min, axis.max, TICK_TARGET) {
        let y = scale.map(tick);
        frame.push_line(
            LinePrimitive::new(area.left, y, area.right, y, 0.8, Color::GRID).dashed(),
        );
        frame.push_text(TextPrimitive::new(
            axis.tick_text(tick),
            area.left - 8.0,
            y + 4.0,
            11.0,
            Color::TEXT,
            TextHAlign::Right,
        ));
    }
    if !axis.label.is_empty() {
        let mid = (area.top + area.bottom) / 2.0;
        frame.push_text(
            TextPrimitive::new(
                axis.label.clone(),
                22.0,
                mid,
                13.0,
                Color::TEXT,
                TextHAlign::Center,
            )
            .bold()
            .rotated(-90.0),
        );
    }
    scale
}

/// Horizontal axis title.
fn draw_x_label(frame: &mut RenderFrame, area: PlotArea, label: &str) {
    if !label.is_empty() {
        let y = frame.height - 16.0;
        frame.push_text(
            TextPrimitive::new(
                label,
                (area.left + area.right) / 2.0,
                y,
                13.0,
                Color::TEXT,
                TextHAlign::Center,
            )
            .bold(),
        );
    }
}

/// Continuous x ticks and grid; returns the horizontal scale.
fn draw_x_values(frame: &mut RenderFrame, area: PlotArea, axis: &ValueAxis) -> Scale {
    let scale = Scale::new((axis.min, axis.max), (area.left, area.right));
    let ticks = axis::nice_ticks(axis.min, axis.max, TICK_TARGET);
    let labels: Vec<String> = ticks.iter().map(|t| axis.tick_text(*t)).collect();
    let rotate = axis.format == TickFormat::Date && axis::should_rotate(&labels);
    for (tick, label) in ticks.iter().zip(labels) {
        let x = scale.map(*tick);
        frame.push_line(
            LinePrimitive::new(x, area.top, x, area.bottom, 0.8, Color::GRID).dashed(),
        );
        push_x_tick(frame, area, x, label, rotate);
    }
    draw_x_label(frame, area, &axis.label);
    scale
}

/// One x tick label, rotated when asked.
fn push_x_tick(frame: &mut RenderFrame, area: PlotArea, x: f64, label: String, rotate: bool) {
    if rotate {
        frame.push_text(
            TextPrimitive::new(
                label,
                x,
                area.bottom + 14.0,
                11.0,
                Color::TEXT,
                TextHAlign::Right,
            )
            .rotated(-45.0),
        );
    } else {
        frame.push_text(TextPrimitive::new(
            label,
            x,
            area.bottom + 18.0,
            11.0,
            Color::TEXT,
            TextHAlign::Center,
        ));
    }
}

/// Band centers for `categories` across the plot width.
fn draw_x_categories(
    frame: &mut RenderFrame,
    area: PlotArea,
    label: &str,
    categories: &[String],
) -> Vec<f64> {
    let band = area.width() / categories.len().max(1) as f64;
    let rotate = axis::should_rotate(categories);
    let centers: Vec<f64> = (0..categories.len())
        .map(|i| area.left + band * (i as f64 + 0.5))
        .collect();
    for (center, category) in centers.iter().zip(categories) {
        push_x_tick(frame, area, *center, clip_label(category), rotate);
    }
    draw_x_label(frame, area, label);
    centers
}

/// One bar per `(label, value)`, baseline at zero.
pub fn bar_chart(
    size: (f64, f64),
    title: &str,
    x_label: &str,
    bars: &[(String, f64)],
    y_axis: &ValueAxis,
) -> RenderFrame {
    let (width, height) = size;
    let mut frame = base_frame(width, height, title);
    let area = PlotArea::new(width, height);
    let scale = draw_y_axis(&mut frame, area, y_axis);
    let categories: Vec<String> = bars.iter().map(|(k, _)| k.clone()).collect();
    let centers = draw_x_categories(&mut frame, area, x_label, &categories);
    let bar_width = area.width() / bars.len().max(1) as f64 * 0.7;
    let baseline = scale.map(0.0_f64.clamp(y_axis.min, y_axis.max));
    for (i, ((_, value), center)) in bars.iter().zip(&centers).enumerate() {
        let top = scale.map(*value);
        frame.push_rect(
            RectPrimitive::new(
                center - bar_width / 2.0,
                top.min(baseline),
                bar_width,
                (baseline - top).abs(),
                palette(i),
            )
            .with_stroke(Color::rgb(0.3, 0.3, 0.3)),
        );
    }
    draw_axes_lines(&mut frame, area);
    frame
}

/// Bars spanning each bin's edges.
pub fn histogram_chart(
    size: (f64, f64),
    title: &str,
    bins: &[Bin],
    x_axis: &ValueAxis,
    padding: f64,
) -> RenderFrame {
    let (width, height) = size;
    let mut frame = base_frame(width, height, title);
    let area = PlotArea::new(width, height);
    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;
    let y_axis = ValueAxis::counts(FREQUENCY_LABEL, max_count, padding);
    let y_scale = draw_y_axis(&mut frame, area, &y_axis);
    let x_scale = draw_x_values(&mut frame, area, x_axis);
    let baseline = y_scale.map(0.0);
    for bin in bins.iter().filter(|b| b.count > 0) {
        let x0 = x_scale.map(bin.low);
        let x1 = x_scale.map(bin.high);
        let top = y_scale.map(bin.count as f64);
        let bar_width = (x1 - x0 - 1.0).max(0.5);
        frame.push_rect(
            RectPrimitive::new(x0, top, bar_width, baseline - top, HISTOGRAM_FILL)
                .with_stroke(Color::rgb(0.4, 0.55, 0.65)),
        );
    }
    draw_axes_lines(&mut frame, area);
    frame
}

/// Points joined in order.
pub fn line_chart(
    size: (f64, f64),
    title: &str,
    points: &[(f64, f64)],
    x_axis: &XAxis,
    y_axis: &ValueAxis,
) -> RenderFrame {
    let (width, height) = size;
    let mut frame = base_frame(width, height, title);
    let area = PlotArea::new(width, height);
    let y_scale = draw_y_axis(&mut frame, area, y_axis);
    let x_of: Box<dyn Fn(f64) -> f64> = match x_axis {
        XAxis::Values(axis) => {
            let scale = draw_x_values(&mut frame, area, axis);
            Box::new(move |x| scale.map(x))
        }
        XAxis::Categories { label, categories } => {
            let centers = draw_x_categories(&mut frame, area, label, categories);
            Box::new(move |x| {
                let index = (x.max(0.0) as usize).min(centers.len().saturating_sub(1));
                centers.get(index).copied().unwrap_or(area.left)
            })
        }
    };
    let pixels: Vec<(f64, f64)> = points
        .iter()
        .map(|(x, y)| (x_of(*x), y_scale.map(*y)))
        .collect();
    for pair in pixels.windows(2) {
        let ((x1, y1), (x2, y2)) = (pair[0], pair[1]);
        frame.push_line(LinePrimitive::new(x1, y1, x2, y2, 2.0, SERIES));
    }
    for (x, y) in &pixels {
        frame.push_circle(CirclePrimitive::new(*x, *y, 4.0, SERIES));
    }
    draw_axes_lines(&mut frame, area);
    frame
}

/// One translucent dot per point.
pub fn scatter_chart(
    size: (f64, f64),
    title: &str,
    points: &[(f64, f64)],
    x_axis: &ValueAxis,
    y_axis: &ValueAxis,
) -> RenderFrame {
    let (width, height) = size;
    let mut frame = base_frame(width, height, title);
    let area = PlotArea::new(width, height);
    let y_scale = draw_y_axis(&mut frame, area, y_axis);
    let x_scale = draw_x_values(&mut frame, area, x_axis);
    let fill = Color { alpha: 0.6, ..SERIES };
    for (x, y) in points {
        frame.push_circle(CirclePrimitive::new(x_scale.map(*x), y_scale.map(*y), 5.0, fill));
    }
    draw_axes_lines(&mut frame, area);
    frame
}

/// Colour scale of a heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatScale {
    /// Diverging blue-white-red over [-1, 1].
    Correlation,
    /// Sequential over the observed minimum and maximum.
    Sequential,
}

/// Labelled grid of shaded cells; `None` cells read "n/a".
pub fn heatmap_chart(
    size: (f64, f64),
    title: &str,
    rows: &[String],
    columns: &[String],
    values: &[Vec<Option<f64>>],
    heat: HeatScale,
) -> RenderFrame {
    let (width, height) = size;
    let mut frame = base_frame(width, height, title);
    let area = PlotArea::with_margins(width, height, 160.0, 40.0, 60.0, 110.0);
    let cell_w = area.width() / columns.len().max(1) as f64;
    let cell_h = area.height() / rows.len().max(1) as f64;

    let observed: Vec<f64> = values.iter().flatten().flatten().copied().collect();
    let (low, high) = bounds(&observed);
    let shade = |v: f64| match heat {
        HeatScale::Correlation => {
            let t = (v.clamp(-1.0, 1.0) + 1.0) / 2.0;
            if t < 0.5 {
                COOL.lerp(NEUTRAL, t * 2.0)
            } else {
                NEUTRAL.lerp(WARM, (t - 0.5) * 2.0)
            }
        }
        HeatScale::Sequential => {
            let t = if high > low { (v - low) / (high - low) } else { 0.5 };
            VIRIDIS_LOW.lerp(VIRIDIS_HIGH, t)
        }
    };

    for (r, row) in values.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            let x = area.left + cell_w * c as f64;
            let y = area.top + cell_h * r as f64;
            let (fill, label, text_color) = match value {
                Some(v) => {
                    let fill = shade(*v);
                    let dark = 0.299 * fill.red + 0.587 * fill.green + 0.114 * fill.blue < 0.5;
                    (fill, format!("{v:.2}"), if dark { Color::WHITE } else { Color::TEXT })
                }
                None => (Color::rgb(0.9, 0.9, 0.9), "n/a".to_string(), Color::TEXT),
            };
            frame.push_rect(
                RectPrimitive::new(x, y, cell_w, cell_h, fill).with_stroke(Color::WHITE),
            );
            frame.push_text(TextPrimitive::new(
                label,
                x + cell_w / 2.0,
                y + cell_h / 2.0 + 4.0,
                12.0,
                text_color,
                TextHAlign::Center,
            ));
        }
    }

    for (r, name) in rows.iter().enumerate() {
        frame.push_text(TextPrimitive::new(
            clip_label(name),
            area.left - 8.0,
            area.top + cell_h * (r as f64 + 0.5) + 4.0,
            11.0,
            Color::TEXT,
            TextHAlign::Right,
        ));
    }
    let rotate = axis::should_rotate(columns);
    for (c, name) in columns.iter().enumerate() {
        let x = area.left + cell_w * (c as f64 + 0.5);
        push_x_tick(&mut frame, area, x, clip_label(name), rotate);
    }
    frame
}

/// Slices with non-positive weight are skipped.
pub fn pie_chart(size: (f64, f64), title: &str, slices: &[(String, f64)]) -> RenderFrame {
    let (width, height) = size;
    let mut frame = base_frame(width, height, title);
    let total: f64 = slices.iter().map(|(_, v)| v.max(0.0)).sum();
    let top = 60.0;
    let radius = ((height - top - 30.0).min(width * 0.6) / 2.0 * 0.9).max(1.0);
    let cx = width * 0.38;
    let cy = top + (height - top) / 2.0;
    let legend_x = width * 0.72;
    let mut angle = 0.0;

    for (i, (label, value)) in slices.iter().enumerate() {
        if *value <= 0.0 || total <= 0.0 {
            continue;
        }
        let share = value / total;
        let sweep = share * TAU;
        let wedge = WedgePrimitive {
            cx,
            cy,
            radius,
            start: angle,
            end: (angle + sweep).min(TAU),
            fill: palette(i),
        };
        if share >= 0.03 {
            let (lx, ly) = wedge.point_at(angle + sweep / 2.0, radius * 0.65);
            frame.push_text(TextPrimitive::new(
                format!("{:.1}%", share * 100.0),
                lx,
                ly + 4.0,
                12.0,
                Color::TEXT,
                TextHAlign::Center,
            ));
        }
        frame.push_wedge(wedge);

        let ly = top + 20.0 + 24.0 * i as f64;
        frame.push_rect(RectPrimitive::new(legend_x, ly - 11.0, 14.0, 14.0, palette(i)));
        frame.push_text(TextPrimitive::new(
            clip_label(label),
            legend_x + 22.0,
            ly,
            12.0,
            Color::TEXT,
            TextHAlign::Left,
        ));
        angle += sweep;
    }
    frame
}

/// Stand-in for a chart that could not be drawn.
pub fn placeholder(size: (f64, f64), title: &str) -> RenderFrame {
    let (width, height) = size;
    let mut frame = RenderFrame::new(width, height).with_background(Color::PLACEHOLDER);
    frame.push_text(
        TextPrimitive::new(
            format!("Chart: {}", clip_title(title)),
            width / 2.0,
            height / 2.0 - 10.0,
            20.0,
            Color::TEXT,
            TextHAlign::Center,
        )
        .bold(),
    );
    frame.push_text(TextPrimitive::new(
        "(Error in data processing)",
        width / 2.0,
        height / 2.0 + 20.0,
        16.0,
        Color::rgb(0.45, 0.45, 0.45),
        TextHAlign::Center,
    ));
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_frames_validate_and_label_every_category() {
        let bars = vec![("A".to_string(), 22.0), ("B".to_string(), 102.0), ("C".to_string(), 17.0)];
        let axis = ValueAxis::numeric("Value", &[22.0, 102.0, 17.0], 0.05, true);
        let frame = bar_chart((960.0, 540.0), "Category vs Value", "Category", &bars, &axis);
        frame.validate().unwrap();
        assert_eq!(frame.rects.len(), 3);
        for label in ["A", "B", "C", "Category vs Value"] {
            assert!(frame.text_labels().any(|t| t == label));
        }
    }

    #[test]
    fn rotated_category_labels_for_long_names() {
        let bars = vec![("North America".to_string(), 1.0)];
        let axis = ValueAxis::numeric("Sales", &[1.0], 0.05, true);
        let frame = bar_chart((960.0, 540.0), "t", "Region", &bars, &axis);
        let label = frame.texts.iter().find(|t| t.text == "North America").unwrap();
        assert_eq!(label.rotation, -45.0);
    }

    #[test]
    fn placeholder_names_the_chart() {
        let frame = placeholder((960.0, 540.0), "Revenue Trend");
        let labels: Vec<&str> = frame.text_labels().collect();
        assert_eq!(labels, vec!["Chart: Revenue Trend", "(Error in data processing)"]);
        frame.validate().unwrap();
    }

    #[test]
    fn pie_skips_empty_slices() {
        let frame = pie_chart(
            (960.0, 540.0),
            "Share",
            &[("a".to_string(), 3.0), ("b".to_string(), 0.0), ("c".to_string(), 1.0)],
        );
        assert_eq!(frame.wedges.len(), 2);
        assert!(frame.text_labels().any(|t| t == "75.0%"));
        frame.validate().unwrap();
    }

    #[test]
    fn heatmap_annotates_cells() {
        let names = vec!["a".to_string(), "b".to_string()];
        let values = vec![vec![Some(1.0), Some(-0.5)], vec![Some(-0.5), None]];
        let frame = heatmap_chart(
            (960.0, 540.0),
            "Correlation Matrix",
            &names,
            &names,
            &values,
            HeatScale::Correlation,
        );
        assert!(frame.text_labels().any(|t| t == "-0.50"));
        assert!(frame.text_labels().any(|t| t == "n/a"));
        frame.validate().unwrap();
    }
}
