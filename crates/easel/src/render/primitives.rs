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
//
// Frame and primitive types adapted from the chart-rs crate,
// used under the MIT license (chart-rs is dual MIT OR Apache-2.0).

//! Pixel-space draw commands and their validation.

use crate::error::{RenderError, RenderResult};

/// Frame error carrying `reason`.
fn invalid(reason: impl Into<String>) -> RenderError {
    RenderError::InvalidFrame {
        reason: reason.into(),
    }
}

/// Whether no value is NaN or infinite.
fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// RGBA color in normalized 0..=1 channel values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red channel.
    pub red: f64,
    /// Green channel.
    pub green: f64,
    /// Blue channel.
    pub blue: f64,
    /// Opacity; 1 is opaque.
    pub alpha: f64,
}

impl Color {
    /// Canvas default.
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    /// Axes and outlines.
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    /// Titles and labels.
    pub const TEXT: Color = Color::rgb(0.17, 0.17, 0.2);
    /// Translucent grid lines.
    pub const GRID: Color = Color::rgba(0.0, 0.0, 0.0, 0.3);
    /// Background of a chart that could not be drawn.
    pub const PLACEHOLDER: Color = Color::rgb(0.96, 0.96, 0.96);

    /// Color with explicit opacity.
    #[must_use]
    pub const fn rgba(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Opaque color.
    #[must_use]
    pub const fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self::rgba(red, green, blue, 1.0)
    }

    /// Linear blend towards `other`; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Color, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::rgba(
            self.red + (other.red - self.red) * t,
            self.green + (other.green - self.green) * t,
            self.blue + (other.blue - self.blue) * t,
            self.alpha + (other.alpha - self.alpha) * t,
        )
    }

    /// `#rrggbb`; alpha is emitted separately as an opacity attribute.
    pub fn hex(self) -> String {
        let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.red),
            channel(self.green),
            channel(self.blue)
        )
    }

    /// Every channel finite and within `[0, 1]`.
    pub fn validate(self) -> RenderResult<()> {
        for (channel, value) in [
            ("red", self.red),
            ("green", self.green),
            ("blue", self.blue),
            ("alpha", self.alpha),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!(
                    "color channel `{channel}` must be finite and in [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Qualitative palette cycled across bars and slices.
pub const PALETTE: [Color; 10] = [
    Color::rgb(0.553, 0.827, 0.780),
    Color::rgb(0.992, 0.706, 0.384),
    Color::rgb(0.745, 0.729, 0.855),
    Color::rgb(0.984, 0.502, 0.447),
    Color::rgb(0.502, 0.694, 0.827),
    Color::rgb(0.702, 0.871, 0.412),
    Color::rgb(0.988, 0.804, 0.898),
    Color::rgb(0.851, 0.851, 0.851),
    Color::rgb(0.737, 0.502, 0.741),
    Color::rgb(0.800, 0.922, 0.773),
];

/// Palette entry for `index`, wrapping around.
pub fn palette(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

/// Stroke pattern of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStrokeStyle {
    /// Continuous stroke.
    Solid,
    /// Dash pattern, used for reference lines.
    Dashed,
}

/// Draw command for one line segment in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePrimitive {
    /// Start x.
    pub x1: f64,
    /// Start y.
    pub y1: f64,
    /// End x.
    pub x2: f64,
    /// End y.
    pub y2: f64,
    /// Stroke width in pixels.
    pub stroke_width: f64,
    /// Stroke color.
    pub color: Color,
    /// Solid or dashed.
    pub style: LineStrokeStyle,
}

impl LinePrimitive {
    /// Solid segment from `(x1, y1)` to `(x2, y2)`.
    #[must_use]
    pub const fn new(
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        stroke_width: f64,
        color: Color,
    ) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            stroke_width,
            color,
            style: LineStrokeStyle::Solid,
        }
    }

    /// Same segment with a dashed stroke.
    #[must_use]
    pub const fn dashed(mut self) -> Self {
        self.style = LineStrokeStyle::Dashed;
        self
    }

    /// Finite endpoints and a positive stroke width.
    pub fn validate(self) -> RenderResult<()> {
        if !all_finite(&[self.x1, self.y1, self.x2, self.y2]) {
            return Err(invalid("line coordinates must be finite"));
        }
        if !self.stroke_width.is_finite() || self.stroke_width <= 0.0 {
            return Err(invalid("line stroke width must be finite and > 0"));
        }
        self.color.validate()
    }
}

/// Axis-aligned rectangle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectPrimitive {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in pixels, never negative.
    pub width: f64,
    /// Height in pixels, never negative.
    pub height: f64,
    /// Fill color.
    pub fill: Color,
    /// Outline, if any.
    pub stroke: Option<Color>,
}

impl RectPrimitive {
    /// Filled rectangle without outline.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64, fill: Color) -> Self {
        Self {
            x,
            y,
            width,
            height,
            fill,
            stroke: None,
        }
    }

    /// Adds an outline.
    #[must_use]
    pub const fn with_stroke(mut self, stroke: Color) -> Self {
        self.stroke = Some(stroke);
        self
    }

    /// Finite geometry and a non-negative size.
    pub fn validate(self) -> RenderResult<()> {
        if !all_finite(&[self.x, self.y, self.width, self.height]) {
            return Err(invalid("rect geometry must be finite"));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(invalid("rect size must be >= 0"));
        }
        self.fill.validate()?;
        self.stroke.map_or(Ok(()), Color::validate)
    }
}

/// Filled circle in pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CirclePrimitive {
    /// Center x.
    pub cx: f64,
    /// Center y.
    pub cy: f64,
    /// Radius in pixels.
    pub radius: f64,
    /// Fill color.
    pub fill: Color,
}

impl CirclePrimitive {
    /// Circle centred on `(cx, cy)`.
    #[must_use]
    pub const fn new(cx: f64, cy: f64, radius: f64, fill: Color) -> Self {
        Self {
            cx,
            cy,
            radius,
            fill,
        }
    }

    /// Finite center and a positive radius.
    pub fn validate(self) -> RenderResult<()> {
        if !all_finite(&[self.cx, self.cy, self.radius]) || self.radius <= 0.0 {
            return Err(invalid("circle must have finite center and radius > 0"));
        }
        self.fill.validate()
    }
}

/// Pie slice between two angles in radians, clockwise from 12 o'clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WedgePrimitive {
    /// Pie center x.
    pub cx: f64,
    /// Pie center y.
    pub cy: f64,
    /// Pie radius.
    pub radius: f64,
    /// Start angle.
    pub start: f64,
    /// End angle, greater than `start`.
    pub end: f64,
    /// Fill color.
    pub fill: Color,
}

impl WedgePrimitive {
    /// Finite geometry, positive radius and positive sweep.
    pub fn validate(self) -> RenderResult<()> {
        if !all_finite(&[self.cx, self.cy, self.radius, self.start, self.end]) {
            return Err(invalid("wedge geometry must be finite"));
        }
        if self.radius <= 0.0 || self.end <= self.start {
            return Err(invalid("wedge must have radius > 0 and a positive sweep"));
        }
        self.fill.validate()
    }

    /// Point on the arc at `angle`.
    pub fn point_at(&self, angle: f64, radius: f64) -> (f64, f64) {
        (
            self.cx + radius * angle.sin(),
            self.cy - radius * angle.cos(),
        )
    }
}

/// Horizontal text alignment relative to `TextPrimitive::x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextHAlign {
    /// Text starts at the anchor.
    Left,
    /// Text is centred on the anchor.
    Center,
    /// Text ends at the anchor.
    Right,
}

/// Draw command for one label in pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPrimitive {
    /// Label content, never empty.
    pub text: String,
    /// Anchor x.
    pub x: f64,
    /// Baseline y.
    pub y: f64,
    /// Font size in pixels.
    pub font_size_px: f64,
    /// Fill color.
    pub color: Color,
    /// Alignment relative to the anchor.
    pub h_align: TextHAlign,
    /// Bold weight.
    pub bold: bool,
    /// Degrees, clockwise, around the anchor point.
    pub rotation: f64,
}

impl TextPrimitive {
    /// Upright, regular-weight label.
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        x: f64,
        y: f64,
        font_size_px: f64,
        color: Color,
        h_align: TextHAlign,
    ) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            font_size_px,
            color,
            h_align,
            bold: false,
            rotation: 0.0,
        }
    }

    /// Same label in bold.
    #[must_use]
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Same label rotated by `degrees`.
    #[must_use]
    pub fn rotated(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    /// Non-empty text, finite anchor and a positive font size.
    pub fn validate(&self) -> RenderResult<()> {
        if self.text.is_empty() {
            return Err(invalid("text primitive must not be empty"));
        }
        if !all_finite(&[self.x, self.y, self.rotation]) {
            return Err(invalid("text coordinates must be finite"));
        }
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(invalid("font size must be finite and > 0"));
        }
        self.color.validate()
    }
}
