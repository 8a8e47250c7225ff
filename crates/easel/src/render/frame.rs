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

//! Drawing scene assembled by the chart builders.

use crate::error::{RenderError, RenderResult};
use crate::render::{
    CirclePrimitive, Color, LinePrimitive, RectPrimitive, TextPrimitive, WedgePrimitive,
};

/// Backend-agnostic scene for one chart. Primitives paint in the order
/// rects, wedges, lines, circles, texts.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    /// Canvas width in pixels.
    pub width: f64,
    /// Canvas height in pixels.
    pub height: f64,
    /// Fill behind every primitive.
    pub background: Color,
    /// Bars, cells and plot backgrounds.
    pub rects: Vec<RectPrimitive>,
    /// Pie slices.
    pub wedges: Vec<WedgePrimitive>,
    /// Axes, grid lines and series lines.
    pub lines: Vec<LinePrimitive>,
    /// Scatter points and line markers.
    pub circles: Vec<CirclePrimitive>,
    /// Titles, tick labels and annotations.
    pub texts: Vec<TextPrimitive>,
}

impl RenderFrame {
    /// Empty white canvas.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            background: Color::WHITE,
            rects: Vec::new(),
            wedges: Vec::new(),
            lines: Vec::new(),
            circles: Vec::new(),
            texts: Vec::new(),
        }
    }

    /// Replaces the background fill.
    #[must_use]
    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    /// Adds a line segment.
    pub fn push_line(&mut self, line: LinePrimitive) {
        self.lines.push(line);
    }
    /// Adds a rectangle.
    pub fn push_rect(&mut self, rect: RectPrimitive) {
        self.rects.push(rect);
    }
    /// Adds a filled circle.
    pub fn push_circle(&mut self, circle: CirclePrimitive) {
        self.circles.push(circle);
    }
    /// Adds a pie slice.
    pub fn push_wedge(&mut self, wedge: WedgePrimitive) {
        self.wedges.push(wedge);
    }
    /// Adds a label.
    pub fn push_text(&mut self, text: TextPrimitive) {
        self.texts.push(text);
    }

    /// Rejects non-finite geometry, out-of-range colors and empty labels.
    pub fn validate(&self) -> RenderResult<()> {
        let finite = self.width.is_finite() && self.height.is_finite();
        if !finite || self.width <= 0.0 || self.height <= 0.0 {
            return Err(RenderError::InvalidFrame {
                reason: format!("canvas {}x{} must be positive", self.width, self.height),
            });
        }
        self.background.validate()?;
        for rect in &self.rects {
            rect.validate()?;
        }
        for wedge in &self.wedges {
            wedge.validate()?;
        }
        for line in &self.lines {
            line.validate()?;
        }
        for circle in &self.circles {
            circle.validate()?;
        }
        for text in &self.texts {
            text.validate()?;
        }
        Ok(())
    }

    /// No primitive of any kind.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
            && self.rects.is_empty()
            && self.circles.is_empty()
            && self.wedges.is_empty()
            && self.texts.is_empty()
    }

    /// Label strings in paint order.
    pub fn text_labels(&self) -> impl Iterator<Item = &str> {
        self.texts.iter().map(|t| t.text.as_str())
    }
}
