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

//! SVG serialisation of a validated [`RenderFrame`].

use crate::error::RenderResult;
use crate::render::{LineStrokeStyle, RenderFrame, TextHAlign};
use std::f64::consts::{PI, TAU};
use std::fmt::Write as _;

/// Escapes text for XML content and attribute values.
pub fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Serialises a frame after validating it.
pub fn to_svg(frame: &RenderFrame) -> RenderResult<String> {
    frame.validate()?;
    let mut svg = String::new();

    writeln!(
        svg,
        "<svg xmlns='http://www.w3.org/2000/svg' width='{:.0}' height='{:.0}' \
         viewBox='0 0 {:.0} {:.0}' role='img'>",
        frame.width, frame.height, frame.width, frame.height
    )?;
    writeln!(
        svg,
        "  <rect x='0' y='0' width='{:.0}' height='{:.0}' fill='{}'/>",
        frame.width,
        frame.height,
        frame.background.hex()
    )?;

    for rect in &frame.rects {
        write!(
            svg,
            "  <rect x='{:.2}' y='{:.2}' width='{:.2}' height='{:.2}' \
             fill='{}' fill-opacity='{:.2}'",
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            rect.fill.hex(),
            rect.fill.alpha
        )?;
        if let Some(stroke) = rect.stroke {
            write!(svg, " stroke='{}' stroke-width='1'", stroke.hex())?;
        }
        writeln!(svg, "/>")?;
    }

    for wedge in &frame.wedges {
        let sweep = wedge.end - wedge.start;
        if sweep >= TAU - 1e-9 {
            writeln!(
                svg,
                "  <circle cx='{:.2}' cy='{:.2}' r='{:.2}' fill='{}' \
                 stroke='#ffffff' stroke-width='1'/>",
                wedge.cx,
                wedge.cy,
                wedge.radius,
                wedge.fill.hex()
            )?;
            continue;
        }
        let (x1, y1) = wedge.point_at(wedge.start, wedge.radius);
        let (x2, y2) = wedge.point_at(wedge.end, wedge.radius);
        let large_arc = u8::from(sweep > PI);
        writeln!(
            svg,
            "  <path d='M {:.2} {:.2} L {:.2} {:.2} A {:.2} {:.2} 0 {} 1 {:.2} {:.2} Z' \
             fill='{}' stroke='#ffffff' stroke-width='1'/>",
            wedge.cx, wedge.cy, x1, y1, wedge.radius, wedge.radius, large_arc, x2, y2,
            wedge.fill.hex()
        )?;
    }

    for line in &frame.lines {
        let dash = match line.style {
            LineStrokeStyle::Solid => "",
            LineStrokeStyle::Dashed => " stroke-dasharray='4 4'",
        };
        writeln!(
            svg,
            "  <line x1='{:.2}' y1='{:.2}' x2='{:.2}' y2='{:.2}' \
             stroke='{}' stroke-opacity='{:.2}' stroke-width='{:.2}'{}/>",
            line.x1,
            line.y1,
            line.x2,
            line.y2,
            line.color.hex(),
            line.color.alpha,
            line.stroke_width,
            dash
        )?;
    }

    for circle in &frame.circles {
        writeln!(
            svg,
            "  <circle cx='{:.2}' cy='{:.2}' r='{:.2}' fill='{}' fill-opacity='{:.2}'/>",
            circle.cx,
            circle.cy,
            circle.radius,
            circle.fill.hex(),
            circle.fill.alpha
        )?;
    }

    for text in &frame.texts {
        let anchor = match text.h_align {
            TextHAlign::Left => "start",
            TextHAlign::Center => "middle",
            TextHAlign::Right => "end",
        };
        write!(
            svg,
            "  <text x='{:.2}' y='{:.2}' font-family='Helvetica, Arial, sans-serif' \
             font-size='{:.1}' fill='{}' text-anchor='{}'",
            text.x,
            text.y,
            text.font_size_px,
            text.color.hex(),
            anchor
        )?;
        if text.bold {
            write!(svg, " font-weight='bold'")?;
        }
        if text.rotation != 0.0 {
            write!(
                svg,
                " transform='rotate({:.1} {:.2} {:.2})'",
                text.rotation, text.x, text.y
            )?;
        }
        writeln!(svg, ">{}</text>", escape_xml(&text.text))?;
    }

    writeln!(svg, "</svg>")?;
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Color, RectPrimitive, TextPrimitive, WedgePrimitive};

    #[test]
    fn text_is_escaped() {
        let mut frame = RenderFrame::new(100.0, 50.0);
        frame.push_text(TextPrimitive::new(
            "R&D <total>",
            10.0,
            20.0,
            12.0,
            Color::TEXT,
            TextHAlign::Left,
        ));
        let svg = to_svg(&frame).unwrap();
        assert!(svg.contains("R&amp;D &lt;total&gt;"));
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn invalid_frames_are_not_serialised() {
        let mut frame = RenderFrame::new(100.0, 50.0);
        frame.push_rect(RectPrimitive::new(0.0, 0.0, f64::NAN, 1.0, Color::BLACK));
        assert!(to_svg(&frame).is_err());
    }

    #[test]
    fn full_wedges_become_circles() {
        let mut frame = RenderFrame::new(100.0, 100.0);
        frame.push_wedge(WedgePrimitive {
            cx: 50.0,
            cy: 50.0,
            radius: 40.0,
            start: 0.0,
            end: TAU,
            fill: Color::BLACK,
        });
        let svg = to_svg(&frame).unwrap();
        assert!(svg.contains("<circle cx='50.00'"));
        assert!(!svg.contains("<path"));
    }
}
