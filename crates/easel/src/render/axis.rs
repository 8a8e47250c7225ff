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

//! Axis labelling: unit inference, tick placement and tick text.

/// Name fragments for money.
const CURRENCY: &[&str] = &["price", "cost", "revenue", "profit", "sales", "amount"];
/// Name fragments for rates.
const PERCENTAGE: &[&str] = &["percent", "rate", "%"];
/// Name fragments for counts.
const COUNT: &[&str] = &["count", "number", "qty", "quantity"];
/// Name fragments for durations.
const TIME: &[&str] = &["time", "duration", "hours", "minutes"];
/// Name fragments for weights.
const WEIGHT: &[&str] = &["weight", "mass"];
/// Name fragments for lengths.
const DISTANCE: &[&str] = &["distance", "length", "height"];
/// Name fragments for temperatures.
const TEMPERATURE: &[&str] = &["temperature", "temp"];

/// Value-axis title for count charts.
pub const FREQUENCY_LABEL: &str = "Frequency (Count)";
/// Label length that forces rotation.
const ROTATE_LABEL_LEN: usize = 10;
/// Label count that forces rotation.
const ROTATE_LABEL_COUNT: usize = 6;

/// Unit suffix for an axis title, keyword match first, magnitude second.
/// Non-empty suffixes carry a leading space.
pub fn detect_unit(column: &str, max_value: f64) -> &'static str {
    let lowered = column.to_lowercase();
    let matches = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

    if matches(CURRENCY) {
        scaled(max_value, " ($ Millions)", " ($ Thousands)", " ($)")
    } else if matches(PERCENTAGE) {
        " (%)"
    } else if matches(COUNT) {
        scaled(max_value, " (Millions)", " (Thousands)", " (Count)")
    } else if matches(TIME) {
        " (Time)"
    } else if matches(WEIGHT) {
        " (kg)"
    } else if matches(DISTANCE) {
        " (m)"
    } else if matches(TEMPERATURE) {
        " (°C)"
    } else {
        scaled(max_value, " (Millions)", " (Thousands)", "")
    }
}

/// Suffix for the magnitude of `max_value`.
fn scaled(
    max_value: f64,
    millions: &'static str,
    thousands: &'static str,
    base: &'static str,
) -> &'static str {
    if max_value >= 1_000_000.0 {
        millions
    } else if max_value >= 1_000.0 {
        thousands
    } else {
        base
    }
}

/// Tick text. Axes whose data reaches 1000 use K/M abbreviations.
pub fn format_tick(value: f64, axis_max: f64) -> String {
    if axis_max >= 1_000.0 {
        if value.abs() >= 1_000_000.0 {
            format!("{:.1}M", value / 1_000_000.0)
        } else if value.abs() >= 1_000.0 {
            format!("{:.1}K", value / 1_000.0)
        } else {
            format!("{value:.0}")
        }
    } else {
        plain(value)
    }
}

/// Up to two decimals, trailing zeros dropped.
fn plain(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.2}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Extends `[min, max]` by `padding` of the range on each side. A zero range
/// is widened by one unit so the axis stays drawable.
pub fn padded_range(min: f64, max: f64, padding: f64) -> (f64, f64) {
    let range = max - min;
    if range > 0.0 {
        (min - range * padding, max + range * padding)
    } else {
        (min - 1.0, max + 1.0)
    }
}

/// Smallest 1, 2 or 5 times a power of ten at or above `raw`.
fn nice_step(raw: f64) -> f64 {
    if raw <= 0.0 || !raw.is_finite() {
        return 1.0;
    }
    let magnitude = 10f64.powf(raw.log10().floor());
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Round-valued ticks inside `[min, max]`, roughly `target` of them.
pub fn nice_ticks(min: f64, max: f64, target: usize) -> Vec<f64> {
    if !(min.is_finite() && max.is_finite()) || max <= min {
        return vec![min];
    }
    let step = nice_step((max - min) / target.max(1) as f64);
    let first = (min / step).ceil() as i64;
    let last = (max / step).floor() as i64;
    (first..=last)
        .map(|i| {
            let tick = i as f64 * step;
            // snap float noise such as 0.30000000000000004
            (tick / step).round() * step
        })
        .collect()
}

/// Category labels rotate when any is long or there are many of them.
pub fn should_rotate<S: AsRef<str>>(labels: &[S]) -> bool {
    labels.len() > ROTATE_LABEL_COUNT
        || labels
            .iter()
            .any(|l| l.as_ref().chars().count() > ROTATE_LABEL_LEN)
}

/// Linear mapping from a data interval onto a pixel interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    /// Data interval.
    pub domain: (f64, f64),
    /// Pixel interval.
    pub range: (f64, f64),
}

impl Scale {
    /// Scale from `domain` onto `range`.
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Pixel position of `value`; a zero-width domain maps to the middle.
    pub fn map(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return (r0 + r1) / 2.0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revenue_in_millions() {
        assert_eq!(detect_unit("Revenue", 2_500_000.0), " ($ Millions)");
        assert_eq!(format_tick(2_500_000.0, 2_500_000.0), "2.5M");
    }

    #[test]
    fn keyword_precedes_magnitude() {
        assert_eq!(detect_unit("Growth Rate", 5_000_000.0), " (%)");
        assert_eq!(detect_unit("Order Count", 12_000.0), " (Thousands)");
        assert_eq!(detect_unit("Body Weight", 80.0), " (kg)");
        assert_eq!(detect_unit("Score", 4_000.0), " (Thousands)");
        assert_eq!(detect_unit("Score", 40.0), "");
    }

    #[test]
    fn small_axes_keep_plain_ticks() {
        assert_eq!(format_tick(12.0, 900.0), "12");
        assert_eq!(format_tick(0.25, 1.0), "0.25");
        assert_eq!(format_tick(1_500.0, 2_000.0), "1.5K");
        assert_eq!(format_tick(250.0, 2_000.0), "250");
    }

    #[test]
    fn ticks_land_on_round_values() {
        let (low, high) = padded_range(500_000.0, 2_500_000.0, 0.05);
        assert_eq!((low, high), (400_000.0, 2_600_000.0));
        let ticks = nice_ticks(low, high, 5);
        assert_eq!(
            ticks,
            vec![500_000.0, 1_000_000.0, 1_500_000.0, 2_000_000.0, 2_500_000.0]
        );
    }

    #[test]
    fn rotation_rules() {
        assert!(!should_rotate(&["A", "B", "C"]));
        assert!(should_rotate(&["North America"]));
        assert!(should_rotate(&["a", "b", "c", "d", "e", "f", "g"]));
    }
}
