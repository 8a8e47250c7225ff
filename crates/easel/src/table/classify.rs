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

//! Per-value type classification.
//!
//! Each function returns a typed verdict for one raw value. Callers count
//! verdicts to decide whether a whole column converts.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Verdict on one numeric candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberParse {
    /// Parsed finite value.
    Number(f64),
    /// Anything else.
    NotNumber,
}

impl NumberParse {
    /// Parsed value, if any.
    pub fn value(self) -> Option<f64> {
        match self {
            NumberParse::Number(v) => Some(v),
            NumberParse::NotNumber => None,
        }
    }
}

/// Verdict on one datetime candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeParse {
    /// Parsed timestamp.
    DateTime(NaiveDateTime),
    /// Anything else.
    NotDateTime,
}

impl DateTimeParse {
    /// Parsed value, if any.
    pub fn value(self) -> Option<NaiveDateTime> {
        match self {
            DateTimeParse::DateTime(v) => Some(v),
            DateTimeParse::NotDateTime => None,
        }
    }
}

/// Finite decimal or scientific notation. `inf` and `nan` spellings are not numbers.
pub fn classify_number(raw: &str) -> NumberParse {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return NumberParse::NotNumber;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => NumberParse::Number(v),
        _ => NumberParse::NotNumber,
    }
}

/// First of `formats` that parses, then RFC 3339.
pub fn classify_datetime(raw: &str, formats: &[String]) -> DateTimeParse {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DateTimeParse::NotDateTime;
    }
    for format in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return DateTimeParse::DateTime(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return DateTimeParse::DateTime(dt);
            }
        }
    }
    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => DateTimeParse::DateTime(dt.naive_utc()),
        Err(_) => DateTimeParse::NotDateTime,
    }
}

/// Excel serial day number (1900 date system) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(chrono::Duration::milliseconds(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_temporal_formats;

    #[test]
    fn numbers_reject_non_finite_spellings() {
        assert_eq!(classify_number(" 42 "), NumberParse::Number(42.0));
        assert_eq!(classify_number("-1.5e3"), NumberParse::Number(-1500.0));
        assert_eq!(classify_number("inf"), NumberParse::NotNumber);
        assert_eq!(classify_number("NaN"), NumberParse::NotNumber);
        assert_eq!(classify_number("12abc"), NumberParse::NotNumber);
        assert_eq!(classify_number(""), NumberParse::NotNumber);
    }

    #[test]
    fn dates_parse_with_and_without_time() {
        let formats = default_temporal_formats();
        let date = classify_datetime("2024-03-01", &formats).value().unwrap();
        assert_eq!(date.to_string(), "2024-03-01 00:00:00");
        let stamp = classify_datetime("2024-03-01 13:45:00", &formats)
            .value()
            .unwrap();
        assert_eq!(stamp.to_string(), "2024-03-01 13:45:00");
        assert_eq!(
            classify_datetime("not a date", &formats),
            DateTimeParse::NotDateTime
        );
    }

    #[test]
    fn excel_serials_use_the_1900_system() {
        let dt = excel_serial_to_datetime(45292.0).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let noon = excel_serial_to_datetime(45292.5).unwrap();
        assert_eq!(noon.to_string(), "2024-01-01 12:00:00");
    }
}
