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
//! Delimited text input: encoding fallback, header repair and cell typing.

use crate::error::{LoadError, LoadResult};
use crate::table::{classify_number, Cell, Column, NumberParse, Table};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info};

/// UTF-8 byte order mark.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Text encodings the delimited reader can try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    /// Strict UTF-8.
    #[serde(rename = "utf-8")]
    Utf8,
    /// UTF-8 with an optional leading byte order mark.
    #[serde(rename = "utf-8-sig")]
    Utf8Bom,
    /// WHATWG `windows-1252`, the label browsers use for Latin-1.
    #[serde(rename = "latin1")]
    Latin1,
    /// Byte-per-char ISO-8859-1; never fails.
    #[serde(rename = "iso-8859-1")]
    Iso8859_1,
}

impl TextEncoding {
    /// Order tried when none is configured.
    pub const DEFAULT_ORDER: [TextEncoding; 4] = [
        TextEncoding::Utf8,
        TextEncoding::Utf8Bom,
        TextEncoding::Latin1,
        TextEncoding::Iso8859_1,
    ];

    /// Label used in config files and logs.
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Bom => "utf-8-sig",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Iso8859_1 => "iso-8859-1",
        }
    }

    /// `None` when the bytes are not valid in this encoding.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            TextEncoding::Utf8Bom => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(Cow::Borrowed)
            }
            TextEncoding::Latin1 => {
                encoding_rs::WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
            TextEncoding::Iso8859_1 => {
                Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
            }
        }
    }
}

/// Decoded text and the encoding that produced it.
pub fn decode_with_fallback<'a>(
    bytes: &'a [u8],
    encodings: &[TextEncoding],
) -> Option<(Cow<'a, str>, TextEncoding)> {
    encodings.iter().find_map(|encoding| {
        let decoded = encoding.decode(bytes);
        if decoded.is_none() {
            debug!(encoding = encoding.label(), "Decoding failed, trying next encoding");
        }
        decoded.map(|text| (text, *encoding))
    })
}

/// Reads a comma-separated file, trying `encodings` in order.
pub fn read_delimited(
    path: &Path,
    encodings: &[TextEncoding],
) -> LoadResult<(Table, TextEncoding)> {
    let unreadable = |reason: String| LoadError::UnreadableFile {
        path: path.display().to_string(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| unreadable(e.to_string()))?;
    let (text, encoding) = decode_with_fallback(&bytes, encodings).ok_or_else(|| {
        let tried: Vec<&str> = encodings.iter().map(TextEncoding::label).collect();
        unreadable(format!("no encoding succeeded (tried {})", tried.join(", ")))
    })?;
    let table = parse_delimited(&text).map_err(unreadable)?;
    info!(
        path = %path.display(),
        encoding = encoding.label(),
        rows = table.row_count(),
        columns = table.column_count(),
        "Loaded delimited file"
    );
    Ok((table, encoding))
}

/// Parses comma-separated text with a mandatory header row.
pub fn parse_delimited(text: &str) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err("missing header row".to_string());
    }
    let headers = disambiguate_headers(headers);
    let width = headers.len();
    let mut raw: Vec<Vec<String>> = vec![Vec::new(); width];
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;
        if record.len() > width {
            return Err(format!(
                "row {} has {} fields, header has {width}",
                line + 2,
                record.len()
            ));
        }
        for (index, values) in raw.iter_mut().enumerate() {
            values.push(record.get(index).unwrap_or("").to_string());
        }
    }
    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, values)| infer_column(name, values))
        .collect();
    Ok(Table::new(columns))
}

/// Numeric when every non-empty value is a number; text otherwise.
fn infer_column(name: String, values: Vec<String>) -> Column {
    let parsed: Vec<NumberParse> = values
        .iter()
        .filter(|v| !v.trim().is_empty())
        .map(|v| classify_number(v))
        .collect();
    let numeric = !parsed.is_empty() && parsed.iter().all(|p| matches!(p, NumberParse::Number(_)));
    let cells = values
        .into_iter()
        .map(|value| {
            if value.trim().is_empty() {
                Cell::Missing
            } else if numeric {
                classify_number(&value).value().map_or(Cell::Missing, Cell::Number)
            } else {
                Cell::Text(value)
            }
        })
        .collect();
    Column::new(name, cells)
}

/// Blank headers become `Unnamed: i`; repeats gain `.1`, `.2` suffixes.
pub(crate) fn disambiguate_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for (index, header) in headers.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {index}")
        } else {
            header
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        seen.push(candidate);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_bytes_fall_through_utf8() {
        let bytes = b"name\ncaf\xe9\n";
        let (text, encoding) = decode_with_fallback(bytes, &TextEncoding::DEFAULT_ORDER).unwrap();
        assert_eq!(encoding, TextEncoding::Latin1);
        assert_eq!(text, "name\ncafé\n");
    }

    #[test]
    fn bom_prefixed_text_decodes_as_utf8_first() {
        let bytes = b"\xef\xbb\xbfa,b\n1,2\n";
        let (_, encoding) = decode_with_fallback(bytes, &TextEncoding::DEFAULT_ORDER).unwrap();
        assert_eq!(encoding, TextEncoding::Utf8);
    }

    #[test]
    fn headers_are_disambiguated() {
        let headers = vec!["a".to_string(), "".to_string(), "a".to_string(), "a".to_string()];
        assert_eq!(
            disambiguate_headers(headers),
            vec!["a", "Unnamed: 1", "a.1", "a.2"]
        );
    }

    #[test]
    fn wide_rows_are_rejected() {
        let err = parse_delimited("a,b\n1,2,3\n").unwrap_err();
        assert!(err.contains("3 fields"));
    }

    #[test]
    fn short_rows_are_padded_and_columns_inferred() {
        let table = parse_delimited("id,label\n1,x\n2\n").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns()[0].numbers(), vec![1.0, 2.0]);
        assert!(table.columns()[1].cells()[1].is_missing());
    }
}
