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

//! JSON recovery from free-form model replies.

use crate::error::{NarrativeError, NarrativeResult};
use serde_json::Value;
use tracing::{debug, warn};

/// Pulls the JSON object out of a model reply: the whole text, then fenced
/// code blocks, then the first balanced `{...}` run.
pub fn extract_json_object(text: &str) -> NarrativeResult<Value> {
    debug!("Attempting to extract JSON from narrative response");

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        debug!("Parsed entire response as JSON");
        return Ok(value);
    }

    for (language, code_content) in extract_code_blocks(text) {
        if language.as_deref() == Some("json") || language.is_none() {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&code_content) {
                debug!("Extracted JSON from markdown code fence");
                return Ok(value);
            }
        }
    }

    if let Some(candidate) = find_json_delimiters(text, '{', '}') {
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value @ Value::Object(_)) => {
                debug!("Extracted JSON object from surrounding text");
                return Ok(value);
            }
            _ => warn!(
                length = candidate.len(),
                "Found JSON-like substring, but it failed to parse"
            ),
        }
    }

    Err(NarrativeError::Malformed {
        reason: "no JSON object found in response".to_string(),
    })
}

/// First balanced `start_char`..`end_char` run.
fn find_json_delimiters(text: &str, start_char: char, end_char: char) -> Option<String> {
    let mut balance = 0usize;
    let mut start_index = None;

    for (i, ch) in text.char_indices() {
        if ch == start_char {
            if balance == 0 {
                start_index = Some(i);
            }
            balance += 1;
        } else if ch == end_char && balance > 0 {
            balance -= 1;
            if balance == 0 {
                if let Some(start) = start_index {
                    return Some(text[start..=i].to_string());
                }
            }
        }
    }
    None
}

/// `(language, body)` for every fenced block; an unterminated fence runs to
/// the end of the text.
pub fn extract_code_blocks(text: &str) -> Vec<(Option<String>, String)> {
    let mut code_blocks = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let Some(lang_str) = line.trim().strip_prefix("```") else {
            continue;
        };
        let language = match lang_str.trim() {
            "" => None,
            lang => Some(lang.to_lowercase()),
        };

        let mut code_content = String::new();
        for code_line in lines.by_ref() {
            if code_line.trim().starts_with("```") {
                break;
            }
            if !code_content.is_empty() {
                code_content.push('\n');
            }
            code_content.push_str(code_line);
        }
        code_blocks.push((language, code_content));
    }
    code_blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_text_is_accepted() {
        let value = extract_json_object(r#"{"title": "Sales"}"#).unwrap();
        assert_eq!(value["title"], "Sales");
    }

    #[test]
    fn fenced_block_wins_over_prose() {
        let text = "Here you go:\n```json\n{\"title\": \"Fenced\"}\n```\nThanks {not json}";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["title"], "Fenced");
    }

    #[test]
    fn balanced_object_inside_prose() {
        let text = "Sure! {\"title\": \"Inline\", \"nested\": {\"a\": 1}} trailing";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["nested"]["a"], 1);
    }

    #[test]
    fn stray_closing_brace_does_not_underflow() {
        let text = "} oops {\"title\": \"Late\"}";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["title"], "Late");
    }

    #[test]
    fn arrays_and_prose_are_malformed() {
        assert!(matches!(
            extract_json_object("[1, 2, 3]"),
            Err(NarrativeError::Malformed { .. })
        ));
        assert!(extract_json_object("I cannot help with that.").is_err());
    }
}
