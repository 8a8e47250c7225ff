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

//! OpenAI chat-completions backend for the narrative service.

use super::prompt::SYSTEM_PROMPT;
use super::NarrativeService;
use crate::config::NarrativeConfig;
use crate::error::{NarrativeError, NarrativeResult};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::io::Read;
use std::time::Duration;
use tracing::debug;

/// Characters of an error body kept in the error.
const ERROR_BODY_PREVIEW: usize = 500;

/// Chat-completions client. One request per call; failures surface to the
/// caller, which falls back locally.
#[derive(Debug, Clone)]
pub struct OpenAiNarrativeService {
    /// Blocking HTTP client with the configured timeout.
    client: Client,
    /// Bearer token.
    api_key: String,
    /// Chat-completions URL.
    endpoint: String,
    /// Model name.
    model: String,
    /// Sampling temperature.
    temperature: f32,
    /// Completion token cap.
    max_tokens: u32,
    /// Largest accepted body.
    max_response_bytes: usize,
}

impl OpenAiNarrativeService {
    /// Client for `config`; fails without an API key.
    pub fn new(config: &NarrativeConfig) -> NarrativeResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| NarrativeError::NotConfigured {
                reason: "no API key; set OPENAI_API_KEY or narrative.api_key".to_string(),
            })?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request body for `prompt`.
    fn build_payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature
        })
    }
}

impl NarrativeService for OpenAiNarrativeService {
    fn summarize(&self, prompt: &str) -> NarrativeResult<String> {
        let payload = self.build_payload(prompt);
        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending narrative request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped(response, self.max_response_bytes)
                .map(|bytes| {
                    String::from_utf8_lossy(&bytes)
                        .chars()
                        .take(ERROR_BODY_PREVIEW)
                        .collect()
                })
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if let Some(length) = response.content_length() {
            if length > self.max_response_bytes as u64 {
                return Err(NarrativeError::ResponseTooLarge {
                    limit: self.max_response_bytes,
                });
            }
        }
        let body = read_capped(response, self.max_response_bytes)?;
        debug!(bytes = body.len(), "Received narrative response");
        parse_completion(&body)
    }
}

/// Reads at most `limit` bytes; anything longer is rejected rather than cut.
fn read_capped<R: Read>(reader: R, limit: usize) -> NarrativeResult<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut buf)
        .map_err(|e| NarrativeError::Malformed {
            reason: format!("failed to read response body: {e}"),
        })?;
    if buf.len() > limit {
        return Err(NarrativeError::ResponseTooLarge { limit });
    }
    Ok(buf)
}

/// `choices[0].message.content` of a chat-completions body.
pub(crate) fn parse_completion(body: &[u8]) -> NarrativeResult<String> {
    let data: Value = serde_json::from_slice(body).map_err(|e| NarrativeError::Malformed {
        reason: format!("response is not JSON: {e}"),
    })?;
    data["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| NarrativeError::Malformed {
            reason: "failed to extract content from completion".to_string(),
        })
}
