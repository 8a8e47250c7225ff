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

//! Structured log events shared by the pipeline stages.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
/// One cleaning pass finished.
pub fn log_pass(pass: &str, affected: usize, rows_remaining: usize) {
    debug!(
        pass = pass,
        affected = affected,
        rows_remaining = rows_remaining,
        "Cleaning pass complete"
    );
}
/// A stage failed and fell back.
pub fn log_recovered_failure(stage: &str, subject: &str, error: &dyn std::error::Error) {
    warn!(
        stage = stage,
        subject = subject,
        error = %error,
        "Recovered from failure"
    );
}
/// Wall time of a pipeline stage.
pub fn log_stage_timing(stage: &str, elapsed: Duration) {
    info!(
        stage = stage,
        elapsed_ms = elapsed.as_millis() as u64,
        "Stage finished"
    );
}
/// Debug event with a JSON payload.
pub fn log_pipeline_event(event: &str, payload: Value) {
    debug!(
        event = event,
        payload = %serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string()),
        "Pipeline event"
    );
}
