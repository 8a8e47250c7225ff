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

//! Pipeline configuration.
//!
//! Values resolve in three layers: built-in defaults, an optional TOML file,
//! then environment variables. Every section deserialises with
//! `#[serde(default)]`, so a file only needs the keys it overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::loader::TextEncoding;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming a config file.
pub const CONFIG_PATH_ENV: &str = "EASEL_CONFIG";

/// Configuration for a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input decoding and sheet selection.
    pub loader: LoaderConfig,
    /// Cleaning thresholds and policies.
    pub cleaning: CleaningConfig,
    /// Profiling thresholds.
    pub profiling: ProfilingConfig,
    /// Chart canvas and reduction limits.
    pub render: RenderConfig,
    /// Narrative service settings.
    pub narrative: NarrativeConfig,
}

/// Loader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Tried in order; the first encoding that decodes cleanly wins.
    pub encodings: Vec<TextEncoding>,
    /// Case-insensitive substrings marking sheets that hold metadata rather than records.
    pub sheet_blacklist: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            encodings: TextEncoding::DEFAULT_ORDER.to_vec(),
            sheet_blacklist: ["summary", "metadata", "info", "readme", "instructions"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Which rows the key-column completeness pass treats as structurally incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "columns", rename_all = "snake_case")]
pub enum KeyColumnPolicy {
    /// The first `n` columns, by position.
    Leading(usize),
    /// Explicitly named columns; names absent from the table are ignored.
    Named(Vec<String>),
    /// No key-column filtering.
    Disabled,
}

impl Default for KeyColumnPolicy {
    fn default() -> Self {
        KeyColumnPolicy::Leading(3)
    }
}

/// Column names and tolerance for the balance check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceColumns {
    /// Opening balance column.
    pub opening: String,
    /// Allocated amount column.
    pub allocated: String,
    /// Closing balance column.
    pub closing: String,
    /// Largest accepted absolute difference.
    pub tolerance: f64,
}

impl Default for BalanceColumns {
    fn default() -> Self {
        Self {
            opening: "Opening Balance".to_string(),
            allocated: "Allocate Budget".to_string(),
            closing: "Closing Balance".to_string(),
            tolerance: 0.01,
        }
    }
}

/// Cleaner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Fewest rows a cleaned table may have.
    pub min_rows: usize,
    /// Which columns must be populated.
    pub key_columns: KeyColumnPolicy,
    /// Text values treated as missing.
    pub null_literals: Vec<String>,
    /// Rows holding a cell that fully matches this pattern are opaque records.
    pub opaque_id_pattern: String,
    /// Name fragments marking datetime candidates.
    pub datetime_keywords: Vec<String>,
    /// Share of non-missing values that must parse before a text column turns numeric.
    pub numeric_coercion_threshold: f64,
    /// Fence multiplier k in Q1 - k·IQR and Q3 + k·IQR.
    pub iqr_multiplier: f64,
    /// Flagged rows are removed only when they exceed this share of the table.
    pub iqr_removal_fraction: f64,
    /// Capping bound in standard deviations.
    pub capping_sigma: f64,
    /// Years past now a date may lie.
    pub future_horizon_years: i32,
    /// Balance check columns.
    pub balance: BalanceColumns,
    /// chrono formats tried when parsing datetimes.
    pub temporal_formats: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            min_rows: 5,
            key_columns: KeyColumnPolicy::default(),
            null_literals: ["nan", "NaN", "NULL", "null", "None"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            opaque_id_pattern: "^[0-9a-f]{32}$".to_string(),
            datetime_keywords: vec!["date".to_string(), "time".to_string()],
            numeric_coercion_threshold: 0.5,
            iqr_multiplier: 1.5,
            iqr_removal_fraction: 0.1,
            capping_sigma: 3.0,
            future_horizon_years: 5,
            balance: BalanceColumns::default(),
            temporal_formats: default_temporal_formats(),
        }
    }
}

impl CleaningConfig {
    /// Keeps every row it can: no key-column filter and outliers are only reported.
    pub fn lenient() -> Self {
        Self {
            min_rows: 1,
            key_columns: KeyColumnPolicy::Disabled,
            iqr_removal_fraction: 1.0,
            ..Self::default()
        }
    }
}

/// Profiler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    /// Smallest |r| reported as strong.
    pub strong_correlation: f64,
    /// Unique share above which a column looks like an identifier.
    pub id_ratio: f64,
    /// Unique count above which a column is high-cardinality.
    pub high_cardinality: usize,
    /// Value counts kept per categorical column.
    pub top_values: usize,
    /// |skewness| marking a moderately skewed column.
    pub moderate_skew: f64,
    /// |skewness| marking a highly skewed column.
    pub high_skew: f64,
    /// Name fragments marking time-series columns.
    pub time_series_keywords: Vec<String>,
    /// Leading rows copied into the profile.
    pub sample_rows: usize,
    /// Categorical columns suggested for grouping.
    pub grouping_columns: usize,
    /// Fence multiplier for outlier counts.
    pub iqr_multiplier: f64,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            strong_correlation: 0.7,
            id_ratio: 0.8,
            high_cardinality: 20,
            top_values: 5,
            moderate_skew: 1.0,
            high_skew: 2.0,
            time_series_keywords: ["date", "time", "year", "month", "day"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sample_rows: 5,
            grouping_columns: 2,
            iqr_multiplier: 1.5,
        }
    }
}

impl ProfilingConfig {
    /// Higher correlation and identifier thresholds.
    pub fn strict() -> Self {
        Self {
            strong_correlation: 0.8,
            id_ratio: 0.9,
            ..Self::default()
        }
    }
}

/// Chart renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Equal-width histogram bins.
    pub histogram_bins: usize,
    /// Groups kept in bar charts.
    pub top_groups: usize,
    /// Slices kept before the rest fold into "Other".
    pub pie_slices: usize,
    /// Bins used when a pie reads a numeric column.
    pub pie_bins: usize,
    /// Columns in a column-means bar chart.
    pub mean_columns: usize,
    /// Fraction of the data span added to value axes.
    pub axis_padding: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            histogram_bins: 20,
            top_groups: 10,
            pie_slices: 8,
            pie_bins: 5,
            mean_columns: 5,
            axis_padding: 0.05,
        }
    }
}

/// Narrative service settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Call the service at all.
    pub enabled: bool,
    /// Chat-completions URL.
    pub endpoint: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Request timeout.
    pub timeout_secs: u64,
    /// Largest accepted response body.
    pub max_response_bytes: usize,
    /// Bearer token, never serialised.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for NarrativeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeConfig")
            .field("enabled", &self.enabled)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_response_bytes", &self.max_response_bytes)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.2,
            max_tokens: 1500,
            timeout_secs: 60,
            max_response_bytes: 256 * 1024,
            api_key: None,
        }
    }
}

/// Built-in datetime formats, most specific ISO forms first.
pub fn default_temporal_formats() -> Vec<String> {
    [
        "%Y-%m-%d",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y/%m/%d",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%m/%d/%Y %H:%M",
        "%Y%m%d",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|source| ConfigError::ConfigFileError {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&source)
    }

    /// Defaults, then the file at `path` (or `EASEL_CONFIG`), then the process environment.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(Into::into));
        let mut config = match file {
            Some(file) => {
                info!(path = %file.display(), "Loading pipeline configuration");
                Self::from_file(&file)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlays `OPENAI_API_KEY` and the `EASEL_*` variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.narrative.api_key = Some(key);
        }
        if let Some(model) = lookup("EASEL_MODEL").filter(|m| !m.trim().is_empty()) {
            self.narrative.model = model;
        }
        if let Some(endpoint) = lookup("EASEL_NARRATIVE_ENDPOINT").filter(|e| !e.trim().is_empty())
        {
            self.narrative.endpoint = endpoint;
        }
        self.narrative.timeout_secs = lookup("EASEL_NARRATIVE_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.narrative.timeout_secs);
        self.cleaning.min_rows = lookup("EASEL_MIN_ROWS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.cleaning.min_rows);
        debug!(
            model = %self.narrative.model,
            has_api_key = self.narrative.api_key.is_some(),
            min_rows = self.cleaning.min_rows,
            "Applied environment overrides"
        );
    }

    /// Rejects out-of-range values.
    pub fn validate(&self) -> ConfigResult<()> {
        /// Error for `field` holding `value`.
        fn invalid(field: &str, value: impl ToString) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.to_string(),
                value: value.to_string(),
            }
        }
        let cleaning = &self.cleaning;
        if cleaning.min_rows == 0 {
            return Err(invalid("cleaning.min_rows", cleaning.min_rows));
        }
        if !(cleaning.iqr_multiplier > 0.0) {
            return Err(invalid("cleaning.iqr_multiplier", cleaning.iqr_multiplier));
        }
        if !(0.0..=1.0).contains(&cleaning.iqr_removal_fraction) {
            return Err(invalid(
                "cleaning.iqr_removal_fraction",
                cleaning.iqr_removal_fraction,
            ));
        }
        if !(0.0..=1.0).contains(&cleaning.numeric_coercion_threshold) {
            return Err(invalid(
                "cleaning.numeric_coercion_threshold",
                cleaning.numeric_coercion_threshold,
            ));
        }
        if !(cleaning.capping_sigma > 0.0) {
            return Err(invalid("cleaning.capping_sigma", cleaning.capping_sigma));
        }
        if cleaning.future_horizon_years < 0 {
            return Err(invalid(
                "cleaning.future_horizon_years",
                cleaning.future_horizon_years,
            ));
        }
        let profiling = &self.profiling;
        if !(profiling.strong_correlation > 0.0 && profiling.strong_correlation < 1.0) {
            return Err(invalid(
                "profiling.strong_correlation",
                profiling.strong_correlation,
            ));
        }
        if !(profiling.id_ratio > 0.0 && profiling.id_ratio <= 1.0) {
            return Err(invalid("profiling.id_ratio", profiling.id_ratio));
        }
        if profiling.high_skew < profiling.moderate_skew {
            return Err(invalid("profiling.high_skew", profiling.high_skew));
        }
        let render = &self.render;
        if render.width < 200 || render.height < 200 {
            return Err(invalid(
                "render.width x render.height",
                format!("{}x{}", render.width, render.height),
            ));
        }
        for (field, value) in [
            ("render.histogram_bins", render.histogram_bins),
            ("render.top_groups", render.top_groups),
            ("render.pie_slices", render.pie_slices),
            ("render.pie_bins", render.pie_bins),
            ("render.mean_columns", render.mean_columns),
        ] {
            if value == 0 {
                return Err(invalid(field, value));
            }
        }
        if !(0.0..0.5).contains(&render.axis_padding) {
            return Err(invalid("render.axis_padding", render.axis_padding));
        }
        if self.narrative.max_response_bytes == 0 {
            return Err(invalid("narrative.max_response_bytes", 0));
        }
        Ok(())
    }
}
