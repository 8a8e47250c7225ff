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

use easel::error::ConfigError;
use easel::loader::TextEncoding;
use easel::{KeyColumnPolicy, PipelineConfig};
use std::collections::HashMap;

const EXAMPLE: &str = include_str!("../../../config/easel.example.toml");

#[test]
fn example_configuration_parses() {
    let config = PipelineConfig::from_toml_str(EXAMPLE).unwrap();
    assert_eq!(config.cleaning.key_columns, KeyColumnPolicy::Leading(3));
    assert_eq!(config.loader.encodings, TextEncoding::DEFAULT_ORDER.to_vec());
    assert_eq!(config.cleaning.balance.closing, "Closing Balance");
    assert_eq!(config.render.width, 960);
    assert!(config.narrative.api_key.is_none());
}

#[test]
fn partial_files_keep_defaults() {
    let config = PipelineConfig::from_toml_str(
        r#"
[cleaning]
min_rows = 2
key_columns = { policy = "named", columns = ["Region", "Date"] }
"#,
    )
    .unwrap();
    assert_eq!(config.cleaning.min_rows, 2);
    assert_eq!(
        config.cleaning.key_columns,
        KeyColumnPolicy::Named(vec!["Region".to_string(), "Date".to_string()])
    );
    assert_eq!(config.cleaning.capping_sigma, 3.0);
    assert_eq!(config.profiling.strong_correlation, 0.7);
}

#[test]
fn out_of_range_values_are_rejected() {
    let err =
        PipelineConfig::from_toml_str("[cleaning]\niqr_removal_fraction = 1.5\n").unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue { ref field, .. } if field == "cleaning.iqr_removal_fraction"
    ));

    let err = PipelineConfig::from_toml_str("[cleaning]\nmin_rows = \"many\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::TomlParseError { .. }));
}

#[test]
fn environment_overrides_apply_and_key_stays_hidden() {
    let env: HashMap<&str, &str> = [
        ("OPENAI_API_KEY", "sk-test-123"),
        ("EASEL_MODEL", "gpt-4o-mini"),
        ("EASEL_MIN_ROWS", "2"),
        ("EASEL_NARRATIVE_TIMEOUT_SECS", "not-a-number"),
    ]
    .into_iter()
    .collect();
    let mut config = PipelineConfig::default();
    config.apply_env(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.narrative.api_key.as_deref(), Some("sk-test-123"));
    assert_eq!(config.narrative.model, "gpt-4o-mini");
    assert_eq!(config.cleaning.min_rows, 2);
    assert_eq!(config.narrative.timeout_secs, 60);

    let debug = format!("{config:?}");
    assert!(!debug.contains("sk-test-123"));
    assert!(debug.contains("<redacted>"));
    let json = serde_json::to_string(&config).unwrap();
    assert!(!json.contains("sk-test-123"));
}

#[test]
fn missing_file_is_reported_with_its_path() {
    let err = PipelineConfig::from_file("/nonexistent/easel.toml").unwrap_err();
    match err {
        ConfigError::ConfigFileError { path, .. } => assert_eq!(path, "/nonexistent/easel.toml"),
        other => panic!("unexpected error: {other}"),
    }
}
