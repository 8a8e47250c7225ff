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

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SALES: &str = "Category,Value\nA,10\nA,12\nB,50\nB,52\nC,8\nC,9\n";

fn easel_deck(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("easel-deck").unwrap();
    cmd.current_dir(cwd)
        .env_remove("EASEL_CONFIG")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn generate_offline_writes_the_deck() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sales.csv");
    fs::write(&input, SALES).unwrap();

    easel_deck(dir.path())
        .args(["generate", "--offline"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Presentation saved as:"))
        .stdout(predicate::str::contains("Rows: 6 -> 6 after cleaning (0 duplicates removed)"))
        .stdout(predicate::str::contains("Charts: 3 rendered, 0 placeholders"))
        .stdout(predicate::str::contains("Narrative: built-in summary"));

    let deck = dir.path().join("sales_analysis_presentation.html");
    let html = fs::read_to_string(deck).unwrap();
    assert!(html.contains("Data Analysis Report: sales.csv"));
}

#[test]
fn generate_honours_output_and_profile_flags() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sales.csv");
    fs::write(&input, SALES).unwrap();
    let output = dir.path().join("out.html");
    let profile = dir.path().join("profile.json");

    easel_deck(dir.path())
        .args(["--log-level", "error", "generate", "--offline"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--profile-json")
        .arg(&profile)
        .assert()
        .success();

    assert!(output.exists());
    let profile: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(profile).unwrap()).unwrap();
    assert_eq!(profile["columns"], 2);
}

#[test]
fn too_few_rows_exit_with_failure() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("tiny.csv");
    fs::write(&input, "a,b\n1,2\n3,4\n").unwrap();

    easel_deck(dir.path())
        .args(["generate", "--offline"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Only 2 usable rows remained"));

    assert!(!dir.path().join("tiny_analysis_presentation.html").exists());
}

#[test]
fn list_sheets_rejects_delimited_files() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sales.csv");
    fs::write(&input, SALES).unwrap();

    easel_deck(dir.path())
        .arg("list-sheets")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a spreadsheet workbook"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    easel_deck(dir.path()).assert().failure().code(2);
}
