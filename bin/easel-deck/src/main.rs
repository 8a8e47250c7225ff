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

//! `easel-deck` binary: parses arguments, runs the pipeline and reports
//! errors.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, LogLevel};
use easel::loader::{LoadOptions, SheetSelector};
use easel::{DeckPipeline, EaselError, ErrorReporter, GenerateRequest, PipelineConfig};
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Filter directives that keep HTTP crates at warn.
const QUIET_DEPENDENCIES: &str = "reqwest=warn,hyper=warn,hyper_util=warn,rustls=warn";

/// Installs the stderr subscriber; `level` overrides `RUST_LOG`.
fn init_tracing(level: Option<LogLevel>) {
    let filter = match level {
        Some(level) => EnvFilter::new(format!("{},{QUIET_DEPENDENCIES}", level.as_str())),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("info,{QUIET_DEPENDENCIES}"))),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Entry point; maps errors to a report and exit code 1.
fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<EaselError>() {
                Some(easel_err) => {
                    let reporter = if std::io::stderr().is_terminal() {
                        ErrorReporter::new()
                    } else {
                        ErrorReporter::plain()
                    };
                    eprint!("{}", reporter.report(easel_err));
                }
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Dispatches one subcommand.
fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Generate {
            path,
            output,
            sheet,
            range,
            config,
            offline,
            profile_json,
            charts_dir,
        } => {
            let config = PipelineConfig::load(config.as_deref()).map_err(EaselError::from)?;
            let pipeline = if offline {
                DeckPipeline::offline(config)?
            } else {
                DeckPipeline::new(config)?
            };
            let request = GenerateRequest {
                input: path,
                output,
                load: LoadOptions {
                    sheet: sheet.as_deref().map(SheetSelector::parse),
                    range,
                },
                profile_json,
                charts_dir,
            };
            let report = pipeline.run(&request)?;
            info!(
                charts = report.charts_rendered,
                placeholders = report.placeholders,
                fallback = report.narrative_fallback,
                "Generation finished"
            );

            println!("Presentation saved as: {}", report.output.display());
            println!(
                "Rows: {} -> {} after cleaning ({} duplicates removed)",
                report.cleaning.input_shape.0,
                report.cleaning.output_shape.0,
                report.cleaning.duplicates_removed
            );
            println!(
                "Charts: {} rendered, {} placeholders",
                report.charts_rendered, report.placeholders
            );
            if report.narrative_fallback {
                println!("Narrative: built-in summary");
            }
            for exported in &report.exported_charts {
                println!("Chart kept: {}", exported.display());
            }
            Ok(())
        }
        Commands::ListSheets { path, json } => list_sheets(&path, json),
    }
}

/// Prints a workbook's sheets as text or JSON.
fn list_sheets(path: &Path, json: bool) -> Result<()> {
    let pipeline = DeckPipeline::offline(PipelineConfig::default())?;
    let listing = pipeline.list_sheets(path)?;
    if json {
        let text = serde_json::to_string_pretty(&listing)
            .context("Failed to serialise sheet listing")?;
        println!("{text}");
        return Ok(());
    }
    println!("{} contains {} sheets:", path.display(), listing.sheets.len());
    for sheet in &listing.sheets {
        let status = if sheet.has_data { "data" } else { "empty" };
        let marker = if listing.auto_selected.as_deref() == Some(sheet.name.as_str()) {
            " (auto-selected)"
        } else {
            ""
        };
        println!(
            "  [{status}] {}: {} rows{marker}",
            sheet.name, sheet.estimated_records
        );
    }
    Ok(())
}
