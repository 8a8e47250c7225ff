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

//! Command-line surface of `easel-deck`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Turn a CSV or Excel file into an analysis slide deck
#[derive(Parser, Debug)]
#[command(name = "easel-deck")]
#[command(version)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// What to do.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load, clean and profile a dataset, then write the deck.
    Generate {
        /// Input file (.csv, .xlsx or .xls)
        path: PathBuf,

        /// Deck file to write [default: <stem>_analysis_presentation.html]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sheet name, or 1-based sheet number
        #[arg(short, long)]
        sheet: Option<String>,

        /// Column range such as A:D or A,C:E
        #[arg(short, long)]
        range: Option<String>,

        /// TOML configuration file (also read from EASEL_CONFIG)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip the narrative service and use the built-in summary
        #[arg(long)]
        offline: bool,

        /// Also write the dataset profile as JSON
        #[arg(long)]
        profile_json: Option<PathBuf>,

        /// Keep the rendered chart images in this directory
        #[arg(long)]
        charts_dir: Option<PathBuf>,
    },
    /// Show the sheets of a workbook and which one would be picked.
    ListSheets {
        /// Workbook file (.xlsx or .xls)
        path: PathBuf,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Log verbosity.
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Progress messages
    Info,
    /// Per-stage detail
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
