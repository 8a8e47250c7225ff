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

//! Error types for every stage, plus the user-facing error reporter.
use std::fmt::Write as _;
use thiserror::Error;
/// Any failure a run can surface.
#[derive(Error, Debug)]
pub enum EaselError {
    /// Input could not be loaded.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    /// Cleaning left too little data.
    #[error("Cleaning error: {0}")]
    Clean(#[from] CleanError),
    /// A chart could not be drawn or stored.
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    /// The narrative service failed.
    #[error("Narrative error: {0}")]
    Narrative(#[from] NarrativeError),
    /// The deck could not be written.
    #[error("Deck error: {0}")]
    Deck(#[from] DeckError),
    /// Configuration is unreadable or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Any other filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
/// Loader failures.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Extension is not CSV or Excel.
    #[error("Unsupported file format '{extension}': expected .csv, .xlsx or .xls")]
    UnsupportedFormat {
        /// Lowercased extension, possibly empty.
        extension: String,
    },
    /// File is missing or could not be decoded.
    #[error("Unable to read '{path}': {reason}")]
    UnreadableFile {
        /// Input path.
        path: String,
        /// Underlying cause.
        reason: String,
    },
    /// The chosen sheet or range holds nothing.
    #[error("Selection '{selection}' contains no usable data")]
    EmptySelection {
        /// Sheet and range description.
        selection: String,
    },
    /// No sheet matches the selector.
    #[error("Sheet '{requested}' not found; available sheets: {available}")]
    SheetNotFound {
        /// Selector as given.
        requested: String,
        /// Comma-separated sheet names.
        available: String,
    },
    /// Column range could not be parsed.
    #[error("Invalid column range '{range}': {reason}")]
    InvalidRange {
        /// Range as given.
        range: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Workbook has no sheets at all.
    #[error("Workbook '{path}' contains no sheets")]
    NoSheets {
        /// Workbook path.
        path: String,
    },
    /// Sheet listing was asked of a non-workbook file.
    #[error("'{path}' is not a spreadsheet workbook")]
    NotAWorkbook {
        /// Input path.
        path: String,
    },
}
/// Cleaner failures.
#[derive(Error, Debug)]
pub enum CleanError {
    /// Fewer rows survived than the configured minimum.
    #[error(
        "Insufficient data: {remaining} rows remain after cleaning, at least {minimum} required"
    )]
    InsufficientData {
        /// Rows left.
        remaining: usize,
        /// Rows required.
        minimum: usize,
    },
}
/// Chart rendering failures; all are recovered as placeholders.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A named column is absent from the table.
    #[error("Column '{column}' not found for chart '{chart}'")]
    MissingColumn {
        /// Chart title.
        chart: String,
        /// Missing column.
        column: String,
    },
    /// Reduction produced nothing to draw.
    #[error("Chart '{chart}' has no plottable values")]
    NoPlottableValues {
        /// Chart title.
        chart: String,
    },
    /// Frame failed validation.
    #[error("Invalid render frame: {reason}")]
    InvalidFrame {
        /// First problem found.
        reason: String,
    },
    /// Artifact could not be written or read.
    #[error("Failed to write chart artifact '{path}': {source}")]
    Artifact {
        /// Artifact path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// SVG serialisation failed.
    #[error("Failed to format chart output: {0}")]
    Format(#[from] std::fmt::Error),
}
/// Narrative service failures; all are recovered by the fallback narrative.
#[derive(Error, Debug)]
pub enum NarrativeError {
    /// No API key or client.
    #[error("Narrative service is not configured: {reason}")]
    NotConfigured {
        /// What is missing.
        reason: String,
    },
    /// Request never completed.
    #[error("Narrative request failed: {source}")]
    Transport {
        /// HTTP client error.
        #[from]
        source: reqwest::Error,
    },
    /// Non-success HTTP status.
    #[error("Narrative service returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },
    /// Body was larger than allowed.
    #[error("Narrative response exceeded {limit} bytes")]
    ResponseTooLarge {
        /// Byte limit.
        limit: usize,
    },
    /// Response carried no usable narrative.
    #[error("Narrative response was malformed: {reason}")]
    Malformed {
        /// What was wrong.
        reason: String,
    },
}
/// Deck writer failures.
#[derive(Error, Debug)]
pub enum DeckError {
    /// Output file could not be written.
    #[error("Failed to write deck '{path}': {source}")]
    Write {
        /// Output path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Nothing to write.
    #[error("Deck has no slides")]
    Empty,
    /// HTML formatting failed.
    #[error("Failed to format deck: {0}")]
    Format(#[from] std::fmt::Error),
}
/// Configuration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read configuration file '{path}': {source}")]
    ConfigFileError {
        /// Config path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// File is not valid TOML for the config schema.
    #[error("Failed to parse TOML configuration: {source}")]
    TomlParseError {
        /// Parser error.
        #[from]
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("Invalid configuration: {field} = {value}")]
    InvalidValue {
        /// Dotted field name.
        field: String,
        /// Offending value.
        value: String,
    },
}
/// Result of a whole run.
pub type Result<T> = std::result::Result<T, EaselError>;
/// Result of loading.
pub type LoadResult<T> = std::result::Result<T, LoadError>;
/// Result of cleaning.
pub type CleanResult<T> = std::result::Result<T, CleanError>;
/// Result of rendering.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
/// Result of a narrative request.
pub type NarrativeResult<T> = std::result::Result<T, NarrativeError>;
/// Result of deck assembly.
pub type DeckResult<T> = std::result::Result<T, DeckError>;
/// Result of loading configuration.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
impl EaselError {
    /// Render and narrative failures degrade to placeholders and fallbacks.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EaselError::Render(_) | EaselError::Narrative(_))
    }
    /// Short stage name for reports.
    pub fn category(&self) -> &'static str {
        match self {
            EaselError::Load(_) => "Load",
            EaselError::Clean(_) => "Cleaning",
            EaselError::Render(_) => "Render",
            EaselError::Narrative(_) => "Narrative",
            EaselError::Deck(_) => "Deck",
            EaselError::Config(_) => "Configuration",
            EaselError::Io(_) => "I/O",
        }
    }
    /// Hints shown under the error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            EaselError::Load(LoadError::UnsupportedFormat { .. }) => vec![
                "Convert the file to CSV or Excel (.xlsx/.xls)".to_string(),
                "Check the file extension matches its contents".to_string(),
            ],
            EaselError::Load(LoadError::UnreadableFile { .. }) => vec![
                "Re-save the file as UTF-8 encoded CSV".to_string(),
                "Check that every row has no more fields than the header".to_string(),
            ],
            EaselError::Load(LoadError::EmptySelection { .. }) => vec![
                "List the sheets with `list-sheets` and pick one containing data".to_string(),
                "Widen or remove the column range".to_string(),
            ],
            EaselError::Load(LoadError::SheetNotFound { .. }) => vec![
                "Sheet names are matched exactly, then case-insensitively".to_string(),
                "Use a 1-based sheet number instead of a name".to_string(),
            ],
            EaselError::Clean(CleanError::InsufficientData { .. }) => vec![
                "Provide more rows of data".to_string(),
                "Check that the first columns are populated or relax the key-column policy"
                    .to_string(),
            ],
            EaselError::Narrative(_) => vec![
                "Set OPENAI_API_KEY or run with --offline".to_string(),
            ],
            _ => vec!["Check the error message for specific guidance".to_string()],
        }
    }
    /// Plain-language message for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            EaselError::Clean(CleanError::InsufficientData { remaining, minimum }) => format!(
                "Only {remaining} usable rows remained after cleaning; \
                 at least {minimum} are needed to build a report."
            ),
            EaselError::Load(LoadError::EmptySelection { .. }) => {
                "The selected sheet or range is empty. Please choose a selection containing data."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
    /// How loudly to report the error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EaselError::Render(_) | EaselError::Narrative(_) => ErrorSeverity::Warning,
            EaselError::Config(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }
}
/// Report severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational.
    Info,
    /// Recovered.
    Warning,
    /// Run failed.
    Error,
    /// Run could not start.
    Critical,
}
impl ErrorSeverity {
    /// Uppercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }
    /// ANSI colour escape.
    pub fn color_code(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "\x1b[36m",
            ErrorSeverity::Warning => "\x1b[33m",
            ErrorSeverity::Error => "\x1b[31m",
            ErrorSeverity::Critical => "\x1b[35m",
        }
    }
}
/// Formats errors for the terminal.
pub struct ErrorReporter {
    /// Append suggestion bullets.
    pub show_suggestions: bool,
    /// Wrap the headline in ANSI colour.
    pub colored_output: bool,
}
impl ErrorReporter {
    /// Coloured output with suggestions.
    pub fn new() -> Self {
        Self {
            show_suggestions: true,
            colored_output: true,
        }
    }
    /// Suggestions without colour.
    pub fn plain() -> Self {
        Self {
            show_suggestions: true,
            colored_output: false,
        }
    }
    /// Headline plus optional suggestions.
    pub fn report(&self, error: &EaselError) -> String {
        let severity = error.severity();
        let mut output = String::new();
        if self.colored_output {
            output.push_str(severity.color_code());
        }
        let _ = writeln!(
            output,
            "[{}] {}: {}",
            severity.as_str(),
            error.category(),
            error.user_message()
        );
        if self.colored_output {
            output.push_str("\x1b[0m");
        }
        if self.show_suggestions {
            let suggestions = error.suggestions();
            if !suggestions.is_empty() {
                output.push_str("\nSuggestions:\n");
                for suggestion in suggestions {
                    let _ = writeln!(output, "  • {suggestion}");
                }
            }
        }
        output
    }
}
impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}
