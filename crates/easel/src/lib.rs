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

//! Turns a CSV or Excel file into a self-contained HTML slide deck.
//!
//! The [`DeckPipeline`] loads a [`Table`], cleans and profiles it, asks a
//! [`Narrator`] for a narrative, renders the recommended charts to SVG and
//! writes the deck.

pub mod chart;
pub mod cleaner;
pub mod config;
pub mod deck;
pub mod error;
pub mod loader;
pub mod logging;
pub mod narrative;
pub mod pipeline;
pub mod profiler;
pub mod render;
pub mod selector;
pub mod stats;
pub mod table;

pub use chart::{ChartKind, ChartSpec, ChartSpecWire, ChartType};
pub use cleaner::{Cleaner, CleaningPass, CleaningReport};
pub use config::{
    CleaningConfig, KeyColumnPolicy, LoaderConfig, NarrativeConfig, PipelineConfig,
    ProfilingConfig, RenderConfig,
};
pub use deck::{Deck, DeckAssembler, HtmlDeckAssembler, Slide};
pub use error::{
    CleanError, ConfigError, DeckError, EaselError, ErrorReporter, ErrorSeverity, LoadError,
    NarrativeError, RenderError, Result,
};
pub use loader::{LoadOptions, LoadedTable, Loader, SheetInfo, SheetListing, SheetSelector};
pub use narrative::{Narrative, NarrativeService, Narrator, OpenAiNarrativeService};
pub use pipeline::{Analysis, DeckPipeline, GenerateRequest, RunReport};
pub use profiler::{DatasetProfile, Profiler};
pub use render::{ArtifactScope, ChartImage, ChartRenderer, RenderedChart};
pub use table::{Cell, Column, ColumnKind, Table};
