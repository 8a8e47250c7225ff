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

//! End-to-end run: load, clean, profile, narrate, render, assemble.
//!
//! Load and clean failures abort before anything is written. Everything after
//! profiling degrades instead of failing, except writing the deck itself.

use crate::cleaner::{Cleaner, CleaningReport};
use crate::config::PipelineConfig;
use crate::deck::{default_output_path, Deck, DeckAssembler, HtmlDeckAssembler};
use crate::error::{NarrativeError, Result};
use crate::loader::{LoadOptions, Loader, SheetListing, SourceMetadata};
use crate::logging::{log_pipeline_event, log_recovered_failure, log_stage_timing};
use crate::narrative::{Narrator, OpenAiNarrativeService};
use crate::profiler::{DatasetProfile, ProfileSummary, Profiler};
use crate::render::{ArtifactScope, ChartRenderer, RenderedChart};
use crate::table::Table;
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// One deck generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// Input file.
    pub input: PathBuf,
    /// Defaults to `{stem}_analysis_presentation.html` beside the input.
    pub output: Option<PathBuf>,
    /// Sheet and range selection.
    pub load: LoadOptions,
    /// Also write the profile as JSON here.
    pub profile_json: Option<PathBuf>,
    /// Keep copies of the chart images here after the run.
    pub charts_dir: Option<PathBuf>,
}

impl GenerateRequest {
    /// Request for `input` with default options.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }
}

/// A loaded, cleaned and profiled dataset.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Provenance.
    pub source: SourceMetadata,
    /// Cleaned table.
    pub table: Table,
    /// What cleaning did.
    pub cleaning: CleaningReport,
    /// Profile of the cleaned table.
    pub profile: DatasetProfile,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Deck path.
    pub output: PathBuf,
    /// Provenance.
    pub source: SourceMetadata,
    /// What cleaning did.
    pub cleaning: CleaningReport,
    /// Profile headline numbers.
    pub profile: ProfileSummary,
    /// Charts drawn without falling back.
    pub charts_rendered: usize,
    /// Charts replaced by placeholders.
    pub placeholders: usize,
    /// The fallback narrative was used.
    pub narrative_fallback: bool,
    /// Why the narrative service failed, if it did.
    pub narrative_failure: Option<String>,
    /// Chart copies written to the charts directory.
    pub exported_charts: Vec<PathBuf>,
}

impl RunReport {
    /// Failures that were absorbed rather than aborting the run.
    pub fn recovered_failures(&self) -> usize {
        self.placeholders + usize::from(self.narrative_failure.is_some())
    }
}

/// Runs every stage from input file to deck.
pub struct DeckPipeline {
    /// Full configuration.
    config: PipelineConfig,
    /// Input reader.
    loader: Loader,
    /// Table repair.
    cleaner: Cleaner,
    /// Statistics.
    profiler: Profiler,
    /// Narrative source.
    narrator: Narrator,
    /// Deck writer.
    assembler: Box<dyn DeckAssembler>,
}

impl DeckPipeline {
    /// Uses the remote narrative service when it is enabled and has a key.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let narrator = if !config.narrative.enabled {
            Narrator::offline()
        } else {
            match OpenAiNarrativeService::new(&config.narrative) {
                Ok(service) => {
                    info!(model = service.model(), "Narrative service configured");
                    Narrator::new(Box::new(service))
                }
                Err(NarrativeError::NotConfigured { reason }) => {
                    warn!(reason = %reason, "Narrative service unavailable, using fallback");
                    Narrator::offline()
                }
                Err(err) => {
                    log_recovered_failure("narrative", "client", &err);
                    Narrator::offline()
                }
            }
        };
        Self::with_narrator(config, narrator)
    }

    /// Never contacts the narrative service.
    pub fn offline(config: PipelineConfig) -> Result<Self> {
        Self::with_narrator(config, Narrator::offline())
    }

    /// Pipeline using `narrator` for text.
    pub fn with_narrator(config: PipelineConfig, narrator: Narrator) -> Result<Self> {
        config.validate()?;
        let loader = Loader::new(
            config.loader.clone(),
            config.cleaning.temporal_formats.clone(),
        );
        let cleaner = Cleaner::new(config.cleaning.clone())?;
        let profiler = Profiler::new(config.profiling.clone());
        Ok(Self {
            config,
            loader,
            cleaner,
            profiler,
            narrator,
            assembler: Box::new(HtmlDeckAssembler::new()),
        })
    }

    /// Replaces the deck writer.
    pub fn with_assembler(mut self, assembler: Box<dyn DeckAssembler>) -> Self {
        self.assembler = assembler;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sheet inventory of a workbook.
    pub fn list_sheets(&self, path: &Path) -> Result<SheetListing> {
        Ok(self.loader.list_sheets(path)?)
    }

    /// Loads, cleans and profiles without writing anything.
    pub fn analyze(&self, path: &Path, options: &LoadOptions) -> Result<Analysis> {
        let started = Instant::now();
        let loaded = self.loader.load(path, options)?;
        log_stage_timing("load", started.elapsed());

        let started = Instant::now();
        let (table, cleaning) = self.cleaner.clean(loaded.table)?;
        log_stage_timing("clean", started.elapsed());

        let started = Instant::now();
        let profile = self.profiler.profile(&table);
        log_stage_timing("profile", started.elapsed());

        Ok(Analysis {
            source: loaded.source,
            table,
            cleaning,
            profile,
        })
    }

    /// Full run; writes the deck and any requested extras.
    pub fn run(&self, request: &GenerateRequest) -> Result<RunReport> {
        let analysis = self.analyze(&request.input, &request.load)?;
        let file_name = analysis.source.file_name();

        if let Some(path) = &request.profile_json {
            let json = analysis.profile.to_json().map_err(std::io::Error::from)?;
            fs::write(path, json)?;
            info!(path = %path.display(), "Profile written");
        }

        let started = Instant::now();
        let outcome = self.narrator.generate(&analysis.profile, &file_name);
        log_stage_timing("narrative", started.elapsed());

        let started = Instant::now();
        let mut scope = ArtifactScope::new()?;
        let renderer = ChartRenderer::new(&analysis.table, self.config.render.clone());
        let charts: Vec<RenderedChart> = outcome
            .narrative
            .recommended_charts
            .iter()
            .map(|spec| renderer.render(spec, &mut scope))
            .collect();
        log_stage_timing("render", started.elapsed());

        let exported_charts = match &request.charts_dir {
            Some(dir) => scope.export(dir).unwrap_or_else(|err| {
                log_recovered_failure("export", &dir.display().to_string(), &err);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let deck = Deck::build(
            &outcome.narrative,
            &analysis.profile,
            &charts,
            chrono::Local::now().date_naive(),
        );
        let output = request
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&request.input));
        let output = self.assembler.assemble(&deck, &output)?;

        let placeholders = scope.placeholders();
        if let Err(err) = scope.close() {
            log_recovered_failure("cleanup", "chart artifacts", &err);
        }

        let report = RunReport {
            output,
            source: analysis.source,
            cleaning: analysis.cleaning,
            profile: analysis.profile.summary(),
            charts_rendered: charts.len() - placeholders.min(charts.len()),
            placeholders,
            narrative_fallback: outcome.fallback_used,
            narrative_failure: outcome.failure,
            exported_charts,
        };
        log_pipeline_event(
            "run_complete",
            json!({
                "output": report.output.display().to_string(),
                "charts_rendered": report.charts_rendered,
                "placeholders": report.placeholders,
                "narrative_fallback": report.narrative_fallback,
            }),
        );
        Ok(report)
    }
}

impl std::fmt::Debug for DeckPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeckPipeline")
            .field("config", &self.config)
            .field("narrator", &self.narrator)
            .finish()
    }
}
