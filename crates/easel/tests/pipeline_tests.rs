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

use easel::chart::ChartType;
use easel::deck::{Deck, DeckAssembler, Slide};
use easel::error::{CleanError, DeckResult, LoadError, NarrativeError, NarrativeResult};
use easel::render::aggregate::group_sum;
use easel::{
    selector, Cell, Column, ChartRenderer, DeckPipeline, EaselError, GenerateRequest,
    LoadOptions, NarrativeService, Narrator, PipelineConfig, RenderConfig, Table,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const CATEGORY_CSV: &str = "Category,Value\nA,10\nA,12\nB,50\nB,52\nC,8\nC,9\n";

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn offline() -> DeckPipeline {
    DeckPipeline::offline(PipelineConfig::default()).unwrap()
}

struct Scripted(NarrativeResult<String>);

impl NarrativeService for Scripted {
    fn summarize(&self, _prompt: &str) -> NarrativeResult<String> {
        match &self.0 {
            Ok(text) => Ok(text.clone()),
            Err(_) => Err(NarrativeError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }),
        }
    }
}

#[derive(Clone, Default)]
struct RecordingAssembler {
    decks: Arc<Mutex<Vec<Deck>>>,
}

impl DeckAssembler for RecordingAssembler {
    fn assemble(&self, deck: &Deck, output: &Path) -> DeckResult<PathBuf> {
        self.decks.lock().unwrap().push(deck.clone());
        Ok(output.to_path_buf())
    }
}

#[test]
fn category_totals_drive_the_first_chart() {
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "sales.csv", CATEGORY_CSV);

    let analysis = offline().analyze(&input, &LoadOptions::default()).unwrap();
    assert_eq!(analysis.table.row_count(), 6);
    assert_eq!(analysis.profile.numeric_columns, vec!["Value".to_string()]);
    assert_eq!(analysis.profile.categorical_columns, vec!["Category".to_string()]);

    let charts = selector::recommend(&analysis.profile);
    assert_eq!(charts[0].chart_type(), ChartType::Bar);
    assert_eq!(charts[0].kind.x(), Some("Category"));
    assert_eq!(charts[0].kind.y(), Some("Value"));

    let key = analysis.table.column("Category").unwrap();
    let value = analysis.table.column("Value").unwrap();
    assert_eq!(
        group_sum(key, value, 10),
        vec![
            ("A".to_string(), 22.0),
            ("B".to_string(), 102.0),
            ("C".to_string(), 17.0),
        ]
    );
}

#[test]
fn revenue_axis_is_scaled_to_millions() {
    let table = Table::new(vec![
        Column::from_texts("Region", &["North", "South", "East"]),
        Column::from_numbers("Revenue", &[1_000_000.0, 2_500_000.0, 750_000.0]),
    ]);
    let spec = easel::ChartSpec::bar(Some("Region"), Some("Revenue"), "Region vs Revenue", "");
    let frame = ChartRenderer::new(&table, RenderConfig::default())
        .frame(&spec)
        .unwrap();
    let labels: Vec<&str> = frame.text_labels().collect();
    assert!(labels.iter().any(|l| *l == "Revenue ($ Millions)"), "{labels:?}");
    assert!(labels.iter().any(|l| *l == "2.5M"), "{labels:?}");
}

#[test]
fn exact_duplicate_rows_are_dropped_once() {
    let dir = TempDir::new().unwrap();
    let input = write_file(
        &dir,
        "scores.csv",
        "Name,Score,Region\n\
         alpha,10,north\n\
         beta,20,south\n\
         beta,20,south\n\
         gamma,30,east\n\
         delta,40,west\n\
         epsilon,50,north\n\
         zeta,60,south\n\
         eta,70,east\n\
         theta,80,west\n\
         iota,90,north\n",
    );

    let analysis = offline().analyze(&input, &LoadOptions::default()).unwrap();
    assert_eq!(analysis.cleaning.input_shape, (10, 3));
    assert_eq!(analysis.cleaning.output_shape, (9, 3));
    assert_eq!(analysis.cleaning.duplicates_removed, 1);
    assert_eq!(analysis.table.row_count(), 9);
}

#[test]
fn too_few_rows_abort_before_writing() {
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "tiny.csv", "a,b\n1,2\n3,4\n5,6\n");
    let output = dir.path().join("tiny_deck.html");
    let mut request = GenerateRequest::new(&input);
    request.output = Some(output.clone());

    let err = offline().run(&request).unwrap_err();
    assert!(matches!(
        err,
        EaselError::Clean(CleanError::InsufficientData {
            remaining: 3,
            minimum: 5
        })
    ));
    assert!(!err.is_recoverable());
    assert!(!output.exists());
}

#[test]
fn header_only_file_is_insufficient() {
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "empty.csv", "Category,Value\n");
    let err = offline().run(&GenerateRequest::new(&input)).unwrap_err();
    assert!(matches!(
        err,
        EaselError::Clean(CleanError::InsufficientData { remaining: 0, .. })
    ));
    assert!(!dir.path().join("empty_analysis_presentation.html").exists());
}

#[test]
fn unsupported_extension_is_a_load_error() {
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "notes.txt", CATEGORY_CSV);
    let err = offline().run(&GenerateRequest::new(&input)).unwrap_err();
    assert!(matches!(
        err,
        EaselError::Load(LoadError::UnsupportedFormat { ref extension }) if extension == "txt"
    ));
}

#[test]
fn offline_run_writes_deck_profile_and_charts() {
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "sales.csv", CATEGORY_CSV);
    let charts_dir = dir.path().join("charts");
    let profile_path = dir.path().join("profile.json");
    let mut request = GenerateRequest::new(&input);
    request.profile_json = Some(profile_path.clone());
    request.charts_dir = Some(charts_dir.clone());

    let report = offline().run(&request).unwrap();

    assert_eq!(report.output, dir.path().join("sales_analysis_presentation.html"));
    assert!(report.narrative_fallback);
    assert!(report.narrative_failure.is_none());
    assert_eq!(report.charts_rendered, 3);
    assert_eq!(report.placeholders, 0);
    assert_eq!(report.recovered_failures(), 0);

    let html = fs::read_to_string(&report.output).unwrap();
    assert!(html.contains("Data Analysis Report: sales.csv"));
    assert!(html.contains("Dataset: 6 rows, 2 columns"));
    assert!(html.contains("Category vs Value"));
    assert_eq!(html.matches("<svg").count(), 3);

    let profile: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&profile_path).unwrap()).unwrap();
    assert_eq!(profile["rows"], 6);

    assert_eq!(report.exported_charts.len(), 3);
    for chart in &report.exported_charts {
        assert!(chart.starts_with(&charts_dir));
        assert!(chart.exists());
    }
}

#[test]
fn failing_service_falls_back_and_records_the_failure() {
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "sales.csv", CATEGORY_CSV);
    let narrator = Narrator::new(Box::new(Scripted(Err(NarrativeError::Status {
        status: 503,
        body: String::new(),
    }))));
    let pipeline = DeckPipeline::with_narrator(PipelineConfig::default(), narrator).unwrap();

    let report = pipeline.run(&GenerateRequest::new(&input)).unwrap();
    assert!(report.narrative_fallback);
    let failure = report.narrative_failure.as_deref().unwrap();
    assert!(failure.contains("503"), "{failure}");
    assert_eq!(report.recovered_failures(), 1);
    assert!(report.output.exists());
}

#[test]
fn service_reply_shapes_the_deck() {
    let reply = r#"Here is the analysis:
```json
{
  "title": "Regional Value Review",
  "insights": [
    "B carries most of the value",
    "A and C trail far behind",
    "Values range from 8 to 52"
  ],
  "slides": [
    {"title": "Overview", "content": ["Six observations across three categories"],
     "slide_type": "content"},
    {"title": "What Stands Out", "content": ["B dominates"], "slide_type": "insights"}
  ],
  "recommended_charts": [
    {"type": "bar", "x_column": "Category", "y_column": "Value",
     "title": "Value by Category", "purpose": "compare"},
    {"type": "pie", "x_column": "Category", "y_column": "Value",
     "title": "Share of Value", "purpose": "share"},
    {"type": "scatter", "x_column": "Value", "y_column": "Missing",
     "title": "Dropped", "purpose": "unknown column"},
    {"type": "line", "x_column": "Value", "y_column": "Value",
     "title": "Value Trend", "purpose": "trend"}
  ]
}
```"#;
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "sales.csv", CATEGORY_CSV);
    let narrator = Narrator::new(Box::new(Scripted(Ok(reply.to_string()))));
    let assembler = RecordingAssembler::default();
    let pipeline = DeckPipeline::with_narrator(PipelineConfig::default(), narrator)
        .unwrap()
        .with_assembler(Box::new(assembler.clone()));

    let report = pipeline.run(&GenerateRequest::new(&input)).unwrap();
    assert!(!report.narrative_fallback);
    assert_eq!(report.charts_rendered, 3);

    let decks = assembler.decks.lock().unwrap();
    let deck = &decks[0];
    assert_eq!(deck.title, "Regional Value Review");
    assert_eq!(deck.subtitle[1], "Key Insights: 3 findings");
    assert_eq!(deck.slides[0], Slide::Title);
    let titles: Vec<&str> = deck
        .slides
        .iter()
        .filter_map(|s| match s {
            Slide::Bullets { title, .. } | Slide::Chart { title, .. } => Some(title.as_str()),
            Slide::Title => None,
        })
        .collect();
    assert_eq!(
        titles,
        vec![
            "Overview",
            "What Stands Out",
            "Value by Category",
            "Share of Value",
            "Value Trend"
        ]
    );
    assert_eq!(deck.chart_count(), 3);
}

#[test]
fn partial_reply_is_topped_up_from_the_selector() {
    let reply = r#"{"title": "Short Answer", "recommended_charts": [
        {"type": "pie", "x_column": "Category", "y_column": "Value", "title": "Share"}
    ]}"#;
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "sales.csv", CATEGORY_CSV);
    let narrator = Narrator::new(Box::new(Scripted(Ok(reply.to_string()))));
    let assembler = RecordingAssembler::default();
    let pipeline = DeckPipeline::with_narrator(PipelineConfig::default(), narrator)
        .unwrap()
        .with_assembler(Box::new(assembler.clone()));

    let report = pipeline.run(&GenerateRequest::new(&input)).unwrap();
    assert!(!report.narrative_fallback);

    let decks = assembler.decks.lock().unwrap();
    let deck = &decks[0];
    assert_eq!(deck.title, "Short Answer");
    assert_eq!(deck.subtitle[1], "Key Insights: 3 findings");
    let insight_slide = deck.slides.iter().find_map(|s| match s {
        Slide::Bullets { title, bullets } if title == "Key Insights" => Some(bullets),
        _ => None,
    });
    assert_eq!(
        insight_slide.unwrap()[0],
        "Dataset contains 6 records across 2 columns"
    );
    // the reply's pie plus the selector's bar and line
    assert_eq!(deck.chart_count(), 3);
}

#[test]
fn charts_naming_missing_columns_become_placeholders() {
    let table = Table::new(vec![
        Column::from_texts("Region", &["North", "South"]),
        Column::new("Revenue", vec![Cell::Missing, Cell::Missing]),
    ]);
    let renderer = ChartRenderer::new(&table, RenderConfig::default());
    let spec = easel::ChartSpec::scatter("Region", "Profit", "Region vs Profit", "");
    let mut scope = easel::ArtifactScope::new().unwrap();
    let rendered = renderer.render(&spec, &mut scope);
    assert!(rendered.placeholder);
    assert_eq!(scope.placeholders(), 1);
    let root = scope.path().to_path_buf();
    scope.close().unwrap();
    assert!(!root.exists());
}
