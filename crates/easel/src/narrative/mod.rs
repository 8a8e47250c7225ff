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

//! Narrative text for the deck: a remote summarizer when one is configured,
//! a deterministic structure derived from the profile otherwise.

mod extract;
mod openai;
mod prompt;

pub use extract::{extract_code_blocks, extract_json_object};
pub use openai::OpenAiNarrativeService;
pub use prompt::{build_prompt, data_summary, group_thousands, SYSTEM_PROMPT};

use crate::chart::{ChartSpec, ChartSpecWire};
use crate::error::{NarrativeError, NarrativeResult};
use crate::logging::log_recovered_failure;
use crate::profiler::{ColumnStats, DatasetProfile};
use crate::selector::{self, MAX_CHARTS};
use crate::table::format_number;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Characters in a deck title.
pub const TITLE_LIMIT: usize = 60;
/// Characters per insight.
pub const INSIGHT_LIMIT: usize = 100;
/// Insights a narrative is topped up to.
pub const MIN_INSIGHTS: usize = 3;
/// Chart recommendations a narrative is topped up to.
pub const MIN_CHARTS: usize = 3;

/// Turns a prompt into free text. Implementations make one attempt; the
/// caller owns the fallback.
pub trait NarrativeService: Send + Sync {
    /// Sends `prompt` and returns the reply text.
    fn summarize(&self, prompt: &str) -> NarrativeResult<String>;
}

/// Role of a narrative slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideType {
    /// Title slide; the deck supplies its own.
    Title,
    /// Dataset overview.
    Overview,
    /// Key findings.
    Insights,
    /// Data quality notes.
    Quality,
    /// Chart commentary.
    Chart,
    /// Anything else.
    Content,
}

impl SlideType {
    /// Lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlideType::Title => "title",
            SlideType::Overview => "overview",
            SlideType::Insights => "insights",
            SlideType::Quality => "quality",
            SlideType::Chart => "chart",
            SlideType::Content => "content",
        }
    }

    /// Unknown labels read as plain content.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "title" => SlideType::Title,
            "overview" => SlideType::Overview,
            "insights" => SlideType::Insights,
            "quality" => SlideType::Quality,
            "chart" => SlideType::Chart,
            _ => SlideType::Content,
        }
    }
}

/// One slide of bullet text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeSlide {
    /// Heading.
    pub title: String,
    /// Bullets.
    pub content: Vec<String>,
    /// Role.
    pub slide_type: SlideType,
}

/// Deck text and chart recommendations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narrative {
    /// Deck title.
    pub title: String,
    /// Key findings.
    pub insights: Vec<String>,
    /// Text slides in order.
    pub slides: Vec<NarrativeSlide>,
    /// Charts to render.
    pub recommended_charts: Vec<ChartSpec>,
}

/// Loose shape of a model's JSON reply.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NarrativeWire {
    /// Deck title.
    title: Option<String>,
    /// Findings, possibly non-strings.
    insights: Vec<Value>,
    /// Slides.
    slides: Vec<SlideWire>,
    /// Chart entries, validated one by one.
    recommended_charts: Vec<Value>,
}

/// Loose slide entry.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SlideWire {
    /// Heading.
    title: String,
    /// Bullets, possibly non-strings.
    content: Vec<Value>,
    /// Free-form role label.
    slide_type: String,
}

/// Result of one narrative attempt.
#[derive(Debug, Clone)]
pub struct NarrativeOutcome {
    /// Narrative to use.
    pub narrative: Narrative,
    /// The deterministic structure was used.
    pub fallback_used: bool,
    /// Set when a service was asked and failed.
    pub failure: Option<String>,
}

/// Shortens `text` to at most `limit` characters, ellipsis included. The cut
/// backs up to a space when one lies past 70% of the limit.
pub fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    let head: String = text.chars().take(keep).collect();
    let cut = match head.rfind(' ') {
        Some(space) if head[..space].chars().count() as f64 > limit as f64 * 0.7 => {
            head[..space].trim_end()
        }
        _ => head.as_str(),
    };
    format!("{cut}...")
}

/// Row/column counts, column kinds and completeness, in that order.
pub fn basic_facts(profile: &DatasetProfile) -> Vec<String> {
    vec![
        format!(
            "Dataset contains {} records across {} columns",
            group_thousands(profile.rows),
            profile.columns
        ),
        format!("Found {} numeric variables", profile.numeric_columns.len()),
        format!(
            "Found {} categorical variables",
            profile.categorical_columns.len()
        ),
        format!(
            "Data completeness: {:.1}%",
            profile.quality.completeness()
        ),
    ]
}

/// The deck structure used when no usable narrative arrives.
pub fn fallback(profile: &DatasetProfile, file_name: &str) -> Narrative {
    let charts = selector::recommend(profile);
    let nums = &profile.numeric_columns;
    let cats = &profile.categorical_columns;

    let (low, high) = profile
        .column_profiles
        .iter()
        .filter(|p| nums.iter().take(3).any(|n| *n == p.name))
        .filter_map(|p| match &p.stats {
            ColumnStats::Numeric(stats) => Some((stats.min, stats.max)),
            _ => None,
        })
        .fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), (min, max)| {
            (
                Some(lo.map_or(min, |l| l.min(min))),
                Some(hi.map_or(max, |h| h.max(max))),
            )
        });
    let span = |v: Option<f64>| v.map(format_number).unwrap_or_else(|| "N/A".to_string());
    let leading = |names: &[String]| {
        if names.is_empty() {
            "none".to_string()
        } else {
            names.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        }
    };
    let categorical_profiles = profile
        .column_profiles
        .iter()
        .filter(|p| matches!(p.stats, ColumnStats::Categorical(_)))
        .count();

    let overview = vec![
        format!(
            "Dataset contains {} records across {} key variables",
            group_thousands(profile.rows),
            profile.columns
        ),
        format!(
            "Analysis covers {} numeric and {} categorical dimensions",
            nums.len(),
            cats.len()
        ),
        format!(
            "Generated {} visualizations for insights",
            charts.len()
        ),
        format!(
            "Data quality achieved: {:.1}% completeness",
            profile.quality.completeness()
        ),
        format!("Key focus areas: {} for quantitative analysis", leading(nums)),
        format!("Primary categories: {} for segmentation", leading(cats)),
        "Ready for business intelligence and decision support".to_string(),
    ];
    let findings = vec![
        format!(
            "Statistical analysis reveals {} significant correlations",
            profile.strong_correlations.len()
        ),
        format!(
            "Data distribution shows patterns across {categorical_profiles} key categories"
        ),
        format!(
            "Quantitative metrics span from {} to {}",
            span(low),
            span(high)
        ),
        format!(
            "Data quality considerations: {} missing values identified",
            profile.quality.total_missing
        ),
        format!(
            "Business impact: actionable insights across {} operational dimensions",
            cats.len()
        ),
        format!(
            "Trend analysis: time-based patterns {}",
            if profile.datetime_columns.is_empty() {
                "not available"
            } else {
                "detected"
            }
        ),
        "Strategic recommendations: focus on top-performing segments and outlier management"
            .to_string(),
    ];

    Narrative {
        title: truncate_text(&format!("Data Analysis Report: {file_name}"), TITLE_LIMIT),
        insights: basic_facts(profile),
        slides: vec![
            NarrativeSlide {
                title: "Title Slide".to_string(),
                content: Vec::new(),
                slide_type: SlideType::Title,
            },
            NarrativeSlide {
                title: "Executive Summary".to_string(),
                content: overview,
                slide_type: SlideType::Overview,
            },
            NarrativeSlide {
                title: "Key Findings & Insights".to_string(),
                content: findings,
                slide_type: SlideType::Insights,
            },
        ],
        recommended_charts: charts,
    }
}

/// Validates a service reply against the profile and fills thin sections.
pub fn parse_narrative(
    text: &str,
    profile: &DatasetProfile,
    file_name: &str,
) -> NarrativeResult<Narrative> {
    let value = extract_json_object(text)?;
    let wire: NarrativeWire =
        serde_json::from_value(value).map_err(|e| NarrativeError::Malformed {
            reason: e.to_string(),
        })?;

    let title = wire
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("Data Analysis Report: {file_name}"));

    let insights = wire
        .insights
        .iter()
        .filter_map(value_text)
        .map(|s| truncate_text(&s, INSIGHT_LIMIT))
        .collect();

    let slides = wire
        .slides
        .into_iter()
        .map(|slide| NarrativeSlide {
            title: slide.title.trim().to_string(),
            content: slide.content.iter().filter_map(value_text).collect(),
            slide_type: SlideType::parse(&slide.slide_type),
        })
        .filter(|slide| !slide.title.is_empty() || !slide.content.is_empty())
        .collect();

    let mut charts: Vec<ChartSpec> = Vec::new();
    for raw in wire.recommended_charts {
        let spec = match serde_json::from_value::<ChartSpecWire>(raw)
            .map_err(|e| e.to_string())
            .and_then(|w| ChartSpec::try_from(w).map_err(|e| e.to_string()))
        {
            Ok(spec) => spec,
            Err(reason) => {
                debug!(reason = %reason, "Discarding unusable chart recommendation");
                continue;
            }
        };
        if let Some(unknown) = spec
            .referenced_columns()
            .into_iter()
            .find(|c| !profile.has_column(c))
        {
            debug!(chart = %spec.title, column = unknown, "Discarding chart with unknown column");
            continue;
        }
        if !charts.iter().any(|c| c.same_chart(&spec)) {
            charts.push(spec);
        }
    }

    let mut narrative = Narrative {
        title: truncate_text(&title, TITLE_LIMIT),
        insights,
        slides,
        recommended_charts: charts,
    };
    supplement(&mut narrative, profile);
    Ok(narrative)
}

/// Tops up insights from the basic facts and charts from the selector.
pub fn supplement(narrative: &mut Narrative, profile: &DatasetProfile) {
    if narrative.insights.len() < MIN_INSIGHTS {
        for fact in basic_facts(profile) {
            if narrative.insights.len() >= MIN_INSIGHTS {
                break;
            }
            if !narrative.insights.contains(&fact) {
                narrative.insights.push(fact);
            }
        }
    }
    if narrative.recommended_charts.len() < MIN_CHARTS {
        for spec in selector::recommend(profile) {
            if narrative.recommended_charts.len() >= MAX_CHARTS {
                break;
            }
            if !narrative
                .recommended_charts
                .iter()
                .any(|c| c.same_chart(&spec))
            {
                narrative.recommended_charts.push(spec);
            }
        }
    }
}

/// JSON scalar as trimmed text; nulls and blanks are dropped.
fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Chooses between the configured service and the fallback.
pub struct Narrator {
    /// Remote summarizer; `None` when offline.
    service: Option<Box<dyn NarrativeService>>,
}

impl Narrator {
    /// Narrator backed by `service`.
    pub fn new(service: Box<dyn NarrativeService>) -> Self {
        Self {
            service: Some(service),
        }
    }

    /// Always produces the deterministic structure.
    pub fn offline() -> Self {
        Self { service: None }
    }

    /// No service configured.
    pub fn is_offline(&self) -> bool {
        self.service.is_none()
    }

    /// Asks the service, falling back on any failure.
    pub fn generate(&self, profile: &DatasetProfile, file_name: &str) -> NarrativeOutcome {
        let Some(service) = &self.service else {
            info!("Narrative service disabled, using fallback structure");
            return NarrativeOutcome {
                narrative: fallback(profile, file_name),
                fallback_used: true,
                failure: None,
            };
        };

        let prompt = build_prompt(profile, file_name);
        match service
            .summarize(&prompt)
            .and_then(|text| parse_narrative(&text, profile, file_name))
        {
            Ok(narrative) => NarrativeOutcome {
                narrative,
                fallback_used: false,
                failure: None,
            },
            Err(err) => {
                log_recovered_failure("narrative", file_name, &err);
                NarrativeOutcome {
                    narrative: fallback(profile, file_name),
                    fallback_used: true,
                    failure: Some(err.to_string()),
                }
            }
        }
    }
}

impl std::fmt::Debug for Narrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Narrator")
            .field("offline", &self.is_offline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartType;
    use crate::profiler::Profiler;
    use crate::table::{Column, Table};

    fn profile() -> DatasetProfile {
        let table = Table::new(vec![
            Column::from_texts("Category", &["A", "A", "B", "B", "C", "C"]),
            Column::from_numbers("Value", &[10.0, 12.0, 50.0, 52.0, 8.0, 9.0]),
            Column::from_numbers("Cost", &[1.0, 2.0, 4.0, 5.0, 1.0, 1.5]),
        ]);
        Profiler::default().profile(&table)
    }

    #[test]
    fn truncation_prefers_word_boundaries() {
        assert_eq!(truncate_text("short", 10), "short");
        let long = "alpha beta gamma delta epsilon zeta";
        let cut = truncate_text(long, 20);
        assert_eq!(cut, "alpha beta gamma...");
        assert!(cut.chars().count() <= 20);
        assert_eq!(truncate_text("abcdefghijklmnop", 10), "abcdefg...");
    }

    #[test]
    fn fallback_has_fixed_shape() {
        let narrative = fallback(&profile(), "sales.csv");
        assert_eq!(narrative.title, "Data Analysis Report: sales.csv");
        assert_eq!(narrative.insights.len(), 4);
        assert_eq!(
            narrative.insights[0],
            "Dataset contains 6 records across 3 columns"
        );
        let types: Vec<SlideType> = narrative.slides.iter().map(|s| s.slide_type).collect();
        assert_eq!(
            types,
            vec![SlideType::Title, SlideType::Overview, SlideType::Insights]
        );
        assert_eq!(narrative.slides[1].content.len(), 7);
        assert!(narrative.slides[2].content[2].contains("from 1 to 52"));
        assert_eq!(narrative.recommended_charts, selector::recommend(&profile()));
    }

    #[test]
    fn partial_reply_is_supplemented() {
        let reply = r#"```json
{
  "title": "Category performance",
  "insights": ["B dominates value", "  "],
  "slides": [{"title": "Summary", "content": ["one", 2], "slide_type": "overview"}],
  "recommended_charts": [
    {"type": "bar", "x_column": "Category", "y_column": "Value",
     "title": "Value by category", "purpose": "compare"},
    {"type": "scatter", "x_column": "Nope", "y_column": "Value", "title": "bad", "purpose": "x"},
    {"type": "radar", "x_column": "Value", "title": "bad", "purpose": "x"}
  ]
}
```"#;
        let narrative = parse_narrative(reply, &profile(), "sales.csv").unwrap();
        assert_eq!(narrative.title, "Category performance");
        assert_eq!(narrative.insights.len(), 3);
        assert_eq!(narrative.insights[0], "B dominates value");
        assert_eq!(
            narrative.insights[1],
            "Dataset contains 6 records across 3 columns"
        );
        assert_eq!(narrative.slides[0].content, vec!["one", "2"]);
        assert_eq!(narrative.recommended_charts[0].title, "Value by category");
        assert_eq!(narrative.recommended_charts.len(), MAX_CHARTS);
        // the selector's own category bar duplicates the reply's chart
        let bars = narrative
            .recommended_charts
            .iter()
            .filter(|c| c.chart_type() == ChartType::Bar)
            .count();
        assert_eq!(bars, 1);
    }

    #[test]
    fn long_titles_and_insights_are_cut() {
        let title = "word ".repeat(30);
        let insight = "x".repeat(150);
        let reply = serde_json::json!({
            "title": title,
            "insights": [insight, "b", "c"],
        })
        .to_string();
        let narrative = parse_narrative(&reply, &profile(), "f.csv").unwrap();
        assert!(narrative.title.chars().count() <= TITLE_LIMIT);
        assert!(narrative.title.ends_with("..."));
        assert_eq!(narrative.insights[0].chars().count(), INSIGHT_LIMIT);
    }

    #[test]
    fn wrongly_typed_fields_are_malformed() {
        let reply = r#"{"title": "t", "insights": "not a list"}"#;
        assert!(matches!(
            parse_narrative(reply, &profile(), "f.csv"),
            Err(NarrativeError::Malformed { .. })
        ));
    }

    struct Scripted(Result<&'static str, ()>);

    impl NarrativeService for Scripted {
        fn summarize(&self, _prompt: &str) -> NarrativeResult<String> {
            match self.0 {
                Ok(text) => Ok(text.to_string()),
                Err(()) => Err(NarrativeError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }),
            }
        }
    }

    #[test]
    fn failing_service_degrades_to_fallback() {
        let narrator = Narrator::new(Box::new(Scripted(Err(()))));
        let outcome = narrator.generate(&profile(), "sales.csv");
        assert!(outcome.fallback_used);
        assert!(outcome.failure.unwrap().contains("503"));
        assert_eq!(outcome.narrative, fallback(&profile(), "sales.csv"));
    }

    #[test]
    fn offline_narrator_never_reports_failure() {
        let outcome = Narrator::offline().generate(&profile(), "sales.csv");
        assert!(outcome.fallback_used);
        assert!(outcome.failure.is_none());
    }

    #[test]
    fn prose_reply_falls_back() {
        let narrator = Narrator::new(Box::new(Scripted(Ok("I am unable to comply."))));
        let outcome = narrator.generate(&profile(), "sales.csv");
        assert!(outcome.fallback_used);
    }
}
