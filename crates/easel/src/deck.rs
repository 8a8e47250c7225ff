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

//! Slide deck layout and the HTML deck writer.

use crate::error::{DeckError, DeckResult};
use crate::narrative::{group_thousands, truncate_text, Narrative, SlideType};
use crate::profiler::DatasetProfile;
use crate::logging::log_recovered_failure;
use crate::render::{escape_xml, minimal_placeholder, RenderedChart};
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Slide width in CSS pixels.
pub const SLIDE_WIDTH: u32 = 1280;
/// Slide height in CSS pixels.
pub const SLIDE_HEIGHT: u32 = 720;
/// Bullets shown before the overflow note.
pub const MAX_BULLETS: usize = 10;
/// Characters per bullet.
pub const BULLET_LIMIT: usize = 120;
/// Characters per slide title.
pub const SLIDE_TITLE_LIMIT: usize = 80;

/// One slide of the deck.
#[derive(Debug, Clone, PartialEq)]
pub enum Slide {
    /// Deck title and subtitle lines.
    Title,
    /// Heading over a bullet list.
    Bullets {
        /// Slide heading.
        title: String,
        /// Bullet text, capped at render time.
        bullets: Vec<String>,
    },
    /// Heading over an embedded SVG chart.
    Chart {
        /// Slide heading.
        title: String,
        /// Chart markup.
        svg: String,
        /// The chart could not be drawn.
        placeholder: bool,
    },
}

/// Ordered slides plus the title slide's text.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    /// Deck title.
    pub title: String,
    /// Lines under the title.
    pub subtitle: Vec<String>,
    /// Slides in presentation order.
    pub slides: Vec<Slide>,
}

impl Deck {
    /// Title slide, the narrative's own slides, then one slide per chart.
    /// Narrative title slides are replaced by the deck's title slide. Chart
    /// markup is read from the stored artifacts, so the charts' scope must
    /// still be open.
    pub fn build(
        narrative: &Narrative,
        profile: &DatasetProfile,
        charts: &[RenderedChart],
        generated: NaiveDate,
    ) -> Self {
        let subtitle = vec![
            format!(
                "Dataset: {} rows, {} columns",
                group_thousands(profile.rows),
                profile.columns
            ),
            format!("Key Insights: {} findings", narrative.insights.len()),
            format!("Generated: {}", generated.format("%B %d, %Y")),
        ];

        let mut slides = vec![Slide::Title];
        slides.extend(
            narrative
                .slides
                .iter()
                .filter(|s| s.slide_type != SlideType::Title)
                .map(|s| Slide::Bullets {
                    title: s.title.clone(),
                    bullets: s.content.clone(),
                }),
        );
        let has_insight_slide = narrative
            .slides
            .iter()
            .any(|s| s.slide_type == SlideType::Insights);
        if !has_insight_slide && !narrative.insights.is_empty() {
            slides.push(Slide::Bullets {
                title: "Key Insights".to_string(),
                bullets: narrative.insights.clone(),
            });
        }
        slides.extend(charts.iter().map(|c| match c.svg() {
            Ok(svg) => Slide::Chart {
                title: c.title.clone(),
                svg,
                placeholder: c.placeholder,
            },
            Err(error) => {
                log_recovered_failure("deck", &c.title, &error);
                Slide::Chart {
                    title: c.title.clone(),
                    svg: minimal_placeholder(SLIDE_WIDTH, SLIDE_HEIGHT, &c.title),
                    placeholder: true,
                }
            }
        }));

        Self {
            title: narrative.title.clone(),
            subtitle,
            slides,
        }
    }

    /// Number of chart slides.
    pub fn chart_count(&self) -> usize {
        self.slides
            .iter()
            .filter(|s| matches!(s, Slide::Chart { .. }))
            .count()
    }
}

/// Writes a deck to a file and returns where it landed.
pub trait DeckAssembler {
    /// Writes `deck` to `output`.
    fn assemble(&self, deck: &Deck, output: &Path) -> DeckResult<PathBuf>;
}

/// Single self-contained HTML file with one fixed 16:9 section per slide.
#[derive(Debug, Clone, Default)]
pub struct HtmlDeckAssembler;

impl HtmlDeckAssembler {
    /// Assembler with the built-in stylesheet.
    pub fn new() -> Self {
        Self
    }

    /// The whole deck as one HTML document.
    pub fn to_html(&self, deck: &Deck) -> DeckResult<String> {
        if deck.slides.is_empty() {
            return Err(DeckError::Empty);
        }
        let mut html = String::new();
        write!(
            html,
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  body {{
    margin: 0; background: #d5d8dc;
    font-family: "Helvetica Neue", Arial, sans-serif;
  }}
  section.slide {{
    position: relative; box-sizing: border-box; width: {w}px; height: {h}px;
    margin: 24px auto; padding: 40px 64px; background: #ffffff;
    overflow: hidden; page-break-after: always;
  }}
  section.slide h1 {{ margin: 0; color: #2c3e50; text-align: center; }}
  section.title h1 {{ margin-top: 190px; font-size: 44px; }}
  section.title p {{ margin: 6px 0; color: #7f8c8d; font-size: 18px; text-align: center; }}
  section.bullets h1, section.chart h1 {{ font-size: 30px; }}
  section.bullets ul {{ margin-top: 36px; color: #2c3e50; font-size: 19px; line-height: 1.35; }}
  section.bullets li {{ margin: 6px 0; }}
  section.bullets li.more {{
    color: #7f8c8d; font-style: italic; list-style: none; font-size: 16px;
  }}
  section.chart .figure {{
    position: absolute; left: 64px; right: 64px; top: 110px; bottom: 30px;
  }}
  section.chart .figure svg {{ width: 100%; height: 100%; }}
</style>
</head>
<body>
"#,
            title = escape_xml(&deck.title),
            w = SLIDE_WIDTH,
            h = SLIDE_HEIGHT,
        )?;

        for (index, slide) in deck.slides.iter().enumerate() {
            match slide {
                Slide::Title => {
                    writeln!(html, r#"<section class="slide title" id="slide-{index}">"#)?;
                    writeln!(html, "<h1>{}</h1>", escape_xml(&deck.title))?;
                    for line in &deck.subtitle {
                        writeln!(html, "<p>{}</p>", escape_xml(line))?;
                    }
                }
                Slide::Bullets { title, bullets } => {
                    writeln!(html, r#"<section class="slide bullets" id="slide-{index}">"#)?;
                    writeln!(
                        html,
                        "<h1>{}</h1>",
                        escape_xml(&truncate_text(title, SLIDE_TITLE_LIMIT))
                    )?;
                    writeln!(html, "<ul>")?;
                    for bullet in bullets.iter().take(MAX_BULLETS) {
                        writeln!(
                            html,
                            "<li>{}</li>",
                            escape_xml(&truncate_text(bullet, BULLET_LIMIT))
                        )?;
                    }
                    if bullets.len() > MAX_BULLETS {
                        writeln!(
                            html,
                            r#"<li class="more">... and {} more insights</li>"#,
                            bullets.len() - MAX_BULLETS
                        )?;
                    }
                    writeln!(html, "</ul>")?;
                }
                Slide::Chart {
                    title,
                    svg,
                    placeholder,
                } => {
                    let class = if *placeholder {
                        "slide chart placeholder"
                    } else {
                        "slide chart"
                    };
                    writeln!(html, r#"<section class="{class}" id="slide-{index}">"#)?;
                    writeln!(html, "<h1>{}</h1>", escape_xml(title))?;
                    writeln!(html, r#"<div class="figure">"#)?;
                    writeln!(html, "{}", svg.trim())?;
                    writeln!(html, "</div>")?;
                }
            }
            writeln!(html, "</section>")?;
        }
        writeln!(html, "</body>\n</html>")?;
        Ok(html)
    }
}

impl DeckAssembler for HtmlDeckAssembler {
    fn assemble(&self, deck: &Deck, output: &Path) -> DeckResult<PathBuf> {
        let html = self.to_html(deck)?;
        fs::write(output, html).map_err(|source| DeckError::Write {
            path: output.display().to_string(),
            source,
        })?;
        info!(
            path = %output.display(),
            slides = deck.slides.len(),
            charts = deck.chart_count(),
            "Deck written"
        );
        Ok(output.to_path_buf())
    }
}

/// `{stem}_analysis_presentation.html` next to the input file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    input.with_file_name(format!("{stem}_analysis_presentation.html"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck(bullets: usize) -> Deck {
        Deck {
            title: "Sales <2024>".to_string(),
            subtitle: vec!["Dataset: 6 rows, 2 columns".to_string()],
            slides: vec![
                Slide::Title,
                Slide::Bullets {
                    title: "Findings".to_string(),
                    bullets: (0..bullets).map(|i| format!("point {i} & more")).collect(),
                },
                Slide::Chart {
                    title: "Region vs Revenue".to_string(),
                    svg: "<svg xmlns='http://www.w3.org/2000/svg'></svg>".to_string(),
                    placeholder: false,
                },
            ],
        }
    }

    #[test]
    fn bullets_are_capped_with_overflow_note() {
        let html = HtmlDeckAssembler::new().to_html(&deck(13)).unwrap();
        assert_eq!(html.matches("<li>").count(), MAX_BULLETS);
        assert!(html.contains("... and 3 more insights"));
        assert!(html.contains("point 0 &amp; more"));
        assert!(html.contains("<title>Sales &lt;2024&gt;</title>"));
        assert_eq!(html.matches("<section").count(), 3);
        assert!(html.contains("<svg xmlns='http://www.w3.org/2000/svg'></svg>"));
    }

    #[test]
    fn long_bullets_are_truncated() {
        let mut d = deck(0);
        d.slides[1] = Slide::Bullets {
            title: "Findings".to_string(),
            bullets: vec!["y".repeat(300)],
        };
        let html = HtmlDeckAssembler::new().to_html(&d).unwrap();
        assert!(html.contains(&format!("<li>{}...</li>", "y".repeat(BULLET_LIMIT - 3))));
        assert!(!html.contains("more insights"));
    }

    #[test]
    fn empty_deck_is_rejected() {
        let d = Deck {
            title: "t".to_string(),
            subtitle: Vec::new(),
            slides: Vec::new(),
        };
        assert!(matches!(
            HtmlDeckAssembler::new().to_html(&d),
            Err(DeckError::Empty)
        ));
    }

    #[test]
    fn assemble_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("deck.html");
        let written = HtmlDeckAssembler::new().assemble(&deck(2), &out).unwrap();
        assert_eq!(written, out);
        assert!(fs::read_to_string(&out).unwrap().starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn chart_slides_embed_the_stored_artifacts() {
        use crate::chart::ChartSpec;
        use crate::config::{ProfilingConfig, RenderConfig};
        use crate::narrative::fallback;
        use crate::profiler::Profiler;
        use crate::render::{ArtifactScope, ChartRenderer};
        use crate::table::{Column, Table};

        let table = Table::new(vec![
            Column::from_texts("Region", &["north", "south", "north", "east"]),
            Column::from_numbers("Revenue", &[10.0, 20.0, 30.0, 40.0]),
        ]);
        let profile = Profiler::new(ProfilingConfig::default()).profile(&table);
        let narrative = fallback(&profile, "sales.csv");
        let renderer = ChartRenderer::new(&table, RenderConfig::default());
        let mut scope = ArtifactScope::new().unwrap();
        let spec = ChartSpec::pie(Some("Region"), None, "Region Share", "");
        let charts = vec![renderer.render(&spec, &mut scope)];

        fs::write(charts[0].path().unwrap(), "<svg id='stored'/>").unwrap();
        let generated = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let built = Deck::build(&narrative, &profile, &charts, generated);
        assert!(built.slides.contains(&Slide::Chart {
            title: "Region Share".to_string(),
            svg: "<svg id='stored'/>".to_string(),
            placeholder: false,
        }));

        drop(scope);
        let built = Deck::build(&narrative, &profile, &charts, generated);
        let Some(Slide::Chart { svg, placeholder, .. }) = built.slides.last() else {
            panic!("last slide should be the chart");
        };
        assert!(*placeholder);
        assert!(svg.contains("Chart: Region Share"));
    }

    #[test]
    fn default_name_sits_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("/data/q3 sales.csv")),
            PathBuf::from("/data/q3 sales_analysis_presentation.html")
        );
    }
}
