//! Page surface analysis: headline text, field relevance and selector hints.

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

use super::html::element_text;

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static HEADINGS: LazyLock<[Selector; 3]> = LazyLock::new(|| {
    ["h1", "h2", "h3"].map(|tag| Selector::parse(tag).expect("valid selector"))
});
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").expect("valid selector"));
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("valid selector"));
static CLASSED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[class]").expect("valid selector"));

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const HEADINGS_PER_LEVEL: usize = 10;
const TABLES_SCANNED: usize = 5;
const HEADERS_PER_TABLE: usize = 50;
const CELLS_PER_ROW: usize = 20;
const MAX_SUGGESTIONS: usize = 10;

/// Default relevance threshold.
pub const DEFAULT_MIN_RELEVANCE: f64 = 0.4;

/// Which parts of the page contributed surface text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceUsed {
    TitleHeadings,
    TitleHeadingsTables,
}

impl SurfaceUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceUsed::TitleHeadings => "title_headings",
            SurfaceUsed::TitleHeadingsTables => "title_headings_tables",
        }
    }
}

impl fmt::Display for SurfaceUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collect the page title, headings and the first rows of the first tables.
pub fn surface_text(html: &str, max_table_rows: usize) -> (String, SurfaceUsed) {
    let document = Html::parse_document(html);
    let mut parts: Vec<String> = Vec::new();

    if let Some(title) = document.select(&TITLE).next() {
        let text = element_text(&title);
        if !text.is_empty() {
            parts.push(text);
        }
    }

    for heading in HEADINGS.iter() {
        for tag in document.select(heading).take(HEADINGS_PER_LEVEL) {
            let text = element_text(&tag);
            if !text.is_empty() {
                parts.push(text);
            }
        }
    }

    let mut found_table_header = false;
    for table in document.select(&TABLE).take(TABLES_SCANNED) {
        if table
            .select(&TH)
            .take(HEADERS_PER_TABLE)
            .any(|th| !element_text(&th).is_empty())
        {
            found_table_header = true;
        }

        for row in table.select(&TR).take(max_table_rows + 1) {
            parts.extend(
                row.select(&CELL)
                    .take(CELLS_PER_ROW)
                    .map(|cell| element_text(&cell))
                    .filter(|text| !text.is_empty()),
            );
        }
    }

    let used = if found_table_header {
        SurfaceUsed::TitleHeadingsTables
    } else {
        SurfaceUsed::TitleHeadings
    };
    (parts.join(" \n"), used)
}

/// How many requested fields appear in the page surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevanceResult {
    pub score: f64,
    pub matched_fields: Vec<String>,
    pub surface_used: SurfaceUsed,
}

fn normalize_words(text: &str) -> String {
    let lowered = text.to_lowercase();
    let spaced = NON_WORD.replace_all(&lowered, " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}

/// Score requested fields against surface text.
///
/// The score is the share of non-empty requests whose normalized words occur
/// in the normalized surface.
pub fn compute_relevance(
    requested: &[String],
    surface_text: &str,
    surface_used: SurfaceUsed,
) -> RelevanceResult {
    let surface = normalize_words(surface_text);

    let mut considered = 0usize;
    let mut matched = Vec::new();
    for field in requested {
        let normalized = normalize_words(field);
        if normalized.is_empty() {
            continue;
        }
        considered += 1;
        if surface.contains(&normalized) {
            matched.push(field.clone());
        }
    }

    RelevanceResult {
        score: matched.len() as f64 / considered.max(1) as f64,
        matched_fields: matched,
        surface_used,
    }
}

/// At least one match and a score of at least `min_score`.
pub fn passes_relevance(result: &RelevanceResult, min_score: f64) -> bool {
    !result.matched_fields.is_empty() && result.score >= min_score
}

/// A repeated class that might identify record elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorSuggestion {
    pub selector: String,
    pub count: usize,
}

/// Suggest `.class` selectors for class names repeated at least `min_count` times.
pub fn suggest_selectors(html: &str, min_count: usize) -> Vec<SelectorSuggestion> {
    let document = Html::parse_document(html);

    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for element in document.select(&CLASSED) {
        for class in element.value().classes() {
            *counts.entry(class).or_insert(0) += 1;
        }
    }

    let mut suggestions: Vec<SelectorSuggestion> = counts
        .into_iter()
        .filter(|(class, count)| *count >= min_count && class.chars().count() >= 3)
        .map(|(class, count)| SelectorSuggestion {
            selector: format!(".{}", class),
            count,
        })
        .collect();

    suggestions.sort_by(|a, b| b.count.cmp(&a.count));
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}
