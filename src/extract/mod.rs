//! Record extraction from HTML and JSON, plus field projection.

pub mod fields;
pub mod html;
pub mod json;
pub mod surface;
pub mod table;

pub use fields::{match_fields, normalize, project, FieldMatchResult};
pub use html::{extract_records_from_html, extract_records_with_selector};
pub use json::{cursor_at, extract_records_from_json, JsonRecords};
pub use surface::{
    compute_relevance, passes_relevance, suggest_selectors, surface_text, RelevanceResult,
    SelectorSuggestion, SurfaceUsed, DEFAULT_MIN_RELEVANCE,
};
pub use table::extract_records_from_tables;
