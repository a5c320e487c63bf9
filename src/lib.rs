//! wdsp - web data extraction engine.
//!
//! Fetches pages or API responses, discovers record-shaped data in them,
//! follows pagination, and projects the records onto the fields a caller
//! asked for. Every step is explained in a decision trace.

pub mod analyze;
pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod pagination;
pub mod scrapers;

pub use analyze::{
    analyze_document, analyze_rendered, analyze_xhr, AnalyzeOutcome, AnalyzeRequest,
    DocumentRequest, Mode, RenderedRequest, Renderer, XhrRequest,
};
pub use config::Settings;
pub use models::{DecisionTrace, DecisionTraceEntry, FieldValue, Record};
pub use scrapers::HttpClient;
