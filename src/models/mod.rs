//! Data models shared across the extraction pipeline.

mod record;
mod trace;

pub use record::{FieldValue, Record};
pub use trace::{DecisionTrace, DecisionTraceEntry};

/// Query parameters as decoded from a request (values may be strings, numbers or booleans).
pub type QueryParams = serde_json::Map<String, serde_json::Value>;

/// Insertion-ordered string map used for headers and cookies.
pub type StringMap = indexmap::IndexMap<String, String>;
