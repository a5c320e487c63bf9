//! Result of one analysis request.

use std::fmt;

use serde::Serialize;

use crate::models::{DecisionTrace, Record};

/// Extraction mode that produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Document,
    Xhr,
    Rendered,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Document => "document",
            Mode::Xhr => "xhr",
            Mode::Rendered => "rendered",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records plus the decision trace that explains how they were found.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeOutcome {
    pub mode_used: Mode,
    pub has_data: bool,
    pub message: String,
    pub record_count: usize,
    pub records: Vec<Record>,
    pub decision_trace: DecisionTrace,
}

impl AnalyzeOutcome {
    pub fn no_data(mode: Mode, message: impl Into<String>, trace: DecisionTrace) -> Self {
        Self {
            mode_used: mode,
            has_data: false,
            message: message.into(),
            record_count: 0,
            records: Vec::new(),
            decision_trace: trace,
        }
    }

    pub fn with_records(
        mode: Mode,
        message: impl Into<String>,
        records: Vec<Record>,
        trace: DecisionTrace,
    ) -> Self {
        Self {
            mode_used: mode,
            has_data: !records.is_empty(),
            message: message.into(),
            record_count: records.len(),
            records,
            decision_trace: trace,
        }
    }
}
