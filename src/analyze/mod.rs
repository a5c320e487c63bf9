//! Request orchestration: batch passes, pacing, decision trace and projection.
//!
//! Every mode runs one pass per batch identifier. A pass that fails is logged
//! to the trace as `batch_error` and contributes nothing; the remaining
//! identifiers still run. After all passes the combined records are projected
//! onto the requested fields.

pub mod batch;
pub mod document;
pub mod outcome;
pub mod rendered;
pub mod request;
pub mod xhr;

pub use batch::{inject, pass_identifiers};
pub use document::analyze_document;
pub use outcome::{AnalyzeOutcome, Mode};
pub use rendered::{analyze_rendered, RenderError, RenderRequest, Renderer};
pub use request::{
    AnalyzeRequest, DocumentRequest, HttpMethod, RenderedRequest, RequestError, XhrRequest,
};
pub use xhr::analyze_xhr;

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::extract::project;
use crate::models::{DecisionTrace, DecisionTraceEntry, Record};
use crate::scrapers::{BlockedHost, FetchError};

/// Failure that ends a single pass.
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Blocked(#[from] BlockedHost),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Decision trace shared by a request's passes and page callbacks.
#[derive(Debug, Default)]
pub(crate) struct TraceLog(Mutex<DecisionTrace>);

impl TraceLog {
    pub(crate) fn push(&self, entry: DecisionTraceEntry) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
    }

    pub(crate) fn record(&self, step: &str, ok: bool, details: Value) {
        self.push(DecisionTraceEntry::new(step, ok).with_details(details));
    }

    pub(crate) fn into_inner(self) -> DecisionTrace {
        self.0.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) async fn pause(delay_ms: u64) {
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

/// Query parameter value as URL text.
pub(crate) fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Run `pass` once per identifier, in order, isolating failures.
pub(crate) async fn run_passes<F, Fut>(
    identifiers: Option<&[String]>,
    delay_ms: u64,
    trace: &TraceLog,
    mut pass: F,
) -> Vec<Record>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Vec<Record>, PassError>>,
{
    let identifiers = pass_identifiers(identifiers);
    let count = identifiers.len();
    let mut all_records = Vec::new();

    for (idx, identifier) in identifiers.into_iter().enumerate() {
        match pass(identifier.clone()).await {
            Ok(records) => all_records.extend(records),
            Err(e) => {
                warn!("Pass for {:?} failed: {}", identifier, e);
                trace.record(
                    "batch_error",
                    false,
                    json!({"identifier": identifier, "error": e.to_string()}),
                );
            }
        }

        if idx + 1 < count {
            pause(delay_ms).await;
        }
    }

    all_records
}

/// Project the combined records and build the outcome.
pub(crate) fn finalize(
    mode: Mode,
    records: Vec<Record>,
    requested_fields: &[String],
    trace: TraceLog,
    empty_message: String,
    source: &str,
) -> AnalyzeOutcome {
    let mut trace = trace.into_inner();

    if records.is_empty() {
        info!("{} analysis found no records", mode);
        return AnalyzeOutcome::no_data(mode, empty_message, trace);
    }

    let records_before = records.len();
    let (projected, field_match) = project(records, requested_fields);

    trace.record(
        "field_filtering",
        true,
        json!({
            "requested_fields": requested_fields,
            "all_available_fields": field_match.all_available_fields,
            "matched_fields": field_match.matched_fields,
            "unmatched_requested": field_match.unmatched_requested,
            "records_before": records_before,
            "records_after": projected.len(),
        }),
    );

    if projected.is_empty() {
        let available: Vec<&str> = field_match
            .all_available_fields
            .iter()
            .take(10)
            .map(String::as_str)
            .collect();
        return AnalyzeOutcome::no_data(
            mode,
            format!(
                "No records matched the requested fields. Available fields: {}",
                available.join(", ")
            ),
            trace,
        );
    }

    let field_info = if !requested_fields.is_empty() && !field_match.matched_fields.is_empty() {
        format!(" Filtered to {} fields.", field_match.matched_fields.len())
    } else {
        String::new()
    };

    info!("{} analysis extracted {} records", mode, projected.len());
    let message = format!("Extracted {} records from {}.{}", projected.len(), source, field_info);
    AnalyzeOutcome::with_records(mode, message, projected, trace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, value: &str) -> Record {
        let mut r = Record::new();
        r.insert(key, value);
        r
    }

    #[tokio::test]
    async fn test_failed_pass_is_isolated() {
        let trace = TraceLog::default();
        let ids = vec!["a".to_string(), "bad".to_string(), "c".to_string()];

        let records = run_passes(Some(&ids), 0, &trace, |identifier| async move {
            match identifier.as_deref() {
                Some("bad") => Err(PassError::Blocked(BlockedHost::MissingHost)),
                Some(id) => Ok(vec![record("id", id)]),
                None => Ok(Vec::new()),
            }
        })
        .await;

        assert_eq!(records, vec![record("id", "a"), record("id", "c")]);
        let trace = trace.into_inner();
        let errors: Vec<_> = trace.steps("batch_error").collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].detail("identifier"), Some(&json!("bad")));
        assert!(!errors[0].ok);
    }

    #[tokio::test]
    async fn test_no_identifiers_runs_single_pass() {
        let trace = TraceLog::default();
        let mut calls = Vec::new();
        run_passes(None, 0, &trace, |identifier| {
            calls.push(identifier);
            async { Ok(Vec::new()) }
        })
        .await;
        assert_eq!(calls, vec![None]);
    }

    #[test]
    fn test_finalize_without_records() {
        let outcome = finalize(
            Mode::Xhr,
            Vec::new(),
            &[],
            TraceLog::default(),
            "nothing".to_string(),
            "XHR response",
        );
        assert!(!outcome.has_data);
        assert_eq!(outcome.message, "nothing");
        assert!(outcome.decision_trace.is_empty());
    }

    #[test]
    fn test_finalize_projects_and_reports() {
        let records = vec![record("name", "a"), record("other", "b")];
        let outcome = finalize(
            Mode::Document,
            records,
            &["Name".to_string()],
            TraceLog::default(),
            String::new(),
            "Document(s)",
        );
        assert!(outcome.has_data);
        assert_eq!(outcome.record_count, 1);
        assert_eq!(
            outcome.message,
            "Extracted 1 records from Document(s). Filtered to 1 fields."
        );
        let filtering = outcome.decision_trace.steps("field_filtering").next().unwrap();
        assert_eq!(filtering.detail("records_before"), Some(&json!(2)));
        assert_eq!(filtering.detail("records_after"), Some(&json!(1)));
    }

    #[test]
    fn test_finalize_with_no_matching_fields() {
        let outcome = finalize(
            Mode::Document,
            vec![record("name", "a")],
            &["weight".to_string()],
            TraceLog::default(),
            String::new(),
            "Document(s)",
        );
        assert!(!outcome.has_data);
        assert_eq!(
            outcome.message,
            "No records matched the requested fields. Available fields: name"
        );
    }

    #[test]
    fn test_param_text() {
        assert_eq!(param_text(&json!("abc")), "abc");
        assert_eq!(param_text(&json!(3)), "3");
        assert_eq!(param_text(&json!(true)), "true");
    }
}
