//! Decision trace: the append-only audit log of one analysis request.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One step recorded while servicing a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTraceEntry {
    pub step: String,
    pub ok: bool,
    #[serde(rename = "ms", default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl DecisionTraceEntry {
    pub fn new(step: &str, ok: bool) -> Self {
        Self {
            step: step.to_string(),
            ok,
            elapsed_ms: None,
            details: None,
        }
    }

    /// Attach elapsed time measured from `started`.
    pub fn timed(mut self, started: Instant) -> Self {
        self.elapsed_ms = Some(started.elapsed().as_millis() as u64);
        self
    }

    /// Attach details. Non-object values are stored under a `value` key.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = match details {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Some(map)
            }
        };
        self
    }

    /// Look up a detail value by key.
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.as_ref().and_then(|d| d.get(key))
    }
}

/// Ordered decision trace. Entries can be appended but never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTrace {
    entries: Vec<DecisionTraceEntry>,
}

impl DecisionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: DecisionTraceEntry) {
        if entry.ok {
            debug!("trace {} {:?}", entry.step, entry.details);
        } else {
            warn!("trace {} failed {:?}", entry.step, entry.details);
        }
        self.entries.push(entry);
    }

    /// Shorthand for pushing an entry with details.
    pub fn record(&mut self, step: &str, ok: bool, details: Value) {
        self.push(DecisionTraceEntry::new(step, ok).with_details(details));
    }

    pub fn entries(&self) -> &[DecisionTraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries with the given step tag, in order.
    pub fn steps<'a>(&'a self, step: &'a str) -> impl Iterator<Item = &'a DecisionTraceEntry> {
        self.entries.iter().filter(move |e| e.step == step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_serializes_with_ms_key() {
        let mut entry = DecisionTraceEntry::new("fetch_document", true)
            .with_details(json!({"status": 200}));
        entry.elapsed_ms = Some(12);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"step": "fetch_document", "ok": true, "ms": 12, "details": {"status": 200}})
        );
    }

    #[test]
    fn test_entry_omits_empty_fields() {
        let entry = DecisionTraceEntry::new("debug_config", false);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"step": "debug_config", "ok": false})
        );
    }

    #[test]
    fn test_scalar_details_are_wrapped() {
        let entry = DecisionTraceEntry::new("note", true).with_details(json!("hello"));
        assert_eq!(entry.detail("value"), Some(&json!("hello")));
    }

    #[test]
    fn test_trace_keeps_append_order() {
        let mut trace = DecisionTrace::new();
        trace.record("a", true, json!({}));
        trace.record("b", false, json!({"error": "x"}));
        trace.record("a", true, json!({}));

        let steps: Vec<&str> = trace.entries().iter().map(|e| e.step.as_str()).collect();
        assert_eq!(steps, vec!["a", "b", "a"]);
        assert_eq!(trace.steps("a").count(), 2);
    }
}
