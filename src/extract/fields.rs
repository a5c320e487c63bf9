//! Fuzzy matching of requested field names against extracted records.
//!
//! Names are compared after normalization (`Company Name`, `company_name` and
//! `companyName` all become `companyname`). When no exact normalized match
//! exists, the first available field whose normalized name contains the
//! request, or is contained in it, is used. That fallback is a heuristic: a
//! request for `price` will happily match `unitpriceusd`. The order is
//! deterministic (alphabetical by actual field name) but carries no semantic
//! guarantee.

use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::models::Record;

/// Outcome of matching requested names against the fields present in records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldMatchResult {
    /// Requested name -> actual field name.
    pub matched_fields: IndexMap<String, String>,
    /// Requested names with no match, in request order.
    pub unmatched_requested: Vec<String>,
    /// Every field name seen in any record, sorted.
    pub all_available_fields: Vec<String>,
}

/// Lowercase and strip everything outside `[a-z0-9]`.
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

fn available_fields(records: &[Record]) -> Vec<String> {
    let fields: BTreeSet<&str> = records.iter().flat_map(Record::keys).collect();
    fields.into_iter().map(str::to_string).collect()
}

/// Match requested field names against the union of fields in `records`.
pub fn match_fields(records: &[Record], requested: &[String]) -> FieldMatchResult {
    if records.is_empty() {
        return FieldMatchResult {
            unmatched_requested: requested.to_vec(),
            ..Default::default()
        };
    }

    let all_fields = available_fields(records);

    // normalized -> actual; shorter actual names win collisions
    let mut normalized_to_actual: IndexMap<String, &str> = IndexMap::new();
    for field in &all_fields {
        let norm = normalize(field);
        match normalized_to_actual.get(&norm) {
            Some(existing) if existing.len() <= field.len() => {}
            _ => {
                normalized_to_actual.insert(norm, field.as_str());
            }
        }
    }

    let mut matched = IndexMap::new();
    let mut unmatched = Vec::new();

    for req in requested {
        let req_norm = normalize(req);
        if req_norm.is_empty() {
            continue;
        }

        let actual = normalized_to_actual.get(&req_norm).copied().or_else(|| {
            normalized_to_actual
                .iter()
                .find(|(norm, _)| norm.contains(&req_norm) || req_norm.contains(norm.as_str()))
                .map(|(_, actual)| *actual)
        });

        match actual {
            Some(actual) => {
                matched.insert(req.clone(), actual.to_string());
            }
            None => unmatched.push(req.clone()),
        }
    }

    FieldMatchResult {
        matched_fields: matched,
        unmatched_requested: unmatched,
        all_available_fields: all_fields,
    }
}

/// Keep only the requested fields in each record.
///
/// An empty request list leaves the records untouched. A non-empty request
/// list that matches nothing yields no records; the match result explains why.
pub fn project(records: Vec<Record>, requested: &[String]) -> (Vec<Record>, FieldMatchResult) {
    if requested.is_empty() {
        let result = FieldMatchResult {
            all_available_fields: available_fields(&records),
            ..Default::default()
        };
        return (records, result);
    }

    let result = match_fields(&records, requested);
    if result.matched_fields.is_empty() {
        return (Vec::new(), result);
    }

    let keep: IndexSet<&str> = result.matched_fields.values().map(String::as_str).collect();
    let projected = records
        .into_iter()
        .filter_map(|mut record| {
            record.retain_fields(|k| keep.contains(k));
            (!record.is_empty()).then_some(record)
        })
        .collect();

    (projected, result)
}
