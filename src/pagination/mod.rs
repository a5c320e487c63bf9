//! Multi-strategy pagination driver.
//!
//! The engine owns the loop and the stop conditions; the caller supplies a
//! page-fetch callback that turns query parameters into records. Errors from
//! the callback abort the run and propagate unchanged.

mod config;

pub use config::{PaginationError, PaginationSpec};

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::models::{QueryParams, Record};

/// Why a pagination run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndReached,
    EmptyPage,
    MaxPages,
    CursorMissing,
    MissingCursorGetter,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::EndReached => "end_reached",
            StopReason::EmptyPage => "empty_page",
            StopReason::MaxPages => "max_pages",
            StopReason::CursorMissing => "cursor_missing",
            StopReason::MissingCursorGetter => "missing_cursor_getter",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one pagination run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationRunResult {
    pub pages_fetched: u32,
    pub records_total: usize,
    pub stopped_reason: StopReason,
}

/// Shared slot for the next cursor.
///
/// The page-fetch callback writes the cursor it decoded from each response;
/// the engine reads it after every page. One cell belongs to one pass.
#[derive(Debug, Clone, Default)]
pub struct CursorCell(Arc<Mutex<Option<String>>>);

impl CursorCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, cursor: Option<String>) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = cursor;
    }

    pub fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn finish(pages_fetched: u32, records: Vec<Record>, reason: StopReason) -> (Vec<Record>, PaginationRunResult) {
    debug!(
        "Pagination stopped after {} pages ({} records): {}",
        pages_fetched,
        records.len(),
        reason
    );
    let result = PaginationRunResult {
        pages_fetched,
        records_total: records.len(),
        stopped_reason: reason,
    };
    (records, result)
}

/// Drive `fetch_page` according to `spec`, accumulating records in page order.
///
/// Each call receives `base_params` plus the strategy's own parameters.
/// Cursor runs read the next cursor from `cursor` after every non-empty page;
/// without a cell the run stops after the first page.
pub async fn run<F, Fut, E>(
    spec: &PaginationSpec,
    mut fetch_page: F,
    base_params: QueryParams,
    cursor: Option<&CursorCell>,
) -> Result<(Vec<Record>, PaginationRunResult), E>
where
    F: FnMut(QueryParams) -> Fut,
    Fut: Future<Output = Result<Vec<Record>, E>>,
{
    let mut params = base_params;
    let mut all_records: Vec<Record> = Vec::new();
    let mut pages_fetched = 0u32;

    match spec {
        PaginationSpec::PageParam { param, start, end } => {
            for page in *start..=*end {
                params.insert(param.clone(), Value::from(page));
                let records = fetch_page(params.clone()).await?;
                pages_fetched += 1;
                if records.is_empty() {
                    return Ok(finish(pages_fetched, all_records, StopReason::EmptyPage));
                }
                all_records.extend(records);
            }
            Ok(finish(pages_fetched, all_records, StopReason::EndReached))
        }

        PaginationSpec::Offset {
            offset_param,
            limit_param,
            limit,
            max_pages,
            start_offset,
        } => {
            let mut offset = *start_offset;
            for _ in 0..*max_pages {
                params.insert(offset_param.clone(), Value::from(offset));
                params.insert(limit_param.clone(), Value::from(*limit));
                let records = fetch_page(params.clone()).await?;
                pages_fetched += 1;
                if records.is_empty() {
                    return Ok(finish(pages_fetched, all_records, StopReason::EmptyPage));
                }
                all_records.extend(records);
                let Some(next) = offset.checked_add(*limit) else {
                    debug!("Offset {} + {} exceeds u64, no further pages", offset, limit);
                    return Ok(finish(pages_fetched, all_records, StopReason::MaxPages));
                };
                offset = next;
            }
            Ok(finish(pages_fetched, all_records, StopReason::MaxPages))
        }

        PaginationSpec::Cursor {
            cursor_param,
            max_pages,
            initial_cursor,
            ..
        } => {
            let mut current = initial_cursor.clone();
            for _ in 0..*max_pages {
                match &current {
                    Some(value) => {
                        params.insert(cursor_param.clone(), Value::String(value.clone()));
                    }
                    None => {
                        params.remove(cursor_param);
                    }
                }

                let records = fetch_page(params.clone()).await?;
                pages_fetched += 1;
                if records.is_empty() {
                    return Ok(finish(pages_fetched, all_records, StopReason::EmptyPage));
                }
                all_records.extend(records);

                let Some(cell) = cursor else {
                    return Ok(finish(pages_fetched, all_records, StopReason::MissingCursorGetter));
                };

                current = cell.get().filter(|c| !c.is_empty());
                cell.set(current.clone());

                if current.is_none() {
                    return Ok(finish(pages_fetched, all_records, StopReason::CursorMissing));
                }
            }
            Ok(finish(pages_fetched, all_records, StopReason::MaxPages))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::Infallible;

    fn page_of(n: usize, tag: &str) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut r = Record::new();
                r.insert("id", format!("{}-{}", tag, i));
                r
            })
            .collect()
    }

    fn page_param(start: u32, end: u32) -> PaginationSpec {
        PaginationSpec::PageParam {
            param: "page".to_string(),
            start,
            end,
        }
    }

    #[tokio::test]
    async fn test_page_param_end_reached() {
        let mut seen = Vec::new();
        let (records, result) = run(
            &page_param(2, 4),
            |params: QueryParams| {
                seen.push(params["page"].clone());
                async { Ok::<_, Infallible>(page_of(2, "p")) }
            },
            QueryParams::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(seen, vec![json!(2), json!(3), json!(4)]);
        assert_eq!(records.len(), 6);
        assert_eq!(result.pages_fetched, 3);
        assert_eq!(result.records_total, 6);
        assert_eq!(result.stopped_reason, StopReason::EndReached);
    }

    #[tokio::test]
    async fn test_page_param_stops_on_empty_page() {
        let (records, result) = run(
            &page_param(1, 10),
            |params: QueryParams| {
                let page = params["page"].as_u64().unwrap_or(0);
                async move { Ok::<_, Infallible>(if page < 3 { page_of(1, "p") } else { Vec::new() }) }
            },
            QueryParams::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(result.pages_fetched, 3);
        assert_eq!(result.stopped_reason, StopReason::EmptyPage);
    }

    #[tokio::test]
    async fn test_page_param_keeps_records_before_empty_page() {
        let (records, result) = run(
            &page_param(1, 3),
            |params: QueryParams| {
                let page = params["page"].as_u64().unwrap_or(0);
                async move { Ok::<_, Infallible>(if page == 2 { Vec::new() } else { page_of(3, "first") }) }
            },
            QueryParams::new(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(result.pages_fetched, 2);
        assert_eq!(result.stopped_reason, StopReason::EmptyPage);
        assert_eq!(records, page_of(3, "first"));
    }

    #[tokio::test]
    async fn test_offset_from_zero() {
        let spec = PaginationSpec::Offset {
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            limit: 20,
            max_pages: 5,
            start_offset: 0,
        };
        let mut offsets = Vec::new();
        let (_, result) = run(
            &spec,
            |params: QueryParams| {
                offsets.push(params["offset"].as_u64().unwrap_or(u64::MAX));
                async { Ok::<_, Infallible>(page_of(20, "o")) }
            },
            QueryParams::new(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(offsets, vec![0, 20, 40, 60, 80]);
        assert_eq!(result.pages_fetched, 5);
        assert_eq!(result.stopped_reason, StopReason::MaxPages);
    }

    #[tokio::test]
    async fn test_offset_stops_before_overflowing() {
        let spec = PaginationSpec::Offset {
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            limit: i64::MAX as u64,
            max_pages: 4,
            start_offset: 0,
        };
        let mut offsets = Vec::new();
        let (records, result) = run(
            &spec,
            |params: QueryParams| {
                offsets.push(params["offset"].as_u64().unwrap_or(0));
                async { Ok::<_, Infallible>(page_of(1, "big")) }
            },
            QueryParams::new(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(offsets, vec![0, i64::MAX as u64, 2 * (i64::MAX as u64)]);
        assert_eq!(result.pages_fetched, 3);
        assert_eq!(result.stopped_reason, StopReason::MaxPages);
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_offset_windows_and_base_params() {
        let spec = PaginationSpec::Offset {
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            limit: 10,
            max_pages: 3,
            start_offset: 5,
        };
        let mut base = QueryParams::new();
        base.insert("q".to_string(), json!("shoes"));

        let mut seen = Vec::new();
        let (records, result) = run(
            &spec,
            |params: QueryParams| {
                seen.push((params["offset"].clone(), params["limit"].clone(), params["q"].clone()));
                async { Ok::<_, Infallible>(page_of(10, "o")) }
            },
            base,
            None,
        )
        .await
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (json!(5), json!(10), json!("shoes")),
                (json!(15), json!(10), json!("shoes")),
                (json!(25), json!(10), json!("shoes")),
            ]
        );
        assert_eq!(records.len(), 30);
        assert_eq!(result.stopped_reason, StopReason::MaxPages);
    }

    fn cursor_spec(max_pages: u32, initial: Option<&str>) -> PaginationSpec {
        PaginationSpec::Cursor {
            cursor_param: "after".to_string(),
            cursor_field: "next".to_string(),
            max_pages,
            initial_cursor: initial.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_cursor_follows_cell_until_missing() {
        let cell = CursorCell::new();
        let writer = cell.clone();
        let mut base = QueryParams::new();
        base.insert("after".to_string(), json!("stale"));

        let mut seen = Vec::new();
        let (records, result) = run(
            &cursor_spec(10, None),
            |params: QueryParams| {
                seen.push(params.get("after").cloned());
                let next = match params.get("after").and_then(Value::as_str) {
                    None => Some("c1".to_string()),
                    Some("c1") => Some("c2".to_string()),
                    _ => None,
                };
                writer.set(next);
                async { Ok::<_, Infallible>(page_of(1, "c")) }
            },
            base,
            Some(&cell),
        )
        .await
        .unwrap();

        assert_eq!(seen, vec![None, Some(json!("c1")), Some(json!("c2"))]);
        assert_eq!(records.len(), 3);
        assert_eq!(result.pages_fetched, 3);
        assert_eq!(result.stopped_reason, StopReason::CursorMissing);
        assert_eq!(cell.get(), None);
    }

    #[tokio::test]
    async fn test_cursor_empty_string_counts_as_missing() {
        let cell = CursorCell::new();
        let writer = cell.clone();
        let (_, result) = run(
            &cursor_spec(5, Some("start")),
            |_params: QueryParams| {
                writer.set(Some(String::new()));
                async { Ok::<_, Infallible>(page_of(1, "c")) }
            },
            QueryParams::new(),
            Some(&cell),
        )
        .await
        .unwrap();
        assert_eq!(result.pages_fetched, 1);
        assert_eq!(result.stopped_reason, StopReason::CursorMissing);
    }

    #[tokio::test]
    async fn test_cursor_without_cell_stops_after_first_page() {
        let (records, result) = run(
            &cursor_spec(5, Some("x")),
            |_params: QueryParams| async { Ok::<_, Infallible>(page_of(4, "c")) },
            QueryParams::new(),
            None,
        )
        .await
        .unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(result.pages_fetched, 1);
        assert_eq!(result.stopped_reason, StopReason::MissingCursorGetter);
    }

    #[tokio::test]
    async fn test_cursor_max_pages() {
        let cell = CursorCell::new();
        let writer = cell.clone();
        let (_, result) = run(
            &cursor_spec(2, Some("a")),
            |_params: QueryParams| {
                writer.set(Some("more".to_string()));
                async { Ok::<_, Infallible>(page_of(1, "c")) }
            },
            QueryParams::new(),
            Some(&cell),
        )
        .await
        .unwrap();
        assert_eq!(result.pages_fetched, 2);
        assert_eq!(result.stopped_reason, StopReason::MaxPages);
    }

    #[tokio::test]
    async fn test_fetch_errors_propagate() {
        let mut calls = 0;
        let outcome = run(
            &page_param(1, 5),
            |_params: QueryParams| {
                calls += 1;
                let fail = calls == 2;
                async move {
                    if fail {
                        Err("boom")
                    } else {
                        Ok(page_of(1, "p"))
                    }
                }
            },
            QueryParams::new(),
            None,
        )
        .await;
        assert_eq!(outcome.unwrap_err(), "boom");
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_stop_reason_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(StopReason::MissingCursorGetter).unwrap(),
            json!("missing_cursor_getter")
        );
        assert_eq!(StopReason::EndReached.to_string(), "end_reached");
    }
}
