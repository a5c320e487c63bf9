//! Document mode: fetch HTML over plain HTTP and extract records from it.

use std::time::Instant;

use serde_json::json;
use tracing::info;

use super::batch::inject_url;
use super::outcome::{AnalyzeOutcome, Mode};
use super::request::{AnalyzeRequest, DocumentRequest, RequestError};
use super::{finalize, param_text, run_passes, PassError, TraceLog};
use crate::extract::extract_records_from_html;
use crate::models::{DecisionTraceEntry, QueryParams, Record};
use crate::pagination::{self, PaginationSpec};
use crate::scrapers::{with_query_param, HttpClient};

/// Analyze one or more HTML documents.
pub async fn analyze_document(
    client: &HttpClient,
    request: &DocumentRequest,
) -> Result<AnalyzeOutcome, RequestError> {
    request.validate()?;
    info!("Document analysis of {}", request.url);

    let trace = TraceLog::default();
    trace.record(
        "debug_config",
        true,
        json!({
            "batch_identifiers_count": request.batch_identifiers.as_ref().map_or(0, Vec::len),
            "batch_var": request.batch_variable_name,
        }),
    );

    let records = run_passes(
        request.batch_identifiers.as_deref(),
        request.delay_ms,
        &trace,
        |identifier| {
            let trace = &trace;
            async move {
                let url = match &identifier {
                    Some(id) => {
                        let url = inject_url(id, &request.batch_variable_name, &request.url);
                        trace.record("batch_iteration", true, json!({"identifier": id, "url": url}));
                        url
                    }
                    None => request.url.clone(),
                };
                document_pass(client, request, trace, &url).await
            }
        },
    )
    .await;

    let mut empty_message = "No records found.".to_string();
    match selector(request) {
        Some(css) => empty_message.push_str(&format!(" Selector '{}' might be incorrect.", css)),
        None => empty_message.push_str(" Auto-detection failed."),
    }

    Ok(finalize(
        Mode::Document,
        records,
        &request.requested_fields,
        trace,
        empty_message,
        "Document(s)",
    ))
}

fn selector(request: &DocumentRequest) -> Option<&str> {
    request
        .css_selector
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

async fn fetch_html(
    client: &HttpClient,
    request: &DocumentRequest,
    url: &str,
) -> Result<(u16, String, String), PassError> {
    let fetch = client
        .get(url, &request.headers, &QueryParams::new(), &request.cookies, 0)
        .await?;
    Ok((fetch.status_code, fetch.final_url.clone(), fetch.text()))
}

async fn document_pass(
    client: &HttpClient,
    request: &DocumentRequest,
    trace: &TraceLog,
    url: &str,
) -> Result<Vec<Record>, PassError> {
    let started = Instant::now();
    let (status, final_url, html) = fetch_html(client, request, url).await?;
    trace.push(
        DecisionTraceEntry::new("fetch_document", status < 400)
            .timed(started)
            .with_details(json!({"status": status, "final_url": final_url})),
    );

    if status >= 400 {
        trace.record("fetch_error", false, json!({"status": status, "url": url}));
        return Ok(Vec::new());
    }

    let css = selector(request);
    let method = match css {
        Some(css) => {
            trace.record(
                "extraction_method",
                true,
                json!({"method": "css_selector", "selector": css}),
            );
            "css_selector"
        }
        None => {
            trace.record(
                "extraction_method",
                true,
                json!({"method": "auto_detect", "note": "Will try tables, then fail if none found"}),
            );
            "auto_detect"
        }
    };

    let started = Instant::now();
    let preview = extract_records_from_html(&html, css);
    trace.push(
        DecisionTraceEntry::new("extract_records", !preview.is_empty())
            .timed(started)
            .with_details(json!({"records": preview.len(), "method": method})),
    );

    if preview.is_empty() {
        return Ok(Vec::new());
    }

    let Some(spec) = &request.pagination else {
        trace.record("extract_html_records", true, json!({"records": preview.len()}));
        return Ok(preview);
    };

    let PaginationSpec::PageParam { param, start, end } = spec else {
        trace.record(
            "pagination_error",
            false,
            json!({"error": "Document mode supports only page_param pagination."}),
        );
        return Ok(Vec::new());
    };

    let started = Instant::now();
    let (records, run) = pagination::run(
        spec,
        |params: QueryParams| {
            let page = params.get(param.as_str()).map(param_text).unwrap_or_default();
            let page_url = with_query_param(url, param, &page);
            async move {
                let (_, _, page_html) = fetch_html(client, request, &page_url).await?;
                Ok::<_, PassError>(extract_records_from_html(&page_html, css))
            }
        },
        QueryParams::new(),
        None,
    )
    .await?;

    trace.push(
        DecisionTraceEntry::new("pagination", true)
            .timed(started)
            .with_details(json!({
                "type": spec.kind(),
                "pages_fetched": run.pages_fetched,
                "records_total": run.records_total,
                "stopped_reason": run.stopped_reason,
                "start": start,
                "end": end,
            })),
    );

    Ok(records)
}
