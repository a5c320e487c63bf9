//! Rendered mode: extract records from HTML produced by an external browser.

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use super::batch::inject_url;
use super::outcome::{AnalyzeOutcome, Mode};
use super::request::{AnalyzeRequest, RenderedRequest, RequestError};
use super::{finalize, param_text, run_passes, PassError, TraceLog};
use crate::extract::extract_records_from_html;
use crate::models::{DecisionTraceEntry, QueryParams, Record, StringMap};
use crate::pagination::{self, PaginationSpec};
use crate::scrapers::{with_query_param, HttpClient};

/// Failure reported by a [`Renderer`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),
    #[error("Rendering {url} failed: {reason}")]
    Failed { url: String, reason: String },
}

/// What the browser should load and how long to let it settle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRequest {
    pub url: String,
    pub css_selector: String,
    pub wait_seconds: u64,
    pub cookies: StringMap,
    pub scroll_count: u32,
    pub scroll_delay_ms: u64,
}

/// Browser automation collaborator. Implementations return the final page HTML.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<String, RenderError>;
}

/// Analyze pages rendered by `renderer`.
///
/// The SSRF guard runs before every render when private-network blocking is on.
pub async fn analyze_rendered(
    client: &HttpClient,
    renderer: &dyn Renderer,
    request: &RenderedRequest,
) -> Result<AnalyzeOutcome, RequestError> {
    request.validate()?;
    info!("Rendered analysis of {}", request.url);

    let trace = TraceLog::default();

    let records = run_passes(
        request.batch_identifiers.as_deref(),
        request.delay_ms,
        &trace,
        |identifier| {
            let trace = &trace;
            async move {
                let url = match &identifier {
                    Some(id) => {
                        trace.record("batch_iteration", true, json!({"identifier": id}));
                        inject_url(id, &request.batch_variable_name, &request.url)
                    }
                    None => request.url.clone(),
                };
                Ok(rendered_pass(client, renderer, request, trace, &url).await)
            }
        },
    )
    .await;

    Ok(finalize(
        Mode::Rendered,
        records,
        &request.requested_fields,
        trace,
        "The page was rendered, but no matching DOM elements produced records.".to_string(),
        "the rendered page",
    ))
}

async fn render_and_extract(
    client: &HttpClient,
    renderer: &dyn Renderer,
    request: &RenderedRequest,
    url: &str,
) -> Result<Vec<Record>, PassError> {
    client.guard(url).await?;

    let html = renderer
        .render(&RenderRequest {
            url: url.to_string(),
            css_selector: request.css_selector.clone(),
            wait_seconds: request.wait_time,
            cookies: request.cookies.clone(),
            scroll_count: request.scroll_count,
            scroll_delay_ms: request.scroll_delay_ms,
        })
        .await?;

    Ok(extract_records_from_html(&html, Some(&request.css_selector)))
}

/// Render failures are traced here rather than surfacing as `batch_error`.
async fn rendered_pass(
    client: &HttpClient,
    renderer: &dyn Renderer,
    request: &RenderedRequest,
    trace: &TraceLog,
    url: &str,
) -> Vec<Record> {
    let started = Instant::now();

    let Some(spec) = &request.pagination else {
        return match render_and_extract(client, renderer, request, url).await {
            Ok(records) => {
                trace.push(
                    DecisionTraceEntry::new("render_extract", !records.is_empty())
                        .timed(started)
                        .with_details(json!({"records": records.len()})),
                );
                records
            }
            Err(e) => {
                trace.record("render_extract", false, json!({"error": e.to_string()}));
                Vec::new()
            }
        };
    };

    let PaginationSpec::PageParam { param, .. } = spec else {
        trace.record(
            "pagination_error",
            false,
            json!({"error": "Rendered mode supports only page_param pagination."}),
        );
        return Vec::new();
    };

    let outcome = pagination::run(
        spec,
        |params: QueryParams| {
            let page = params.get(param.as_str()).map(param_text).unwrap_or_default();
            let page_url = with_query_param(url, param, &page);
            async move { render_and_extract(client, renderer, request, &page_url).await }
        },
        QueryParams::new(),
        None,
    )
    .await;

    match outcome {
        Ok((records, run)) => {
            trace.push(
                DecisionTraceEntry::new("pagination", true)
                    .timed(started)
                    .with_details(json!({
                        "type": spec.kind(),
                        "total": run.records_total,
                        "pages": run.pages_fetched,
                        "stopped_reason": run.stopped_reason,
                    })),
            );
            records
        }
        Err(e) => {
            trace.record("pagination", false, json!({"error": e.to_string()}));
            Vec::new()
        }
    }
}
