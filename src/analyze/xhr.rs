//! XHR mode: call an API endpoint directly and extract records from JSON,
//! falling back to HTML tables for non-JSON responses.

use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, info};

use super::batch::inject;
use super::outcome::{AnalyzeOutcome, Mode};
use super::request::{AnalyzeRequest, HttpMethod, RequestError, XhrRequest};
use super::{finalize, param_text, pause, run_passes, PassError, TraceLog};
use crate::extract::{cursor_at, extract_records_from_html, extract_records_from_json};
use crate::models::{DecisionTraceEntry, QueryParams, Record};
use crate::pagination::{self, CursorCell, PaginationSpec};
use crate::scrapers::{with_query_param, FetchResult, HttpClient};

const NO_RECORDS_MESSAGE: &str = "XHR response did not contain extractable records. \
If this endpoint is correct but requires JS rendering, use rendered mode.";

/// Analyze an API endpoint.
pub async fn analyze_xhr(
    client: &HttpClient,
    request: &XhrRequest,
) -> Result<AnalyzeOutcome, RequestError> {
    request.validate()?;
    info!("XHR analysis of {} {:?}", request.api_url, request.method);

    let trace = TraceLog::default();
    trace.record(
        "xhr_config",
        true,
        json!({
            "method": request.method,
            "has_body": request.body.is_some(),
            "has_cookies": !request.cookies.is_empty(),
            "delay_ms": request.delay_ms,
            "max_retries": request.max_retries,
        }),
    );

    let records = run_passes(
        request.batch_identifiers.as_deref(),
        request.delay_ms,
        &trace,
        |identifier| {
            let trace = &trace;
            async move {
                let (url, params, body) = match &identifier {
                    Some(id) => {
                        trace.record("batch_iteration", true, json!({"identifier": id}));
                        inject(
                            id,
                            &request.batch_variable_name,
                            &request.api_url,
                            &request.params,
                            request.body.as_ref(),
                        )
                    }
                    None => (
                        request.api_url.clone(),
                        request.params.clone(),
                        request.body.clone(),
                    ),
                };
                let pass = XhrPass {
                    client,
                    request,
                    trace,
                    url: &url,
                    body: body.as_ref(),
                };
                pass.run(params).await
            }
        },
    )
    .await;

    Ok(finalize(
        Mode::Xhr,
        records,
        &request.requested_fields,
        trace,
        NO_RECORDS_MESSAGE.to_string(),
        "XHR response",
    ))
}

/// One identifier's pass against the endpoint.
struct XhrPass<'a> {
    client: &'a HttpClient,
    request: &'a XhrRequest,
    trace: &'a TraceLog,
    url: &'a str,
    body: Option<&'a Value>,
}

impl XhrPass<'_> {
    async fn run(&self, params: QueryParams) -> Result<Vec<Record>, PassError> {
        let Some(spec) = &self.request.pagination else {
            let fetch = self.fetch_once(&params).await?;
            let (records, mode) = self.extract(&fetch);
            self.trace.record(
                "xhr_single",
                true,
                json!({"mode": mode, "records": records.len()}),
            );
            return Ok(records);
        };

        let cursor_field = match spec {
            PaginationSpec::Cursor { cursor_field, .. } => Some(cursor_field.as_str()),
            _ => None,
        };
        let cell = cursor_field.map(|_| CursorCell::new());

        let started = Instant::now();
        let (records, run) = pagination::run(
            spec,
            |page_params: QueryParams| {
                let cell = cell.as_ref();
                async move {
                    pause(self.request.delay_ms).await;
                    let fetch = self.fetch_once(&page_params).await?;
                    let (records, mode) = self.extract(&fetch);

                    if let (Some(field), Some(cell)) = (cursor_field, cell) {
                        let next = fetch.json().and_then(|payload| cursor_at(&payload, field));
                        cell.set(next.clone());
                        self.trace.record("cursor_update", true, json!({"cursor": next}));
                    }

                    self.trace.record(
                        "xhr_extract",
                        true,
                        json!({"mode": mode, "records": records.len()}),
                    );
                    Ok::<_, PassError>(records)
                }
            },
            params,
            cell.as_ref(),
        )
        .await?;

        self.trace.push(
            DecisionTraceEntry::new("pagination", true)
                .timed(started)
                .with_details(json!({
                    "type": spec.kind(),
                    "total": run.records_total,
                    "pages": run.pages_fetched,
                    "stopped_reason": run.stopped_reason,
                })),
        );
        Ok(records)
    }

    async fn fetch_once(&self, params: &QueryParams) -> Result<FetchResult, PassError> {
        let request = self.request;
        let started = Instant::now();

        let fetch = match request.method {
            HttpMethod::Get => {
                self.client
                    .get(self.url, &request.headers, params, &request.cookies, request.max_retries)
                    .await?
            }
            HttpMethod::Post => {
                // POST bodies stay fixed; query parameters ride on the URL.
                let url = params.iter().fold(self.url.to_string(), |url, (key, value)| {
                    with_query_param(&url, key, &param_text(value))
                });
                self.client
                    .post(&url, &request.headers, self.body, &request.cookies, request.max_retries)
                    .await?
            }
        };

        self.trace.push(
            DecisionTraceEntry::new("fetch_xhr", !fetch.is_error())
                .timed(started)
                .with_details(json!({"status": fetch.status_code})),
        );
        Ok(fetch)
    }

    /// Records from a response: JSON when it parses or is labelled JSON, HTML otherwise.
    fn extract(&self, fetch: &FetchResult) -> (Vec<Record>, &'static str) {
        let parsed = fetch.json();
        if parsed.is_some() || fetch.declares_json() {
            let Some(found) = parsed.as_ref().and_then(extract_records_from_json) else {
                debug!("JSON response from {} held no records", fetch.final_url);
                return (Vec::new(), "json_no_records");
            };
            self.trace.record(
                "json_records",
                true,
                json!({"path": found.path, "records": found.records.len()}),
            );
            return (found.records, "json");
        }

        let records = extract_records_from_html(&fetch.text(), None);
        self.trace.record(
            "html_records_from_xhr",
            !records.is_empty(),
            json!({"records": records.len()}),
        );
        (records, "html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        let settings = Settings {
            block_private_networks: false,
            ..Settings::default()
        };
        HttpClient::new(Arc::new(settings)).unwrap()
    }

    fn request(json: Value) -> XhrRequest {
        XhrRequest::from_json(&json.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_html_response_falls_back_to_tables() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fragment"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<table><tr><th>City</th></tr><tr><td>Oslo</td></tr></table>"),
            )
            .mount(&server)
            .await;

        let req = request(json!({"api_url": format!("{}/fragment", server.uri()), "delay_ms": 0}));
        let outcome = analyze_xhr(&client(), &req).await.unwrap();

        assert_eq!(outcome.record_count, 1);
        let single = outcome.decision_trace.steps("xhr_single").next().unwrap();
        assert_eq!(single.detail("mode"), Some(&json!("html")));
    }

    #[tokio::test]
    async fn test_json_without_records_reports_guidance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let req = request(json!({"api_url": format!("{}/empty", server.uri()), "delay_ms": 0}));
        let outcome = analyze_xhr(&client(), &req).await.unwrap();

        assert!(!outcome.has_data);
        assert_eq!(outcome.message, NO_RECORDS_MESSAGE);
        let single = outcome.decision_trace.steps("xhr_single").next().unwrap();
        assert_eq!(single.detail("mode"), Some(&json!("json_no_records")));
    }

    #[tokio::test]
    async fn test_offset_pagination_sends_offset_and_limit() {
        let server = MockServer::start().await;
        for (offset, body) in [("0", json!([{"n": 1}, {"n": 2}])), ("2", json!([]))] {
            Mock::given(method("GET"))
                .and(path("/rows"))
                .and(query_param("o", offset))
                .and(query_param("l", "2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }

        let req = request(json!({
            "api_url": format!("{}/rows", server.uri()),
            "delay_ms": 0,
            "pagination": {"type": "offset", "offset_param": "o", "limit_param": "l", "limit": 2, "max_pages": 5},
        }));
        let outcome = analyze_xhr(&client(), &req).await.unwrap();

        assert_eq!(outcome.record_count, 2);
        let pagination = outcome.decision_trace.steps("pagination").next().unwrap();
        assert_eq!(pagination.detail("pages"), Some(&json!(2)));
        assert_eq!(pagination.detail("stopped_reason"), Some(&json!("empty_page")));
    }
}
