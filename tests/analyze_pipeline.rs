//! End-to-end analysis against a local mock server.

use std::sync::Arc;

use serde_json::json;
use wdsp::analyze::{analyze_document, analyze_xhr, AnalyzeRequest, DocumentRequest, XhrRequest};
use wdsp::models::FieldValue;
use wdsp::{HttpClient, Mode, Settings};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> HttpClient {
    let settings = Settings {
        block_private_networks: false,
        retry_delay_ms: 1,
        ..Settings::default()
    };
    HttpClient::new(Arc::new(settings)).unwrap()
}

fn table(rows: &[(&str, &str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(name, price, sku)| format!("<tr><td>{name}</td><td>{price}</td><td>{sku}</td></tr>"))
        .collect();
    format!(
        "<html><body><table><tr><th>Name</th><th>Price</th><th>SKU</th></tr>{body}</table></body></html>"
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body)
}

fn text(value: Option<&FieldValue>) -> Option<&str> {
    value.and_then(FieldValue::as_text)
}

#[tokio::test]
async fn document_table_is_projected_onto_requested_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(html(table(&[("Lamp", "$20", "L-1"), ("Desk", "$150", "D-9")])))
        .mount(&server)
        .await;

    let request = DocumentRequest::from_json(
        &json!({
            "url": format!("{}/products", server.uri()),
            "requested_fields": ["name", "price"],
            "delay_ms": 0,
        })
        .to_string(),
    )
    .unwrap();

    let outcome = analyze_document(&client(), &request).await.unwrap();
    assert!(outcome.has_data);
    assert_eq!(outcome.mode_used, Mode::Document);
    assert_eq!(outcome.record_count, 2);
    assert_eq!(
        outcome.message,
        "Extracted 2 records from Document(s). Filtered to 2 fields."
    );

    let first = &outcome.records[0];
    assert_eq!(first.keys().collect::<Vec<_>>(), vec!["Name", "Price"]);
    assert_eq!(text(first.get("Name")), Some("Lamp"));
    assert_eq!(text(outcome.records[1].get("Price")), Some("$150"));

    let method_entry = outcome
        .decision_trace
        .steps("extraction_method")
        .next()
        .unwrap();
    assert_eq!(method_entry.detail("method"), Some(&json!("auto_detect")));
    let filtering = outcome.decision_trace.steps("field_filtering").next().unwrap();
    assert_eq!(filtering.detail("unmatched_requested"), Some(&json!([])));
}

#[tokio::test]
async fn document_http_error_is_traced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let request = DocumentRequest::from_json(
        &json!({"url": format!("{}/missing", server.uri()), "css_selector": ".item"}).to_string(),
    )
    .unwrap();

    let outcome = analyze_document(&client(), &request).await.unwrap();
    assert!(!outcome.has_data);
    assert_eq!(
        outcome.message,
        "No records found. Selector '.item' might be incorrect."
    );
    let error = outcome.decision_trace.steps("fetch_error").next().unwrap();
    assert_eq!(error.detail("status"), Some(&json!(404)));
}

#[tokio::test]
async fn document_page_param_pagination_stops_on_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "1"))
        .respond_with(html(table(&[("A", "1", "a"), ("B", "2", "b")])))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "2"))
        .respond_with(html(table(&[("C", "3", "c")])))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "3"))
        .respond_with(html("<p>No more results</p>".to_string()))
        .with_priority(1)
        .mount(&server)
        .await;
    // Unpaged URL used for the first look at the document
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(table(&[("A", "1", "a"), ("B", "2", "b")])))
        .with_priority(5)
        .mount(&server)
        .await;

    let request = DocumentRequest::from_json(
        &json!({
            "url": format!("{}/list", server.uri()),
            "pagination": {"type": "page_param", "param": "page", "start": 1, "end": 5},
        })
        .to_string(),
    )
    .unwrap();

    let outcome = analyze_document(&client(), &request).await.unwrap();
    assert_eq!(outcome.record_count, 3);
    let names: Vec<_> = outcome
        .records
        .iter()
        .filter_map(|r| text(r.get("Name")))
        .collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    let pagination = outcome.decision_trace.steps("pagination").next().unwrap();
    assert_eq!(pagination.detail("pages_fetched"), Some(&json!(3)));
    assert_eq!(pagination.detail("stopped_reason"), Some(&json!("empty_page")));
}

#[tokio::test]
async fn xhr_cursor_pagination_follows_dotted_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("after", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"items": [{"id": 3, "title": "three"}], "next": null}
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "items": [{"id": 1, "title": "one"}, {"id": 2, "title": "two"}],
                "next": "c2"
            }
        })))
        .with_priority(5)
        .mount(&server)
        .await;

    let request = XhrRequest::from_json(
        &json!({
            "api_url": format!("{}/api/items", server.uri()),
            "params": {"limit": 2},
            "requested_fields": ["title"],
            "delay_ms": 0,
            "max_retries": 0,
            "pagination": {"type": "cursor", "cursor_param": "after", "cursor_field": "data.next"},
        })
        .to_string(),
    )
    .unwrap();

    let outcome = analyze_xhr(&client(), &request).await.unwrap();
    assert!(outcome.has_data);
    assert_eq!(outcome.mode_used, Mode::Xhr);
    let titles: Vec<_> = outcome
        .records
        .iter()
        .filter_map(|r| text(r.get("title")))
        .collect();
    assert_eq!(titles, vec!["one", "two", "three"]);

    let cursors: Vec<_> = outcome
        .decision_trace
        .steps("cursor_update")
        .map(|e| e.detail("cursor").cloned())
        .collect();
    assert_eq!(cursors, vec![Some(json!("c2")), Some(json!(null))]);

    let pagination = outcome.decision_trace.steps("pagination").next().unwrap();
    assert_eq!(pagination.detail("pages"), Some(&json!(2)));
    assert_eq!(pagination.detail("stopped_reason"), Some(&json!("cursor_missing")));
    let found = outcome.decision_trace.steps("json_records").next().unwrap();
    assert_eq!(found.detail("path"), Some(&json!("$.data.items")));
}

#[tokio::test]
async fn xhr_post_injects_batch_identifiers_into_graphql_variables() {
    let server = MockServer::start().await;
    for id in ["7", "8"] {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_json(json!({"query": "q($id: ID!)", "variables": {"id": id}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"product": {"id": id, "name": format!("product {id}")}}
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let request = XhrRequest::from_json(
        &json!({
            "api_url": format!("{}/graphql", server.uri()),
            "method": "POST",
            "body": {"query": "q($id: ID!)", "variables": {"id": "0"}},
            "batch_identifiers": ["7", "8"],
            "delay_ms": 0,
            "max_retries": 0,
        })
        .to_string(),
    )
    .unwrap();

    let outcome = analyze_xhr(&client(), &request).await.unwrap();
    assert_eq!(outcome.record_count, 2);
    assert_eq!(outcome.decision_trace.steps("batch_iteration").count(), 2);
    assert_eq!(outcome.decision_trace.steps("xhr_single").count(), 2);
    assert_eq!(
        outcome.records[0].get("data"),
        Some(&FieldValue::Text(
            r#"{"product":{"id":"7","name":"product 7"}}"#.to_string()
        ))
    );
}

#[tokio::test]
async fn failed_identifier_does_not_stop_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(table(&[("A", "1", "a")])))
        .mount(&server)
        .await;

    let port = server.address().port().to_string();
    let request = DocumentRequest::from_json(
        &json!({
            "url": "http://127.0.0.1:{port}/list",
            "batch_identifiers": ["1", port],
            "batch_variable_name": "port",
            "delay_ms": 0,
        })
        .to_string(),
    )
    .unwrap();

    let outcome = analyze_document(&client(), &request).await.unwrap();
    assert_eq!(outcome.record_count, 1);

    let errors: Vec<_> = outcome.decision_trace.steps("batch_error").collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].detail("identifier"), Some(&json!("1")));
    assert!(!errors[0].ok);
}
