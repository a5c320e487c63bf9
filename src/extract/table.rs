//! Table-based record extraction.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::html::element_text;
use crate::models::{FieldValue, Record};

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static HEADER_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th").expect("valid selector"));
static DATA_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static ANY_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th").expect("valid selector"));

/// Extract records from the table with the most data rows.
///
/// Ties keep the first table in document order.
pub fn extract_records_from_tables(html: &str) -> Vec<Record> {
    let document = Html::parse_document(html);

    let mut best: Vec<Record> = Vec::new();
    let mut table_count = 0usize;

    for table in document.select(&TABLE) {
        table_count += 1;
        let records = records_from_table(&table);
        if records.len() > best.len() {
            best = records;
        }
    }

    debug!(
        "Scanned {} tables, best has {} rows",
        table_count,
        best.len()
    );
    best
}

fn table_headers(header_row: &ElementRef) -> Vec<String> {
    let mut headers: Vec<String> = header_row
        .select(&HEADER_CELL)
        .map(|th| element_text(&th))
        .collect();

    if headers.is_empty() {
        headers = header_row
            .select(&DATA_CELL)
            .map(|td| element_text(&td))
            .collect();
    }

    headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| if h.is_empty() { format!("col_{}", i + 1) } else { h })
        .collect()
}

fn records_from_table(table: &ElementRef) -> Vec<Record> {
    let rows: Vec<ElementRef> = table.select(&ROW).collect();
    let Some(header_row) = rows.first() else {
        return Vec::new();
    };

    let headers = table_headers(header_row);
    if headers.is_empty() {
        return Vec::new();
    }

    let mut records = Vec::new();
    for row in rows.iter().skip(1) {
        let cells: Vec<String> = row
            .select(&ANY_CELL)
            .take(headers.len())
            .map(|cell| element_text(&cell))
            .collect();

        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }

        let mut record = Record::new();
        for (i, header) in headers.iter().enumerate() {
            let value = match cells.get(i) {
                Some(text) => FieldValue::Text(text.clone()),
                None => FieldValue::Null,
            };
            record.insert(header.as_str(), value);
        }
        records.push(record);
    }

    records
}
