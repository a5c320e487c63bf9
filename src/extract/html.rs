//! HTML record extraction.
//!
//! Strategies, in priority order:
//! 1. Selector-based: the caller names the repeating element with a CSS selector.
//! 2. Table-based: the largest `<table>` on the page becomes the record set.
//! 3. Nothing: an empty result tells the caller to try another mode.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::table::extract_records_from_tables;
use crate::models::{FieldValue, Record};

/// Positional fallback field, removed once the record has anything else.
pub const INDEX_KEY: &str = "_index";

/// Fields that do not count as extracted content on their own.
const META_KEYS: &[&str] = &[INDEX_KEY, "link", "src", "alt"];

static NON_ALNUM_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Clean a string into a field key: lowercase alphanumerics joined by underscores.
pub fn clean_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    NON_ALNUM_RUN
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Derive a field name from a CSS class token.
///
/// BEM tokens use the part after the last `__` (element) or, failing that,
/// after the last `--` (modifier): `product__title` -> `title`,
/// `price--sale` -> `sale`. Other tokens are cleaned whole: `card-header` -> `card_header`.
pub fn class_field_name(class_name: &str) -> String {
    if let Some((_, element)) = class_name.rsplit_once("__") {
        return clean_key(element);
    }
    if let Some((_, modifier)) = class_name.rsplit_once("--") {
        return clean_key(modifier);
    }
    clean_key(class_name)
}

/// Visible text of an element: trimmed text nodes joined by single spaces.
pub fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trimmed, non-empty attribute value.
fn element_attr(element: &ElementRef, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn image_src(element: &ElementRef) -> Option<String> {
    element_attr(element, "src").or_else(|| element_attr(element, "data-src"))
}

/// Extract records using a caller-supplied CSS selector for the repeating element.
///
/// An unparseable selector or one that matches nothing yields no records.
pub fn extract_records_with_selector(html: &str, css_selector: &str) -> Vec<Record> {
    let selector = match Selector::parse(css_selector) {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid CSS selector '{}': {}", css_selector, e);
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);
    let mut records = Vec::new();

    for (idx, element) in document.select(&selector).enumerate() {
        if let Some(record) = record_from_element(&element, idx + 1) {
            records.push(record);
        }
    }

    debug!(
        "Selector '{}' produced {} records",
        css_selector,
        records.len()
    );
    records
}

fn record_from_element(element: &ElementRef, position: usize) -> Option<Record> {
    let mut record = Record::new();
    record.insert(INDEX_KEY, FieldValue::Number(position.into()));

    // The matched element itself may be a link or an image.
    match element.value().name() {
        "a" => {
            if let Some(href) = element_attr(element, "href") {
                record.insert("link", href);
            }
        }
        "img" => {
            if let Some(src) = image_src(element) {
                record.insert("src", src);
            }
            if let Some(alt) = element_attr(element, "alt") {
                record.insert("alt", alt);
            }
        }
        _ => {}
    }

    // Descendants with class names carry the named fields.
    for child in element.descendants().skip(1).filter_map(ElementRef::wrap) {
        for class in child.value().classes() {
            let field = class_field_name(class);
            if field.len() < 2 {
                continue;
            }

            let text = element_text(&child);
            if !text.is_empty() {
                record.insert_if_absent(&field, text);
            }

            match child.value().name() {
                "a" => {
                    if let Some(href) = element_attr(&child, "href") {
                        record.insert(format!("{}_url", field), href);
                    }
                }
                "img" => {
                    if let Some(src) = image_src(&child) {
                        record.insert(format!("{}_image", field), src);
                    }
                    if let Some(alt) = element_attr(&child, "alt") {
                        record.insert(format!("{}_alt", field), alt);
                    }
                }
                _ => {}
            }
        }
    }

    // data-* attributes on the matched element.
    for (name, value) in element.value().attrs() {
        if !name.starts_with("data-") || value.is_empty() {
            continue;
        }
        let field = clean_key(&name.replace("data-", ""));
        if !field.is_empty() {
            record.insert(field, value);
        }
    }

    let has_content = record.keys().any(|k| !META_KEYS.contains(&k));
    if !has_content {
        let full_text = element_text(element);
        if !full_text.is_empty() {
            record.insert("text", full_text);
        }
    }

    if record.len() > 1 {
        record.remove(INDEX_KEY);
    }

    if record.is_empty() || (record.len() == 1 && record.contains_key(INDEX_KEY)) {
        return None;
    }
    Some(record)
}

/// Extract records from HTML, trying the selector first and tables second.
pub fn extract_records_from_html(html: &str, css_selector: Option<&str>) -> Vec<Record> {
    if let Some(selector) = css_selector.map(str::trim).filter(|s| !s.is_empty()) {
        return extract_records_with_selector(html, selector);
    }

    let table_records = extract_records_from_tables(html);
    if !table_records.is_empty() {
        return table_records;
    }

    debug!("No selector given and no usable tables found");
    Vec::new()
}
