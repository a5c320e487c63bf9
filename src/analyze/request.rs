//! Analysis request definitions.
//!
//! Requests deserialize from JSON with the same defaults the HTTP API used,
//! then [`AnalyzeRequest::validate`] enforces the documented ranges.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{QueryParams, StringMap};
use crate::pagination::PaginationSpec;

pub const MAX_DELAY_MS: u64 = 10_000;
pub const MAX_RETRIES: u32 = 5;
pub const MAX_WAIT_SECONDS: u64 = 60;
pub const MAX_SCROLL_COUNT: u32 = 50;
pub const MAX_SCROLL_DELAY_MS: u64 = 10_000;

/// Invalid analysis request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Failed to parse request: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{field} must be <= {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
    #[error("body must be a JSON object")]
    BodyNotObject,
}

/// Common validation hook for the request types.
pub trait AnalyzeRequest: DeserializeOwned {
    fn validate(&self) -> Result<(), RequestError>;

    /// Parse a JSON request and validate it.
    fn from_json(json: &str) -> Result<Self, RequestError> {
        let request: Self = serde_json::from_str(json)?;
        request.validate()?;
        Ok(request)
    }
}

fn default_document_delay_ms() -> u64 {
    500
}

fn default_xhr_delay_ms() -> u64 {
    500
}

fn default_rendered_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    2
}

fn default_wait_time() -> u64 {
    5
}

fn default_scroll_delay_ms() -> u64 {
    2000
}

fn default_variable_name() -> String {
    "id".to_string()
}

fn not_empty(field: &'static str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        return Err(RequestError::Empty(field));
    }
    Ok(())
}

fn at_most(field: &'static str, value: u64, max: u64) -> Result<(), RequestError> {
    if value > max {
        return Err(RequestError::OutOfRange { field, value, max });
    }
    Ok(())
}

/// Fetch a page over plain HTTP and extract records from its HTML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub url: String,
    #[serde(default)]
    pub requested_fields: Vec<String>,
    #[serde(default)]
    pub headers: StringMap,
    #[serde(default)]
    pub cookies: StringMap,
    /// CSS selector for the repeating element; tables are tried without one.
    #[serde(default)]
    pub css_selector: Option<String>,
    #[serde(default)]
    pub pagination: Option<PaginationSpec>,
    /// Pause between batch identifiers.
    #[serde(default = "default_document_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub batch_identifiers: Option<Vec<String>>,
    #[serde(default = "default_variable_name")]
    pub batch_variable_name: String,
}

impl AnalyzeRequest for DocumentRequest {
    fn validate(&self) -> Result<(), RequestError> {
        not_empty("url", &self.url)?;
        at_most("delay_ms", self.delay_ms, MAX_DELAY_MS)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Call a JSON (or HTML) endpoint directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XhrRequest {
    pub api_url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub requested_fields: Vec<String>,
    #[serde(default)]
    pub headers: StringMap,
    #[serde(default)]
    pub cookies: StringMap,
    #[serde(default)]
    pub params: QueryParams,
    /// JSON body for POST requests (GraphQL included).
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub pagination: Option<PaginationSpec>,
    /// Pause before each paginated fetch and between batch identifiers.
    #[serde(default = "default_xhr_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub batch_identifiers: Option<Vec<String>>,
    #[serde(default = "default_variable_name")]
    pub batch_variable_name: String,
}

impl AnalyzeRequest for XhrRequest {
    fn validate(&self) -> Result<(), RequestError> {
        not_empty("api_url", &self.api_url)?;
        at_most("delay_ms", self.delay_ms, MAX_DELAY_MS)?;
        at_most("max_retries", self.max_retries as u64, MAX_RETRIES as u64)?;
        match &self.body {
            None | Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(RequestError::BodyNotObject),
        }
    }
}

/// Extract records from a page rendered by an external browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedRequest {
    pub url: String,
    #[serde(default)]
    pub requested_fields: Vec<String>,
    pub css_selector: String,
    #[serde(default)]
    pub cookies: StringMap,
    /// Seconds to wait after the page loads.
    #[serde(default = "default_wait_time")]
    pub wait_time: u64,
    /// Times to scroll to the bottom of the page.
    #[serde(default)]
    pub scroll_count: u32,
    #[serde(default = "default_scroll_delay_ms")]
    pub scroll_delay_ms: u64,
    #[serde(default)]
    pub pagination: Option<PaginationSpec>,
    #[serde(default = "default_rendered_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub batch_identifiers: Option<Vec<String>>,
    #[serde(default = "default_variable_name")]
    pub batch_variable_name: String,
}

impl AnalyzeRequest for RenderedRequest {
    fn validate(&self) -> Result<(), RequestError> {
        not_empty("url", &self.url)?;
        not_empty("css_selector", &self.css_selector)?;
        at_most("wait_time", self.wait_time, MAX_WAIT_SECONDS)?;
        at_most("scroll_count", self.scroll_count as u64, MAX_SCROLL_COUNT as u64)?;
        at_most("scroll_delay_ms", self.scroll_delay_ms, MAX_SCROLL_DELAY_MS)?;
        at_most("delay_ms", self.delay_ms, MAX_DELAY_MS)
    }
}
