//! Fetch result wrapper.

use indexmap::IndexMap;

/// Outcome of one completed HTTP exchange.
///
/// Status codes >= 400 are still a `FetchResult`; interpreting them is up to
/// the caller. Header names come back lowercased from the HTTP stack, so use
/// [`FetchResult::header`] for lookups.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub final_url: String,
    pub status_code: u16,
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
}

impl FetchResult {
    /// Check if the status code signals a client or server error.
    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// True if the server labelled the body as JSON.
    pub fn declares_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.to_lowercase().contains("application/json"))
            .unwrap_or(false)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        try_parse_json(&self.body)
    }
}

/// Try to parse bytes as JSON, decoding lossily as UTF-8 first.
pub fn try_parse_json(content: &[u8]) -> Option<serde_json::Value> {
    let text = String::from_utf8_lossy(content);
    serde_json::from_str(&text).ok()
}
