//! Pagination configuration parsing and validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Malformed pagination configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("pagination must be an object")]
    NotAnObject,
    #[error("pagination.type must be one of: page_param, offset, cursor")]
    UnknownType,
    #[error("pagination.{0} is required")]
    MissingField(&'static str),
    #[error("pagination.{field} invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("cursor pagination is only available for API requests")]
    CursorNotAllowed,
}

/// A validated pagination strategy. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "Value")]
pub enum PaginationSpec {
    /// `param=start`, `param=start+1`, ... up to and including `end`.
    PageParam { param: String, start: u32, end: u32 },
    /// Offset/limit windows starting at `start_offset`.
    Offset {
        offset_param: String,
        limit_param: String,
        limit: u64,
        max_pages: u32,
        start_offset: u64,
    },
    /// Follow a cursor read from each response.
    Cursor {
        cursor_param: String,
        cursor_field: String,
        max_pages: u32,
        initial_cursor: Option<String>,
    },
}

impl TryFrom<Value> for PaginationSpec {
    type Error = PaginationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        PaginationSpec::parse(&value, true)
    }
}

const DEFAULT_CURSOR_MAX_PAGES: u32 = 10;

fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn required_name(raw: &serde_json::Map<String, Value>, field: &'static str) -> Result<String, PaginationError> {
    let name = match raw.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => {
            return Err(PaginationError::Invalid {
                field,
                reason: "expected a string".to_string(),
            })
        }
    };
    if name.is_empty() {
        return Err(PaginationError::MissingField(field));
    }
    Ok(name)
}

/// Read an integer field; absent or null means `None`. Numeric strings are accepted.
fn integer(raw: &serde_json::Map<String, Value>, field: &'static str) -> Result<Option<i64>, PaginationError> {
    let value = raw.get(field);
    if is_absent(value) {
        return Ok(None);
    }

    let invalid = |reason: &str| PaginationError::Invalid {
        field,
        reason: reason.to_string(),
    };

    match value {
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or_else(|| invalid("expected an integer")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid("expected an integer")),
        _ => Err(invalid("expected an integer")),
    }
}

fn at_least(field: &'static str, value: i64, min: i64) -> Result<i64, PaginationError> {
    if value < min {
        return Err(PaginationError::Invalid {
            field,
            reason: format!("must be >= {}", min),
        });
    }
    Ok(value)
}

fn to_u32(field: &'static str, value: i64) -> Result<u32, PaginationError> {
    u32::try_from(value).map_err(|_| PaginationError::Invalid {
        field,
        reason: "out of range".to_string(),
    })
}

impl PaginationSpec {
    /// Parse and validate raw pagination configuration.
    ///
    /// Defaults apply only to absent fields: page_param `start=1` and
    /// `end=start`, offset `start_offset=0`, cursor `max_pages=10`. Explicit
    /// values that violate a bound are rejected.
    pub fn parse(raw: &Value, allow_cursor: bool) -> Result<Self, PaginationError> {
        let Value::Object(raw) = raw else {
            return Err(PaginationError::NotAnObject);
        };

        match raw.get("type").and_then(Value::as_str) {
            Some("page_param") => {
                let param = required_name(raw, "param")?;
                let start = at_least("start", integer(raw, "start")?.unwrap_or(1), 1)?;
                let end = integer(raw, "end")?.unwrap_or(start);
                if end < start {
                    return Err(PaginationError::Invalid {
                        field: "end",
                        reason: format!("must be >= start ({})", start),
                    });
                }
                Ok(PaginationSpec::PageParam {
                    param,
                    start: to_u32("start", start)?,
                    end: to_u32("end", end)?,
                })
            }
            Some("offset") => {
                let offset_param = required_name(raw, "offset_param")?;
                let limit_param = required_name(raw, "limit_param")?;
                let limit = integer(raw, "limit")?.ok_or(PaginationError::MissingField("limit"))?;
                let max_pages =
                    integer(raw, "max_pages")?.ok_or(PaginationError::MissingField("max_pages"))?;
                let start_offset = integer(raw, "start_offset")?.unwrap_or(0);
                Ok(PaginationSpec::Offset {
                    offset_param,
                    limit_param,
                    limit: at_least("limit", limit, 1)? as u64,
                    max_pages: to_u32("max_pages", at_least("max_pages", max_pages, 1)?)?,
                    start_offset: at_least("start_offset", start_offset, 0)? as u64,
                })
            }
            Some("cursor") => {
                if !allow_cursor {
                    return Err(PaginationError::CursorNotAllowed);
                }
                let cursor_param = required_name(raw, "cursor_param")?;
                let cursor_field = required_name(raw, "cursor_field")?;
                let max_pages = integer(raw, "max_pages")?.unwrap_or(DEFAULT_CURSOR_MAX_PAGES as i64);
                let initial_cursor = match raw.get("initial_cursor") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                };
                Ok(PaginationSpec::Cursor {
                    cursor_param,
                    cursor_field,
                    max_pages: to_u32("max_pages", at_least("max_pages", max_pages, 1)?)?,
                    initial_cursor,
                })
            }
            _ => Err(PaginationError::UnknownType),
        }
    }

    /// The `type` tag of this strategy.
    pub fn kind(&self) -> &'static str {
        match self {
            PaginationSpec::PageParam { .. } => "page_param",
            PaginationSpec::Offset { .. } => "offset",
            PaginationSpec::Cursor { .. } => "cursor",
        }
    }
}
