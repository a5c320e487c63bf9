//! Batch identifier substitution.

use serde_json::Value;

use crate::models::QueryParams;

/// Identifiers to run, one pass each. An empty or missing list means a single
/// pass with no identifier.
pub fn pass_identifiers(identifiers: Option<&[String]>) -> Vec<Option<String>> {
    match identifiers {
        Some(ids) if !ids.is_empty() => ids.iter().cloned().map(Some).collect(),
        _ => vec![None],
    }
}

/// Replace every `{variable}` placeholder in a URL.
pub fn inject_url(identifier: &str, variable_name: &str, url: &str) -> String {
    url.replace(&format!("{{{}}}", variable_name), identifier)
}

/// Substitute `identifier` into a request's URL, query parameters and body.
///
/// - every `{variable_name}` in the URL is replaced
/// - `params[variable_name]` is replaced if present
/// - `body[variable_name]` is replaced if present
/// - `body.variables[variable_name]` is replaced if `variables` is an object holding it
///
/// The inputs are left untouched; modified copies are returned.
pub fn inject(
    identifier: &str,
    variable_name: &str,
    url: &str,
    params: &QueryParams,
    body: Option<&Value>,
) -> (String, QueryParams, Option<Value>) {
    let new_url = inject_url(identifier, variable_name, url);

    let mut new_params = params.clone();
    if let Some(slot) = new_params.get_mut(variable_name) {
        *slot = Value::String(identifier.to_string());
    }

    let mut new_body = body.cloned();
    if let Some(Value::Object(map)) = new_body.as_mut() {
        if let Some(slot) = map.get_mut(variable_name) {
            *slot = Value::String(identifier.to_string());
        }
        if let Some(Value::Object(variables)) = map.get_mut("variables") {
            if let Some(slot) = variables.get_mut(variable_name) {
                *slot = Value::String(identifier.to_string());
            }
        }
    }

    (new_url, new_params, new_body)
}
