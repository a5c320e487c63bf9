//! URL query helpers.

use url::Url;

/// Set (or replace) a query parameter on a URL, keeping the other parameters.
///
/// Existing parameters keep their position; a new key is appended. Duplicate
/// keys collapse to a single entry carrying the new value. Strings that do not
/// parse as absolute URLs are returned with the parameter appended textually.
pub fn with_query_param(url: &str, key: &str, value: &str) -> String {
    let mut parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => {
            let sep = if url.contains('?') { '&' } else { '?' };
            return format!(
                "{}{}{}",
                url,
                sep,
                url::form_urlencoded::Serializer::new(String::new())
                    .append_pair(key, value)
                    .finish()
            );
        }
    };

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (k, v) in parsed.query_pairs() {
        if k == key {
            if !replaced {
                pairs.push((k.into_owned(), value.to_string()));
                replaced = true;
            }
        } else {
            pairs.push((k.into_owned(), v.into_owned()));
        }
    }
    if !replaced {
        pairs.push((key.to_string(), value.to_string()));
    }

    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}
