//! HTTP client with SSRF guarding, byte caps and bounded retries.

mod response;
mod user_agent;

pub use response::{try_parse_json, FetchResult};
pub use user_agent::{
    random_user_agent, resolve_user_agent, user_agent_for_seed, BROWSER_USER_AGENTS,
    DEFAULT_USER_AGENT,
};

use std::sync::Arc;

use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::url_safety::{resolve_and_block_private_hosts, BlockedHost, DnsResolver, TokioDnsResolver};
use crate::config::Settings;
use crate::models::{QueryParams, StringMap};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Errors from the fetch layer.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Blocked(#[from] BlockedHost),
    #[error("Failed to {method} {url} after {attempts} attempts: {source}")]
    Transport {
        method: &'static str,
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("Response too large (>{limit} bytes)")]
    TooLarge { limit: usize },
    #[error("Too many redirects from {url} (limit {limit})")]
    TooManyRedirects { url: String, limit: usize },
    #[error("Invalid header '{0}'")]
    InvalidHeader(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// HTTP client shared by every pass of a request.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    settings: Arc<Settings>,
    resolver: Arc<dyn DnsResolver>,
    user_agent: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("user_agent", &self.user_agent)
            .field("block_private_networks", &self.settings.block_private_networks)
            .finish()
    }
}

impl HttpClient {
    /// Create a client using the system DNS resolver for SSRF checks.
    pub fn new(settings: Arc<Settings>) -> Result<Self, FetchError> {
        Self::with_resolver(settings, Arc::new(TokioDnsResolver))
    }

    /// Create a client with a custom DNS resolver for SSRF checks.
    pub fn with_resolver(
        settings: Arc<Settings>,
        resolver: Arc<dyn DnsResolver>,
    ) -> Result<Self, FetchError> {
        let client = client_builder(&settings)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self::from_parts(client, settings, resolver))
    }

    fn from_parts(client: Client, settings: Arc<Settings>, resolver: Arc<dyn DnsResolver>) -> Self {
        let user_agent = resolve_user_agent(settings.user_agent.as_deref());
        Self {
            client,
            settings,
            resolver,
            user_agent,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the SSRF guard for a URL if private-network blocking is enabled.
    pub async fn guard(&self, url: &str) -> Result<(), BlockedHost> {
        if self.settings.block_private_networks {
            resolve_and_block_private_hosts(url, self.resolver.as_ref()).await?;
        }
        Ok(())
    }

    /// Perform a GET request.
    ///
    /// Transport failures are retried up to `max_retries` extra times; HTTP
    /// error statuses are returned as-is.
    pub async fn get(
        &self,
        url: &str,
        headers: &StringMap,
        params: &QueryParams,
        cookies: &StringMap,
        max_retries: u32,
    ) -> Result<FetchResult, FetchError> {
        let header_map = to_header_map(&merged_headers(&self.user_agent, headers, cookies, false))?;
        self.execute(
            Outgoing {
                method: "GET",
                url: url.to_string(),
                headers: header_map,
                query: query_pairs(params),
                body: None,
            },
            max_retries,
        )
        .await
    }

    /// Perform a POST request with an optional JSON body.
    pub async fn post(
        &self,
        url: &str,
        headers: &StringMap,
        body: Option<&Value>,
        cookies: &StringMap,
        max_retries: u32,
    ) -> Result<FetchResult, FetchError> {
        let header_map =
            to_header_map(&merged_headers(&self.user_agent, headers, cookies, body.is_some()))?;
        self.execute(
            Outgoing {
                method: "POST",
                url: url.to_string(),
                headers: header_map,
                query: Vec::new(),
                body: body.map(|b| b.to_string()),
            },
            max_retries,
        )
        .await
    }

    /// Send a request, following redirects by hand so every hop passes the guard.
    async fn execute(&self, mut outgoing: Outgoing, max_retries: u32) -> Result<FetchResult, FetchError> {
        let origin = outgoing.url.clone();

        for hop in 0..=MAX_REDIRECTS {
            self.guard(&outgoing.url).await?;

            let result = self
                .send_with_retries(outgoing.method, &outgoing.url, max_retries, || {
                    outgoing.build(&self.client)
                })
                .await?;

            let Some(next) = redirect_target(&result) else {
                return Ok(result);
            };
            if hop == MAX_REDIRECTS {
                break;
            }

            debug!("Redirect {} -> {} ({})", outgoing.url, next, result.status_code);
            outgoing.redirect_to(next, result.status_code);
        }

        Err(FetchError::TooManyRedirects {
            url: origin,
            limit: MAX_REDIRECTS,
        })
    }

    async fn send_with_retries(
        &self,
        method: &'static str,
        url: &str,
        max_retries: u32,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<FetchResult, FetchError> {
        let attempts = max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("{} {} (attempt {}/{})", method, url, attempt, attempts);

            match send_once(build()).await {
                Ok(result) => {
                    if result.body.len() > self.settings.http_max_bytes {
                        return Err(FetchError::TooLarge {
                            limit: self.settings.http_max_bytes,
                        });
                    }
                    info!(
                        "{} {} -> {} ({} bytes)",
                        method,
                        result.final_url,
                        result.status_code,
                        result.body.len()
                    );
                    return Ok(result);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "{} {} failed (attempt {}/{}): {}",
                        method, url, attempt, attempts, e
                    );
                    tokio::time::sleep(self.settings.retry_delay()).await;
                }
                Err(e) => {
                    return Err(FetchError::Transport {
                        method,
                        url: url.to_string(),
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }
}

/// Redirects are never followed by reqwest itself; see [`HttpClient::execute`].
fn client_builder(settings: &Settings) -> reqwest::ClientBuilder {
    Client::builder()
        .connect_timeout(settings.connect_timeout())
        .read_timeout(settings.read_timeout())
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
}

/// One hop of an outbound request.
struct Outgoing {
    method: &'static str,
    url: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<String>,
}

impl Outgoing {
    fn build(&self, client: &Client) -> RequestBuilder {
        let request = match self.method {
            "POST" => client.post(&self.url),
            _ => client.get(&self.url),
        }
        .headers(self.headers.clone())
        .query(&self.query);

        match &self.body {
            Some(body) => request.body(body.clone()),
            None => request,
        }
    }

    /// Point at the redirect target. 301/302/303 turn a POST into a bodiless
    /// GET; credentials are not forwarded to a different host.
    fn redirect_to(&mut self, next: Url, status: u16) {
        if matches!(status, 301..=303) && self.method == "POST" {
            self.method = "GET";
            self.body = None;
            self.headers.remove(CONTENT_TYPE);
        }

        let same_host = Url::parse(&self.url)
            .map(|current| {
                current.host_str() == next.host_str()
                    && current.port_or_known_default() == next.port_or_known_default()
            })
            .unwrap_or(false);
        if !same_host {
            self.headers.remove(COOKIE);
            self.headers.remove(AUTHORIZATION);
        }

        // The Location header carries its own query string.
        self.query.clear();
        self.url = next.to_string();
    }
}

/// Absolute target of a redirect response, if it is one we follow.
fn redirect_target(result: &FetchResult) -> Option<Url> {
    if !matches!(result.status_code, 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    let location = result.header("location")?;
    Url::parse(&result.final_url).ok()?.join(location).ok()
}

async fn send_once(request: RequestBuilder) -> Result<FetchResult, reqwest::Error> {
    let response = request.send().await?;

    let final_url = response.url().to_string();
    let status_code = response.status().as_u16();

    let mut headers = IndexMap::new();
    for (name, value) in response.headers() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.to_string(), v.to_string());
        }
    }

    let body = response.bytes().await?.to_vec();

    Ok(FetchResult {
        final_url,
        status_code,
        headers,
        body,
    })
}

/// Merge the default user agent under caller headers, then add cookies.
///
/// Caller headers replace defaults with the same name (case-insensitive). A
/// non-empty cookie map becomes a single `Cookie` header. With `json_body`,
/// `Content-Type: application/json` is added unless the caller set one.
pub fn merged_headers(
    user_agent: &str,
    extra: &StringMap,
    cookies: &StringMap,
    json_body: bool,
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = vec![("User-Agent".to_string(), user_agent.to_string())];

    for (name, value) in extra {
        set_header(&mut merged, name, value);
    }

    if json_body && !merged.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
        merged.push(("Content-Type".to_string(), "application/json".to_string()));
    }

    if let Some(cookie) = build_cookie_header(cookies) {
        set_header(&mut merged, "Cookie", &cookie);
    }

    merged
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    headers.push((name.to_string(), value.to_string()));
}

/// Serialize cookies as a `Cookie` header value, or None when there are none.
pub fn build_cookie_header(cookies: &StringMap) -> Option<String> {
    if cookies.is_empty() {
        return None;
    }
    Some(
        cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Flatten query parameters into string pairs. Null values are dropped.
pub fn query_pairs(params: &QueryParams) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) => Some((k.clone(), s.clone())),
            other => Some((k.clone(), other.to_string())),
        })
        .collect()
}

fn to_header_map(headers: &[(String, String)]) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name_h = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        let value_h =
            HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.clone()))?;
        map.insert(name_h, value_h);
    }
    Ok(map)
}
