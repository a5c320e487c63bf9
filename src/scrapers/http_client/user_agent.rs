//! User agent selection.
//!
//! Extraction targets are ordinary websites, many of which serve reduced or
//! empty markup to obvious bots, so the default is a desktop browser string.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

/// Default user agent merged under caller-supplied headers.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Pool used when the configured user agent is `"impersonate"`.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    DEFAULT_USER_AGENT,
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// Pool entry for a seed, wrapping around the pool.
pub fn user_agent_for_seed(seed: u64) -> &'static str {
    let idx = (seed % BROWSER_USER_AGENTS.len() as u64) as usize;
    BROWSER_USER_AGENTS[idx]
}

/// Pick a browser user agent from the pool, seeded from the std hasher's
/// per-process random keys.
pub fn random_user_agent() -> &'static str {
    user_agent_for_seed(RandomState::new().build_hasher().finish())
}

/// Resolve the configured user agent.
/// - None => [`DEFAULT_USER_AGENT`]
/// - "impersonate" => random entry of [`BROWSER_USER_AGENTS`]
/// - other => used verbatim
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None | Some("") => DEFAULT_USER_AGENT.to_string(),
        Some("impersonate") => random_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}
