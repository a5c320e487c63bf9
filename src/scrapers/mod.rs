//! Network access: the guarded HTTP client and URL helpers.

pub mod http_client;
pub mod url_safety;
pub mod url_utils;

pub use http_client::{try_parse_json, FetchError, FetchResult, HttpClient};
pub use url_safety::{
    is_private_or_local, resolve_and_block_private_hosts, validate_public_http_url, BlockedHost,
    DnsResolver, TokioDnsResolver,
};
pub use url_utils::with_query_param;
