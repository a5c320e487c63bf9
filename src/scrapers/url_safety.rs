//! SSRF guard: reject URLs that point at internal infrastructure.
//!
//! `validate_public_http_url` checks the URL shape; `resolve_and_block_private_hosts`
//! additionally resolves the host and rejects it if any address is loopback,
//! private, link-local, multicast or reserved. Neither check is retried.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use url::{Host, Url};

/// Host literals rejected before any DNS lookup.
const BLOCKED_HOSTS: &[&str] = &["localhost"];

/// Prefixes re-checked on the textual IPv4 form (covers mapped IPv6 answers).
const PRIVATE_IPV4_PREFIXES: &[&str] = &["127.", "10.", "192.168."];

/// Why a URL was refused by the guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockedHost {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Only http/https URLs are allowed")]
    InvalidScheme,
    #[error("Invalid URL: missing host")]
    MissingHost,
    #[error("Blocked host: {0}")]
    BlockedLiteral(String),
    #[error("DNS resolution failed for host '{host}': {reason}")]
    DnsFailure { host: String, reason: String },
    #[error("No IP addresses resolved for host '{0}'")]
    NoAddresses(String),
    #[error("Blocked host '{host}' (resolves to private/internal IP {ip})")]
    PrivateAddress { host: String, ip: IpAddr },
}

/// DNS lookup seam, so the guard can be exercised without real resolution.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// System resolver backed by tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDnsResolver;

#[async_trait]
impl DnsResolver for TokioDnsResolver {
    async fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// Check scheme, host presence and the blocked-literal list.
pub fn validate_public_http_url(url: &str) -> Result<Url, BlockedHost> {
    let parsed = Url::parse(url).map_err(|e| BlockedHost::InvalidUrl(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(BlockedHost::InvalidScheme);
    }

    let host = match parsed.host_str() {
        Some(h) if !h.is_empty() => h.to_lowercase(),
        _ => return Err(BlockedHost::MissingHost),
    };

    if BLOCKED_HOSTS.contains(&host.as_str()) {
        return Err(BlockedHost::BlockedLiteral(host));
    }

    Ok(parsed)
}

/// Validate the URL, resolve its host and reject private/internal destinations.
///
/// IP-literal hosts are checked directly; domain names are resolved and every
/// returned address must be public.
pub async fn resolve_and_block_private_hosts(
    url: &str,
    resolver: &dyn DnsResolver,
) -> Result<(), BlockedHost> {
    let parsed = validate_public_http_url(url)?;
    let host_str = parsed.host_str().unwrap_or_default().to_string();

    let ips: Vec<IpAddr> = match parsed.host() {
        Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(Host::Domain(domain)) => {
            resolver
                .resolve(domain)
                .await
                .map_err(|e| BlockedHost::DnsFailure {
                    host: host_str.clone(),
                    reason: e.to_string(),
                })?
        }
        None => return Err(BlockedHost::MissingHost),
    };

    if ips.is_empty() {
        return Err(BlockedHost::NoAddresses(host_str));
    }

    if let Some(ip) = ips.iter().find(|ip| is_private_or_local(**ip)) {
        return Err(BlockedHost::PrivateAddress {
            host: host_str,
            ip: *ip,
        });
    }

    debug!("SSRF check passed for {} ({} addresses)", host_str, ips.len());
    Ok(())
}

/// True if the address is not safe to contact from a public-facing service.
pub fn is_private_or_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();

    if ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_unspecified()
        || ip.is_documentation()
    {
        return true;
    }

    // "this network" 0/8, shared address space 100.64/10,
    // IETF protocol assignments 192.0.0/24, benchmarking 198.18/15, reserved 240/4
    if a == 0
        || (a == 100 && (64..128).contains(&b))
        || (a == 192 && b == 0 && ip.octets()[2] == 0)
        || (a == 198 && (b == 18 || b == 19))
        || a >= 240
    {
        return true;
    }

    let text = ip.to_string();
    PRIVATE_IPV4_PREFIXES.iter().any(|p| text.starts_with(p))
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_private_v4(v4);
    }

    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return true;
    }

    let first = ip.segments()[0];

    // unique local fc00::/7, link-local fe80::/10, site-local fec0::/10
    if (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80 || (first & 0xffc0) == 0xfec0 {
        return true;
    }

    // documentation 2001:db8::/32
    if first == 0x2001 && ip.segments()[1] == 0x0db8 {
        return true;
    }

    // everything outside global unicast 2000::/3 is reserved
    (first & 0xe000) != 0x2000
}
