//! Domain Normalization
//!
//! Hosts are normalized the same way when a filter asset is built and when
//! it is queried, otherwise lookups miss:
//! - lowercase, trailing dot removed
//! - one leading `www.`, `m.` or `mobile.` label stripped
//! - reduced to the registrable domain (public suffix + 1)

use url::{Host, Url};

/// Leading labels that point at the same site
const STRIPPED_PREFIXES: &[&str] = &["www.", "m.", "mobile."];

/// Hosts that never reach a classifier
const LOCAL_HOSTS: &[&str] = &["localhost", "local"];

/// Normalize a host name for consistent matching
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();

    for prefix in STRIPPED_PREFIXES {
        if let Some(rest) = host.strip_prefix(prefix) {
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }

    host
}

/// Normalized host of a URL, if it has one
pub fn normalized_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => Some(normalize_host(domain)),
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

/// Registrable domain of a host name (`foo.co.uk` for `WWW.foo.co.uk`).
///
/// This is the key filter assets are built and queried with. Hosts without
/// a registrable domain (`localhost`, a bare public suffix) yield `None`.
pub fn registrable_domain(host: &str) -> Option<String> {
    let normalized = normalize_host(host);
    psl::domain_str(&normalized).map(str::to_owned)
}

/// Registrable domain of a URL (`foo.co.uk` for `https://www.foo.co.uk/`).
///
/// IP literals are returned as-is.
pub fn base_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => registrable_domain(domain),
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

/// Whether the URL points at the local machine
pub fn is_local_host(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| LOCAL_HOSTS.contains(&host))
}
