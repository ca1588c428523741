//! fOS Network Layer
//!
//! Domain classification for navigation gating.
//!
//! Architecture:
//! 1. Host normalized to its base domain
//! 2. Local check: MD5 double-hashed probe of a pre-built Bloom filter
//! 3. Remote check: MD5 prefix sent to the blocklist, suffix matched locally
//! 4. Every failure resolves to "allow"

mod anti_phishing;
mod bloom_filter;
mod client;
mod domain;
mod forget_mode;
mod hash;

pub use anti_phishing::{
    AntiPhishingDetector, BlocklistLookup, HttpBlocklist, PhishingLookupError,
    DEFAULT_ANTI_PHISHING_ENDPOINT,
};
pub use bloom_filter::{
    probe_indexes, BloomFilter, BloomFilterWriter, BloomFormatError, BITS_PER_BUCKET,
};
pub use client::{HttpClient, HttpClientConfig, HttpError, Response};
pub use domain::{
    base_domain, is_local_host, normalize_host, normalized_host, registrable_domain,
};
pub use forget_mode::{AutomaticForgetModeDetector, DEFAULT_FORGET_MODE_FILTER};
pub use hash::DomainHash;
pub use url::Url;
