//! Automatic Forget Mode Detector
//!
//! Classifies URLs whose base domain is listed in the bundled sensitive
//! domain filter. The filter is loaded once; a missing asset yields a
//! detector that never matches.

use crate::bloom_filter::BloomFilter;
use crate::domain::{base_domain, is_local_host};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;
use url::Url;

/// Conventional location of the bundled filter asset
pub const DEFAULT_FORGET_MODE_FILTER: &str = "assets/adult-domains.bin";

/// Bloom-filter backed forget-mode classifier
#[derive(Debug, Clone)]
pub struct AutomaticForgetModeDetector {
    filter: Arc<BloomFilter>,
}

impl AutomaticForgetModeDetector {
    /// Wrap an already decoded filter
    pub fn new(filter: BloomFilter) -> Self {
        Self {
            filter: Arc::new(filter),
        }
    }

    /// Load the filter asset, falling back to an empty filter
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::new(BloomFilter::load_or_empty(path))
    }

    /// Detector that never matches
    pub fn disabled() -> Self {
        Self::new(BloomFilter::empty())
    }

    /// Whether the URL's base domain is in the filter
    pub fn is_automatic_forget_url(&self, url: &Url) -> bool {
        if is_local_host(url) {
            return false;
        }

        let Some(domain) = base_domain(url) else {
            return false;
        };

        let matched = self.filter.contains(&domain);
        trace!("Forget-mode check {} -> {}", domain, matched);
        matched
    }

    /// Whether a usable filter was loaded
    pub fn is_loaded(&self) -> bool {
        !self.filter.is_empty()
    }

    /// Underlying filter
    pub fn filter(&self) -> &BloomFilter {
        &self.filter
    }
}
