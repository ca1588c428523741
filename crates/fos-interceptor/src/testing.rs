//! Shared fixtures for unit tests.

use async_trait::async_trait;
use fos_network::{
    AntiPhishingDetector, AutomaticForgetModeDetector, BlocklistLookup, BloomFilterWriter,
    DomainHash, PhishingLookupError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;
use url::Url;

/// Blocklist answering from a fixed host list, counting calls
pub struct StubLookup {
    suffixes: Vec<String>,
    calls: AtomicUsize,
}

impl StubLookup {
    pub fn listing(hosts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            suffixes: hosts
                .iter()
                .map(|host| DomainHash::of(host).lookup_suffix())
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlocklistLookup for StubLookup {
    async fn candidate_suffixes(&self, _md5_prefix: &str) -> Result<Vec<String>, PhishingLookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.suffixes.clone())
    }
}

/// Multi-threaded runtime for background scans; the test thread acts as main
pub fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

pub fn phishing_detector(runtime: &Runtime, hosts: &[&str]) -> (AntiPhishingDetector, Arc<StubLookup>) {
    let lookup = StubLookup::listing(hosts);
    let detector = AntiPhishingDetector::new(lookup.clone(), runtime.handle().clone());
    (detector, lookup)
}

pub fn forget_mode_detector(domains: &[&str]) -> AutomaticForgetModeDetector {
    let mut writer = BloomFilterWriter::for_capacity(100, 0.001);
    for domain in domains {
        writer.insert(domain);
    }
    AutomaticForgetModeDetector::new(writer.into_filter())
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}
