//! Anti-Phishing Detector
//!
//! Checks hosts against a remote blocklist without revealing them:
//! only the first half of the host's MD5 digest is sent, and the server
//! answers with every suffix sharing that prefix. The match happens locally.
//!
//! Flow:
//! 1. Host already confirmed this session → `true` synchronously
//! 2. Otherwise → `false` synchronously, scan spawned in the background
//! 3. Scan result delivered once through the completion
//!
//! Every failure resolves to "not phishing" so navigation is never stranded.

use crate::client::{HttpClient, HttpError};
use crate::domain::is_local_host;
use crate::hash::DomainHash;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use url::Url;

/// Blocklist endpoint; the digest prefix is appended
pub const DEFAULT_ANTI_PHISHING_ENDPOINT: &str = "https://antiphishing.cliqz.com/api/bwlist?md5=";

/// Errors while querying the blocklist
#[derive(Debug, Error)]
pub enum PhishingLookupError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of blocklist candidates for a digest prefix
#[async_trait]
pub trait BlocklistLookup: Send + Sync {
    /// Suffixes of every listed digest starting with `md5_prefix`
    async fn candidate_suffixes(&self, md5_prefix: &str) -> Result<Vec<String>, PhishingLookupError>;
}

/// Wire format: `{"blacklist": [["<suffix>", ...], ...]}`
#[derive(Debug, Deserialize)]
struct BlocklistResponse {
    #[serde(default)]
    blacklist: Vec<serde_json::Value>,
}

impl BlocklistResponse {
    fn into_suffixes(self) -> Vec<String> {
        self.blacklist
            .into_iter()
            .filter_map(|entry| match entry {
                serde_json::Value::Array(mut tuple) if !tuple.is_empty() => match tuple.swap_remove(0) {
                    serde_json::Value::String(suffix) => Some(suffix),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }
}

/// Blocklist served over HTTP
#[derive(Debug)]
pub struct HttpBlocklist {
    client: HttpClient,
    endpoint: String,
}

impl HttpBlocklist {
    /// Create a lookup against `endpoint` (prefix is appended verbatim)
    pub fn new(client: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Create a lookup against the default endpoint
    pub fn with_client(client: HttpClient) -> Self {
        Self::new(client, DEFAULT_ANTI_PHISHING_ENDPOINT)
    }
}

#[async_trait]
impl BlocklistLookup for HttpBlocklist {
    async fn candidate_suffixes(&self, md5_prefix: &str) -> Result<Vec<String>, PhishingLookupError> {
        let url = format!("{}{}", self.endpoint, md5_prefix);
        let response = self.client.get(&url).await?;

        debug!(
            "Blocklist answered {} for prefix {} in {:?}",
            response.status, md5_prefix, response.total_time
        );
        if !response.is_success() {
            return Err(PhishingLookupError::Status(response.status.as_u16()));
        }

        let parsed: BlocklistResponse = serde_json::from_slice(&response.body)?;
        Ok(parsed.into_suffixes())
    }
}

/// Shared detector state
struct DetectorState {
    /// Remote candidate source
    lookup: Arc<dyn BlocklistLookup>,
    /// URLs confirmed phishing this session
    detected: RwLock<HashSet<Url>>,
    /// Scans spawned whose completion has not returned yet
    in_flight: AtomicUsize,
}

impl DetectorState {
    fn is_detected(&self, url: &Url) -> bool {
        self.detected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    async fn scan_url(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };

        let hash = DomainHash::of(host);
        let md5_prefix = hash.lookup_prefix();
        let md5_suffix = hash.lookup_suffix();

        debug!("Scanning {} (prefix {})", host, md5_prefix);

        let candidates = match self.lookup.candidate_suffixes(&md5_prefix).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Anti-phishing lookup for {} failed: {}", host, e);
                return false;
            }
        };

        if !candidates.iter().any(|candidate| *candidate == md5_suffix) {
            return false;
        }

        self.detected
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone());
        info!("Phishing URL detected: {}", url);
        true
    }
}

/// Cached, asynchronous phishing classifier
#[derive(Clone)]
pub struct AntiPhishingDetector {
    state: Arc<DetectorState>,
    runtime: Handle,
}

impl AntiPhishingDetector {
    /// Create a detector spawning scans on `runtime`
    pub fn new(lookup: Arc<dyn BlocklistLookup>, runtime: Handle) -> Self {
        Self {
            state: Arc::new(DetectorState {
                lookup,
                detected: RwLock::new(HashSet::new()),
                in_flight: AtomicUsize::new(0),
            }),
            runtime,
        }
    }

    /// Check `url` in two phases.
    ///
    /// Returns `true` only when the URL was already confirmed earlier; the
    /// completion is not called in that case. Otherwise returns `false`
    /// ("not known yet") and calls `completion` once with the scan result
    /// from a background task. Local hosts complete with `false` before
    /// returning, without any lookup.
    pub fn is_phishing_url<F>(&self, url: &Url, completion: F) -> bool
    where
        F: FnOnce(bool) + Send + 'static,
    {
        if is_local_host(url) {
            completion(false);
            return false;
        }

        if self.state.is_detected(url) {
            debug!("Phishing cache hit: {}", url);
            return true;
        }

        let state = Arc::clone(&self.state);
        let url = url.clone();
        state.in_flight.fetch_add(1, Ordering::SeqCst);
        self.runtime.spawn(async move {
            let is_phishing = state.scan_url(&url).await;
            completion(is_phishing);
            state.in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        false
    }

    /// Whether `url` was confirmed phishing this session
    pub fn is_detected_phishing_url(&self, url: &Url) -> bool {
        self.state.is_detected(url)
    }

    /// Background scans still running, completions included
    pub fn pending_scans(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Number of confirmed URLs
    pub fn detected_count(&self) -> usize {
        self.state
            .detected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for AntiPhishingDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AntiPhishingDetector")
            .field("detected", &self.detected_count())
            .field("pending_scans", &self.pending_scans())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{oneshot, Notify};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Lookup answering from a fixed list, counting calls
    struct StubLookup {
        suffixes: Vec<String>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubLookup {
        fn listing(hosts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                suffixes: hosts.iter().map(|h| DomainHash::of(h).lookup_suffix()).collect(),
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                suffixes: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BlocklistLookup for StubLookup {
        async fn candidate_suffixes(&self, _md5_prefix: &str) -> Result<Vec<String>, PhishingLookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PhishingLookupError::Status(503));
            }
            Ok(self.suffixes.clone())
        }
    }

    /// Lookup that answers "not listed" once released
    struct GatedLookup {
        gate: Notify,
    }

    #[async_trait]
    impl BlocklistLookup for GatedLookup {
        async fn candidate_suffixes(&self, _md5_prefix: &str) -> Result<Vec<String>, PhishingLookupError> {
            self.gate.notified().await;
            Ok(Vec::new())
        }
    }

    async fn check(detector: &AntiPhishingDetector, url: &Url) -> (bool, bool) {
        let (tx, rx) = oneshot::channel();
        let sync = detector.is_phishing_url(url, move |result| {
            let _ = tx.send(result);
        });
        (sync, rx.await.unwrap())
    }

    #[tokio::test]
    async fn test_detects_and_caches() {
        let lookup = StubLookup::listing(&["evil.example"]);
        let detector = AntiPhishingDetector::new(lookup.clone(), Handle::current());
        let url = Url::parse("https://evil.example/login").unwrap();

        let (sync, async_result) = check(&detector, &url).await;
        assert!(!sync);
        assert!(async_result);
        assert!(detector.is_detected_phishing_url(&url));

        // Second check is answered from the cache
        assert!(detector.is_phishing_url(&url, |_| panic!("completion on cache hit")));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unlisted_host() {
        let lookup = StubLookup::listing(&["evil.example"]);
        let detector = AntiPhishingDetector::new(lookup.clone(), Handle::current());
        let url = Url::parse("https://good.example/").unwrap();

        assert_eq!(check(&detector, &url).await, (false, false));
        assert_eq!(detector.detected_count(), 0);

        // Negative results are not cached
        check(&detector, &url).await;
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_local_hosts_bypass_lookup() {
        let lookup = StubLookup::listing(&["localhost", "local"]);
        let detector = AntiPhishingDetector::new(lookup.clone(), Handle::current());

        for url in ["http://localhost:8080/", "http://local/"] {
            let url = Url::parse(url).unwrap();
            assert_eq!(check(&detector, &url).await, (false, false));
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_open() {
        let lookup = StubLookup::failing();
        let detector = AntiPhishingDetector::new(lookup.clone(), Handle::current());
        let url = Url::parse("https://evil.example/").unwrap();

        assert_eq!(check(&detector, &url).await, (false, false));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hostless_url() {
        let lookup = StubLookup::listing(&[]);
        let detector = AntiPhishingDetector::new(lookup.clone(), Handle::current());
        let url = Url::parse("data:text/plain,hello").unwrap();

        assert_eq!(check(&detector, &url).await, (false, false));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pending_scans() {
        let lookup = Arc::new(GatedLookup { gate: Notify::new() });
        let detector = AntiPhishingDetector::new(lookup.clone(), Handle::current());

        detector.is_phishing_url(&Url::parse("http://localhost/").unwrap(), |_| {});
        assert_eq!(detector.pending_scans(), 0);

        let (tx, rx) = oneshot::channel();
        let url = Url::parse("https://slow.example/").unwrap();
        assert!(!detector.is_phishing_url(&url, move |result| {
            let _ = tx.send(result);
        }));
        assert_eq!(detector.pending_scans(), 1);

        lookup.gate.notify_one();
        assert!(!rx.await.unwrap());
        while detector.pending_scans() != 0 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"blacklist": [["aaaa", 1], ["bbbb"], "junk", [], [42]]}"#;
        let parsed: BlocklistResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_suffixes(), vec!["aaaa", "bbbb"]);

        let parsed: BlocklistResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.into_suffixes().is_empty());
    }

    #[tokio::test]
    async fn test_http_blocklist() {
        let hash = DomainHash::of("evil.example");
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/bwlist"))
            .and(query_param("md5", hash.lookup_prefix().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "blacklist": [["0000000000000000", 0], [hash.lookup_suffix(), 1]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = format!("{}/api/bwlist?md5=", server.uri());
        let lookup = Arc::new(HttpBlocklist::new(HttpClient::with_defaults(), endpoint));
        let detector = AntiPhishingDetector::new(lookup, Handle::current());
        let url = Url::parse("https://evil.example/").unwrap();

        assert_eq!(check(&detector, &url).await, (false, true));
    }

    #[tokio::test]
    async fn test_http_blocklist_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let lookup = HttpBlocklist::new(
            HttpClient::with_defaults(),
            format!("{}/api/bwlist?md5=", server.uri()),
        );
        let result = lookup.candidate_suffixes("0123456789abcdef").await;

        assert!(matches!(result, Err(PhishingLookupError::Status(500))));
    }
}
