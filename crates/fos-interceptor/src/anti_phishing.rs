//! Anti-phishing navigation policy.

use crate::main_queue::MainQueue;
use crate::policy::{AllowList, InterceptorPolicy, InterceptorType, PolicyHandle, PostFactumCallback};
use fos_network::AntiPhishingDetector;
use std::sync::Arc;
use tracing::debug;
use url::Url;

struct Inner {
    detector: AntiPhishingDetector,
    allow_list: AllowList,
    main_queue: MainQueue,
}

/// Gates navigation on the remote phishing blocklist.
///
/// Unknown URLs load immediately; a background confirmation is reported
/// through the post-factum callback on the main queue. URLs confirmed
/// earlier in the session are blocked synchronously.
#[derive(Clone)]
pub struct AntiPhishingPolicy {
    inner: Arc<Inner>,
}

impl AntiPhishingPolicy {
    pub fn new(detector: AntiPhishingDetector, main_queue: MainQueue) -> Self {
        Self {
            inner: Arc::new(Inner {
                detector,
                allow_list: AllowList::default(),
                main_queue,
            }),
        }
    }

    pub fn detector(&self) -> &AntiPhishingDetector {
        &self.inner.detector
    }

    /// Currently allow-listed URL, if any
    pub fn allow_listed_url(&self) -> Option<Url> {
        self.inner.allow_list.current()
    }

    fn handle(&self) -> PolicyHandle {
        Arc::new(self.clone())
    }
}

impl InterceptorPolicy for AntiPhishingPolicy {
    fn policy_type(&self) -> InterceptorType {
        InterceptorType::Phishing
    }

    fn can_load(&self, url: &Url, on_post_factum_check: Option<PostFactumCallback>) -> bool {
        if self.inner.allow_list.take_if_matches(url) {
            debug!("Allow-listed URL consumed: {}", url);
            return true;
        }

        let late_check = on_post_factum_check.clone();
        let main_queue = self.inner.main_queue.clone();
        let flagged = url.clone();
        let handle = self.handle();
        let completion = move |is_phishing: bool| {
            if !is_phishing {
                return;
            }
            if let Some(callback) = late_check {
                main_queue.dispatch(move || callback(&flagged, handle));
            }
        };

        if self.inner.detector.is_phishing_url(url, completion) {
            debug!("Blocking known phishing URL: {}", url);
            if let Some(callback) = on_post_factum_check {
                callback(url, self.handle());
            }
            return false;
        }

        true
    }

    fn allow_list_url(&self, url: &Url) {
        debug!("Allow-listing {}", url);
        self.inner.allow_list.set(url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{phishing_detector, runtime, url};
    use std::sync::Mutex;
    use std::time::Duration;

    type Calls = Arc<Mutex<Vec<(Url, InterceptorType, std::thread::ThreadId)>>>;

    fn recorder() -> (PostFactumCallback, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let callback: PostFactumCallback = Arc::new(move |url: &Url, policy: PolicyHandle| {
            sink.lock()
                .unwrap()
                .push((url.clone(), policy.policy_type(), std::thread::current().id()));
        });
        (callback, calls)
    }

    #[test]
    fn test_post_factum_on_main_queue() {
        let rt = runtime();
        let (detector, _) = phishing_detector(&rt, &["evil.example"]);
        let queue = MainQueue::new();
        let policy = AntiPhishingPolicy::new(detector, queue.clone());
        let (callback, calls) = recorder();
        let target = url("https://evil.example/login");

        // Unknown yet: the load proceeds
        assert!(policy.can_load(&target, Some(callback)));
        assert!(calls.lock().unwrap().is_empty());

        assert!(queue.run_next_timeout(Duration::from_secs(5)));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, target);
        assert_eq!(calls[0].1, InterceptorType::Phishing);
        assert_eq!(calls[0].2, std::thread::current().id());
    }

    #[test]
    fn test_known_phishing_blocks_synchronously() {
        let rt = runtime();
        let (detector, lookup) = phishing_detector(&rt, &["evil.example"]);
        let queue = MainQueue::new();
        let policy = AntiPhishingPolicy::new(detector, queue.clone());
        let target = url("https://evil.example/");

        assert!(policy.can_load(&target, None));
        while !policy.detector().is_detected_phishing_url(&target) {
            std::thread::sleep(Duration::from_millis(5));
        }

        let (callback, calls) = recorder();
        assert!(!policy.can_load(&target, Some(callback)));

        // Delivered before `can_load` returned, not through the queue
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(queue.pending(), 0);
        assert_eq!(lookup.calls(), 1);
    }

    #[test]
    fn test_allow_list_is_single_shot() {
        let rt = runtime();
        let (detector, lookup) = phishing_detector(&rt, &["evil.example"]);
        let policy = AntiPhishingPolicy::new(detector, MainQueue::new());
        let target = url("https://evil.example/");

        assert!(policy.can_load(&target, None));
        while !policy.detector().is_detected_phishing_url(&target) {
            std::thread::sleep(Duration::from_millis(5));
        }

        policy.allow_list_url(&target);
        assert_eq!(policy.allow_listed_url(), Some(target.clone()));

        assert!(policy.can_load(&target, None));
        assert_eq!(policy.allow_listed_url(), None);

        assert!(!policy.can_load(&target, None));
        assert_eq!(lookup.calls(), 1);
    }

    #[test]
    fn test_clean_url_never_calls_back() {
        let rt = runtime();
        let (detector, lookup) = phishing_detector(&rt, &["evil.example"]);
        let queue = MainQueue::new();
        let policy = AntiPhishingPolicy::new(detector, queue.clone());
        let (callback, calls) = recorder();

        assert!(policy.can_load(&url("https://good.example/"), Some(callback)));
        while lookup.calls() == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(!queue.run_next_timeout(Duration::from_millis(100)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_localhost_allowed() {
        let rt = runtime();
        let (detector, lookup) = phishing_detector(&rt, &["localhost"]);
        let policy = AntiPhishingPolicy::new(detector, MainQueue::new());

        assert!(policy.can_load(&url("http://localhost:3000/"), None));
        assert_eq!(lookup.calls(), 0);
    }
}
