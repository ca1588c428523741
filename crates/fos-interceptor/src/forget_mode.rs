//! Automatic forget mode navigation policy.

use crate::policy::{AllowList, InterceptorPolicy, InterceptorType, PolicyHandle, PostFactumCallback};
use fos_network::AutomaticForgetModeDetector;
use std::sync::Arc;
use tracing::debug;
use url::Url;

struct Inner {
    detector: AutomaticForgetModeDetector,
    allow_list: AllowList,
}

/// Gates navigation to sensitive-content domains.
///
/// The filter lookup is local, so the synchronous answer is final: a match
/// blocks the load and reports it through the callback before returning.
#[derive(Clone)]
pub struct AutomaticForgetModePolicy {
    inner: Arc<Inner>,
}

impl AutomaticForgetModePolicy {
    pub fn new(detector: AutomaticForgetModeDetector) -> Self {
        Self {
            inner: Arc::new(Inner {
                detector,
                allow_list: AllowList::default(),
            }),
        }
    }

    pub fn detector(&self) -> &AutomaticForgetModeDetector {
        &self.inner.detector
    }

    /// Let `url` load normally the next time it is checked
    pub fn whitelist_url(&self, url: &Url) {
        self.allow_list_url(url);
    }

    fn handle(&self) -> PolicyHandle {
        Arc::new(self.clone())
    }
}

impl InterceptorPolicy for AutomaticForgetModePolicy {
    fn policy_type(&self) -> InterceptorType {
        InterceptorType::AutomaticForgetMode
    }

    fn can_load(&self, url: &Url, on_post_factum_check: Option<PostFactumCallback>) -> bool {
        if self.inner.allow_list.take_if_matches(url) {
            debug!("Whitelisted URL consumed: {}", url);
            return true;
        }

        if self.inner.detector.is_automatic_forget_url(url) {
            debug!("Forget-mode domain: {}", url);
            if let Some(callback) = on_post_factum_check {
                callback(url, self.handle());
            }
            return false;
        }

        true
    }

    fn allow_list_url(&self, url: &Url) {
        self.inner.allow_list.set(url);
    }
}
