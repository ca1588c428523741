//! Navigation Interceptor
//!
//! Consulted on the navigation-decision path, before a page starts loading.
//! The decision must come back immediately, so every registered policy
//! answers synchronously and reports late results through its delegate.
//!
//! Flow:
//! 1. Navigation comes in with a URL (none → cancel)
//! 2. Policies consulted in registration order
//! 3. First policy returning `false` → cancel, later policies skipped
//! 4. Otherwise → allow; background checks may still call the delegate

use crate::policy::{InterceptorType, PolicyHandle, PostFactumCallback};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, trace};
use url::Url;

/// Unique identifier for a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tab({})", self.0)
    }
}

/// Tab a navigation happens in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabContext {
    pub id: TabId,
    /// Private tabs already forget everything
    pub is_private: bool,
}

impl TabContext {
    pub fn new(id: u64, is_private: bool) -> Self {
        Self {
            id: TabId(id),
            is_private,
        }
    }
}

/// Outcome of a navigation decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Let the page load
    Allow,
    /// Stop the navigation
    Cancel,
}

/// Receives URLs flagged by a policy
pub trait InterceptorDelegate: Send + Sync {
    fn intercept(&self, tab: TabContext, url: &Url, policy: PolicyHandle);
}

/// Decision statistics
#[derive(Debug, Default)]
pub struct NavigationStats {
    pub decisions: AtomicU64,
    pub cancelled: AtomicU64,
    pub intercepted: AtomicU64,
    pub suppressed: AtomicU64,
}

/// Runs navigations through the registered policies
#[derive(Default)]
pub struct Interceptor {
    policies: RwLock<Vec<PolicyHandle>>,
    delegate: RwLock<Option<Weak<dyn InterceptorDelegate>>>,
    stats: Arc<NavigationStats>,
}

impl Interceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy; consulted after those registered before it
    pub fn register(&self, policy: PolicyHandle) {
        debug!("Registered {} policy", policy.policy_type());
        self.policies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(policy);
    }

    /// Set the receiver of flagged URLs; held weakly
    pub fn set_delegate(&self, delegate: Weak<dyn InterceptorDelegate>) {
        *self.delegate.write().unwrap_or_else(PoisonError::into_inner) = Some(delegate);
    }

    /// Registered policy types, in order
    pub fn policy_types(&self) -> Vec<InterceptorType> {
        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|policy| policy.policy_type())
            .collect()
    }

    /// Decide whether a navigation in `tab` may proceed
    pub fn decide_policy(&self, tab: TabContext, url: Option<&Url>) -> NavigationDecision {
        self.stats.decisions.fetch_add(1, Ordering::Relaxed);

        let Some(url) = url else {
            self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            return NavigationDecision::Cancel;
        };

        let blocked = Arc::new(AtomicBool::new(false));
        let on_post_factum_check = self.post_factum_callback(tab, blocked.clone());

        // Snapshot so a policy calling back into `register` cannot deadlock
        let policies = self
            .policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for policy in policies {
            if tab.is_private && policy.policy_type() == InterceptorType::AutomaticForgetMode {
                continue;
            }

            if !policy.can_load(url, Some(on_post_factum_check.clone())) {
                blocked.store(true, Ordering::Release);
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!("{} cancelled by {} policy in {}", url, policy.policy_type(), tab.id);
                return NavigationDecision::Cancel;
            }
        }

        NavigationDecision::Allow
    }

    /// Per-decision callback; drops reports once the navigation was cancelled
    fn post_factum_callback(&self, tab: TabContext, blocked: Arc<AtomicBool>) -> PostFactumCallback {
        let delegate = self
            .delegate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let stats = Arc::clone(&self.stats);

        Arc::new(move |url: &Url, policy: PolicyHandle| {
            if blocked.load(Ordering::Acquire) {
                stats.suppressed.fetch_add(1, Ordering::Relaxed);
                trace!("Late {} report for cancelled {} dropped", policy.policy_type(), url);
                return;
            }

            let Some(delegate) = delegate.as_ref().and_then(Weak::upgrade) else {
                return;
            };
            stats.intercepted.fetch_add(1, Ordering::Relaxed);
            delegate.intercept(tab, url, policy);
        })
    }

    /// Get statistics (decisions, cancelled, intercepted, suppressed)
    pub fn stats(&self) -> (u64, u64, u64, u64) {
        (
            self.stats.decisions.load(Ordering::Relaxed),
            self.stats.cancelled.load(Ordering::Relaxed),
            self.stats.intercepted.load(Ordering::Relaxed),
            self.stats.suppressed.load(Ordering::Relaxed),
        )
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("policies", &self.policy_types())
            .finish()
    }
}
