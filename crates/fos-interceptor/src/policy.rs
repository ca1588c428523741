//! Interceptor policy contract.
//!
//! A policy answers `can_load` synchronously on the navigation-decision
//! path. When the answer is not known yet it allows the load and reports a
//! later positive result through the post-factum callback.
//!
//! Per evaluation:
//! `Unchecked -> {SyncBlocked | SyncAllowed(pending)} -> {Confirmed | Cleared}`

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

/// Kind of classification a policy performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptorType {
    /// Remote phishing blocklist
    Phishing,
    /// Tracker blocking
    Tracking,
    /// Sensitive-content domains that switch to forget mode
    AutomaticForgetMode,
}

impl fmt::Display for InterceptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phishing => write!(f, "phishing"),
            Self::Tracking => write!(f, "tracking"),
            Self::AutomaticForgetMode => write!(f, "automatic-forget-mode"),
        }
    }
}

/// Shared handle to a registered policy
pub type PolicyHandle = Arc<dyn InterceptorPolicy>;

/// Called with the flagged URL and the policy that flagged it
pub type PostFactumCallback = Arc<dyn Fn(&Url, PolicyHandle) + Send + Sync>;

/// Navigation gate over one classifier
pub trait InterceptorPolicy: Send + Sync {
    /// What this policy classifies
    fn policy_type(&self) -> InterceptorType;

    /// Decide whether `url` may start loading now.
    ///
    /// Returning `false` blocks the navigation; in that case
    /// `on_post_factum_check` has already been called. Returning `true` may
    /// still be followed by a call on the main queue once a background
    /// check confirms the URL.
    fn can_load(&self, url: &Url, on_post_factum_check: Option<PostFactumCallback>) -> bool;

    /// Let `url` through the next `can_load` exactly once
    fn allow_list_url(&self, url: &Url);
}

impl fmt::Debug for dyn InterceptorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorPolicy")
            .field("type", &self.policy_type())
            .finish()
    }
}

/// Single-shot override holding at most one URL
#[derive(Debug, Default)]
pub(crate) struct AllowList {
    url: Mutex<Option<Url>>,
}

impl AllowList {
    /// Replace the entry
    pub(crate) fn set(&self, url: &Url) {
        *self.url.lock().unwrap_or_else(PoisonError::into_inner) = Some(url.clone());
    }

    /// Consume the entry if it equals `url`
    pub(crate) fn take_if_matches(&self, url: &Url) -> bool {
        let mut entry = self.url.lock().unwrap_or_else(PoisonError::into_inner);
        if entry.as_ref() == Some(url) {
            *entry = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn current(&self) -> Option<Url> {
        self.url.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
