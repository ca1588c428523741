//! fOS Navigation Interceptor
//!
//! Gates page loads on domain classification:
//! - Anti-phishing: remote blocklist, result usually arrives after the
//!   page started loading (post-factum)
//! - Automatic forget mode: local Bloom filter, answered immediately
//!
//! Late results are delivered on the [`MainQueue`] so the UI can react.

mod anti_phishing;
mod config;
mod feature;
mod forget_mode;
mod interceptor;
mod main_queue;
mod policy;

#[cfg(test)]
mod testing;

pub use anti_phishing::AntiPhishingPolicy;
pub use config::{ConfigError, InterceptorConfig, NetworkSettings};
pub use feature::{
    AlertChoice, AntiPhishingAlert, InterceptorFeature, InterceptorUi, TabAction,
    ANTI_PHISHING_BACK, ANTI_PHISHING_CONTINUE, ANTI_PHISHING_TITLE,
};
pub use forget_mode::AutomaticForgetModePolicy;
pub use interceptor::{
    Interceptor, InterceptorDelegate, NavigationDecision, NavigationStats, TabContext, TabId,
};
pub use main_queue::{MainQueue, MainTask};
pub use policy::{InterceptorPolicy, InterceptorType, PolicyHandle, PostFactumCallback};
