//! Interceptor feature wiring and UI contract.
//!
//! Builds the configured policies, registers them, and turns flagged URLs
//! into requests for the UI layer. Rendering stays with the UI; this module
//! only defines what it is asked to show and what each choice does.

use crate::anti_phishing::AntiPhishingPolicy;
use crate::config::InterceptorConfig;
use crate::forget_mode::AutomaticForgetModePolicy;
use crate::interceptor::{Interceptor, InterceptorDelegate, TabContext, TabId};
use crate::main_queue::MainQueue;
use crate::policy::{InterceptorType, PolicyHandle};
use fos_network::{
    normalized_host, AntiPhishingDetector, AutomaticForgetModeDetector, HttpBlocklist, HttpClient,
};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info};
use url::Url;

/// Product name shown in warnings
const APP_NAME: &str = "fOS-WB";

pub const ANTI_PHISHING_TITLE: &str = "Warning: deceptive website!";
pub const ANTI_PHISHING_BACK: &str = "Back to safe site";
pub const ANTI_PHISHING_CONTINUE: &str = "Continue despite warning";

/// Button pressed on the phishing warning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertChoice {
    BackToSafeSite,
    ContinueDespiteWarning,
}

/// What the tab should do after the warning is dismissed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabAction {
    /// Navigate back in history
    GoBack,
    /// Load this URL again (it is allow-listed once)
    Reload(Url),
    /// Leave the tab alone
    None,
}

/// Phishing warning for a flagged URL
#[derive(Debug, Clone)]
pub struct AntiPhishingAlert {
    url: Url,
    policy: PolicyHandle,
    message: String,
}

impl AntiPhishingAlert {
    pub fn new(url: Url, policy: PolicyHandle) -> Self {
        let domain = normalized_host(&url).unwrap_or_default();
        let message = format!(
            "{} has blocked access to {} because it has been reported as a phishing website. \
             Phishing websites disguise as other sites you may trust in order to trick you into \
             disclosing your login, password or other sensitive information",
            APP_NAME, domain
        );
        Self { url, policy, message }
    }

    pub fn title(&self) -> &str {
        ANTI_PHISHING_TITLE
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Flagged URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Apply the user's choice.
    ///
    /// Going back only makes sense while the tab still shows the flagged
    /// page; the user may have navigated away before the warning appeared.
    pub fn resolve(&self, choice: AlertChoice, current_tab_url: Option<&Url>) -> TabAction {
        match choice {
            AlertChoice::BackToSafeSite if current_tab_url == Some(&self.url) => TabAction::GoBack,
            AlertChoice::BackToSafeSite => TabAction::None,
            AlertChoice::ContinueDespiteWarning => {
                self.policy.allow_list_url(&self.url);
                TabAction::Reload(self.url.clone())
            }
        }
    }
}

/// Presentation layer reacting to interceptions
pub trait InterceptorUi: Send + Sync {
    /// Stop the page currently loading in `tab`
    fn stop_loading(&self, tab: TabId);

    /// Present the phishing warning
    fn show_anti_phishing_alert(&self, tab: TabContext, alert: AntiPhishingAlert);

    /// Reopen `url` in a tab that keeps no history
    fn open_in_forget_mode(&self, tab: TabContext, url: &Url);
}

/// Owns the interceptor and routes its reports to the UI
pub struct InterceptorFeature {
    interceptor: Interceptor,
    ui: Arc<dyn InterceptorUi>,
    /// Registered phishing detector, for tracking background scans
    anti_phishing: Option<AntiPhishingDetector>,
}

impl InterceptorFeature {
    /// Build and register the policies enabled in `config`.
    ///
    /// Background scans run on `runtime`; late results reach the UI
    /// through `main_queue`.
    pub fn new(
        config: &InterceptorConfig,
        runtime: Handle,
        main_queue: MainQueue,
        ui: Arc<dyn InterceptorUi>,
    ) -> Arc<Self> {
        let interceptor = Interceptor::new();
        let mut anti_phishing = None;

        if config.anti_phishing_enabled {
            let client = HttpClient::new(config.network.http_client_config());
            let lookup = Arc::new(HttpBlocklist::new(client, config.anti_phishing_endpoint.clone()));
            let detector = AntiPhishingDetector::new(lookup, runtime);
            anti_phishing = Some(detector.clone());
            interceptor.register(Arc::new(AntiPhishingPolicy::new(detector, main_queue)));
        }

        if config.automatic_forget_mode_enabled {
            let detector = AutomaticForgetModeDetector::load(&config.forget_mode_filter_path);
            interceptor.register(Arc::new(AutomaticForgetModePolicy::new(detector)));
        }

        info!("Interceptor ready with policies {:?}", interceptor.policy_types());
        Self::assemble(interceptor, ui, anti_phishing)
    }

    /// Wrap an already populated interceptor
    pub fn with_interceptor(interceptor: Interceptor, ui: Arc<dyn InterceptorUi>) -> Arc<Self> {
        Self::assemble(interceptor, ui, None)
    }

    fn assemble(
        interceptor: Interceptor,
        ui: Arc<dyn InterceptorUi>,
        anti_phishing: Option<AntiPhishingDetector>,
    ) -> Arc<Self> {
        let feature = Arc::new(Self {
            interceptor,
            ui,
            anti_phishing,
        });
        let delegate: Weak<dyn InterceptorDelegate> = Arc::downgrade(&feature) as Weak<dyn InterceptorDelegate>;
        feature.interceptor.set_delegate(delegate);
        feature
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// Phishing scans started by [`InterceptorFeature::new`] still running.
    ///
    /// A scan that flags its URL has already posted the report to the main
    /// queue by the time it stops counting here.
    pub fn pending_scans(&self) -> usize {
        self.anti_phishing
            .as_ref()
            .map_or(0, AntiPhishingDetector::pending_scans)
    }
}

impl InterceptorDelegate for InterceptorFeature {
    fn intercept(&self, tab: TabContext, url: &Url, policy: PolicyHandle) {
        match policy.policy_type() {
            InterceptorType::Phishing => {
                self.ui.stop_loading(tab.id);
                self.ui
                    .show_anti_phishing_alert(tab, AntiPhishingAlert::new(url.clone(), policy));
            }
            InterceptorType::AutomaticForgetMode => {
                self.ui.open_in_forget_mode(tab, url);
            }
            InterceptorType::Tracking => {
                debug!("No UI for tracking interception of {}", url);
            }
        }
    }
}
