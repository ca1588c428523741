//! fos-guard: navigation interceptor driver
//!
//! Runs URLs through the same policy pipeline the browser uses and builds
//! the forget-mode filter asset from a domain list.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fos_interceptor::{
    AntiPhishingAlert, InterceptorConfig, InterceptorFeature, InterceptorUi, MainQueue,
    NavigationDecision, TabContext, TabId, ANTI_PHISHING_BACK, ANTI_PHISHING_CONTINUE,
};
use fos_network::{registrable_domain, BloomFilterWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use url::Url;

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// How long to block on the main queue before rechecking for idle scans
const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "fos-guard", about = "fOS-WB navigation interceptor")]
struct Cli {
    /// JSON interceptor configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Decide navigations for URLs and report late interceptions
    Check {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Navigate in a private tab
        #[arg(long, default_value_t = false)]
        private: bool,
        /// Enable automatic forget mode regardless of config
        #[arg(long, default_value_t = false)]
        forget_mode: bool,
    },

    /// Build a forget-mode filter asset from a domain list (one per line)
    BuildFilter {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Target false positive rate
        #[arg(long, default_value_t = 0.0001)]
        fp_rate: f64,
    },
}

/// Prints interceptions to stdout
struct ConsoleUi;

impl InterceptorUi for ConsoleUi {
    fn stop_loading(&self, tab: TabId) {
        info!("Stopping {}", tab);
    }

    fn show_anti_phishing_alert(&self, tab: TabContext, alert: AntiPhishingAlert) {
        println!("PHISHING {} ({})", alert.url(), tab.id);
        println!("  {}", alert.title());
        println!("  {}", alert.message());
        println!("  [{}] [{}]", ANTI_PHISHING_BACK, ANTI_PHISHING_CONTINUE);
    }

    fn open_in_forget_mode(&self, tab: TabContext, url: &Url) {
        println!("FORGET   {} ({})", url, tab.id);
    }
}

fn main() -> Result<()> {
    // Initialize logging
    let _subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => InterceptorConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => InterceptorConfig::default(),
    };

    match cli.cmd {
        Cmd::Check {
            urls,
            private,
            forget_mode,
        } => {
            config.automatic_forget_mode_enabled |= forget_mode;
            check(&config, &urls, private).map(|_| ())
        }
        Cmd::BuildFilter {
            input,
            output,
            fp_rate,
        } => build_filter(&input, &output, fp_rate),
    }
}

fn check(
    config: &InterceptorConfig,
    urls: &[String],
    private: bool,
) -> Result<Vec<NavigationDecision>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;

    // This thread plays the UI main thread
    let main_queue = MainQueue::new();
    let feature = InterceptorFeature::new(
        config,
        runtime.handle().clone(),
        main_queue.clone(),
        Arc::new(ConsoleUi),
    );

    let mut decisions = Vec::with_capacity(urls.len());
    for (index, raw) in urls.iter().enumerate() {
        let tab = TabContext::new(index as u64 + 1, private);
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping {}: {}", raw, e);
                continue;
            }
        };

        let decision = feature.interceptor().decide_policy(tab, Some(&url));
        match decision {
            NavigationDecision::Allow => println!("ALLOW    {} ({})", url, tab.id),
            NavigationDecision::Cancel => println!("CANCEL   {} ({})", url, tab.id),
        }
        decisions.push(decision);
    }

    // Late results arrive within one lookup timeout
    let deadline = Instant::now() + config.network.http_client_config().timeout + Duration::from_secs(1);
    if !drain_late_results(&feature, &main_queue, deadline) {
        warn!("Gave up on {} unfinished scans", feature.pending_scans());
    }

    let (total, cancelled, intercepted, _) = feature.interceptor().stats();
    info!(
        "{} decisions, {} cancelled, {} intercepted",
        total, cancelled, intercepted
    );
    Ok(decisions)
}

/// Run late reports until no scan is in flight; false if `deadline` hit first
fn drain_late_results(feature: &InterceptorFeature, main_queue: &MainQueue, deadline: Instant) -> bool {
    loop {
        // Finished scans have already queued their reports
        let idle = feature.pending_scans() == 0;
        main_queue.run_pending();
        if idle {
            return true;
        }

        let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
            return false;
        };
        main_queue.run_next_timeout(remaining.min(IDLE_POLL));
    }
}

/// Filter keys from a domain list, reduced the way lookups reduce hosts
fn read_domains(text: &str) -> Vec<String> {
    let mut domains: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let domain = registrable_domain(line);
            if domain.is_none() {
                warn!("Skipping {}: no registrable domain", line);
            }
            domain
        })
        .collect();

    domains.sort_unstable();
    domains.dedup();
    domains
}

fn build_filter(input: &Path, output: &Path, fp_rate: f64) -> Result<()> {
    if !(fp_rate > 0.0 && fp_rate < 1.0) {
        bail!("fp-rate must be between 0 and 1, got {}", fp_rate);
    }

    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let domains = read_domains(&text);

    if domains.is_empty() {
        bail!("{} contains no domains", input.display());
    }

    let mut writer = BloomFilterWriter::for_capacity(domains.len(), fp_rate);
    for domain in &domains {
        writer.insert(domain);
    }
    writer
        .write_to(output)
        .with_context(|| format!("writing {}", output.display()))?;

    println!("Wrote {} domains to {}", writer.len(), output.display());
    Ok(())
}
