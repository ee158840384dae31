// # bestipd - bestip Daemon
//
// Thin integration layer: all measurement and DNS logic lives in
// bestip-core and the provider crates.
//
// The bestipd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Setting up logging (stdout, optionally tee'd to a file)
// 3. Building the executor, provider and engine
// 4. Running one pass, or repeating passes until SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### DNS Provider
// - `BESTIP_PROVIDER_TYPE`: Provider type (dnspod)
// - `BESTIP_PROVIDER_SECRET_ID` / `BESTIP_PROVIDER_SECRET_KEY`: API key pair
//
// ### Record
// - `BESTIP_DOMAIN`: Main domain (e.g. example.com)
// - `BESTIP_SUBDOMAIN`: Subdomain (default: @)
//
// ### Measurement
// - `BESTIP_CFST_BIN`: Measurement binary (default: ./cfst)
// - `BESTIP_IPV4_FILE` / `BESTIP_IPV6_FILE`: Candidate pools (IPv6 unset = disabled)
// - `BESTIP_OUTPUT_V4` / `BESTIP_OUTPUT_V6`: Report paths
// - `BESTIP_SAMPLE_COUNT`, `BESTIP_MAX_LATENCY_MS`, `BESTIP_DOWNLOAD_TEST_COUNT`
// - `BESTIP_DOWNLOAD_URL`: Throughput-test URL override
// - `BESTIP_RUN_TIMEOUT_SECS`: Upper bound for one tool run
// - `BESTIP_VERBOSE`: Tool debug output and configuration dump
//
// ### Daemon
// - `BESTIP_INTERVAL_SECS`: Repeat passes at this interval (unset = single pass)
// - `BESTIP_MODE`: `dry-run` to skip DNS writes
// - `BESTIP_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
// - `BESTIP_LOG_FILE`: Also append log output to this file
//
// ## Example
//
// ```bash
// export BESTIP_PROVIDER_SECRET_ID=AKID...
// export BESTIP_PROVIDER_SECRET_KEY=...
// export BESTIP_DOMAIN=example.com
// export BESTIP_SUBDOMAIN=cf
// export BESTIP_IPV6_FILE=ipv6.txt
//
// bestipd
// ```

use anyhow::{Context, Result};
use bestip_core::config::{
    BestIpConfig, DomainConfig, EngineConfig, MeasurementConfig, ProviderConfig,
};
use bestip_core::{BestIpEngine, DnsProvider, ProcessExecutor, shutdown_signal};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown (or a single pass without failures)
/// - 1: Configuration or startup error
/// - 2: Runtime error (including a single pass with a failed family)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BestIpExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<BestIpExitCode> for ExitCode {
    fn from(code: BestIpExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    provider_type: String,
    provider_secret_id: String,
    provider_secret_key: String,
    domain: String,
    subdomain: String,
    measurement: MeasurementConfig,
    interval_secs: Option<u64>,
    dry_run: bool,
    log_level: String,
    log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let defaults = MeasurementConfig::default();

        let measurement = MeasurementConfig {
            bin_path: env_path("BESTIP_CFST_BIN").unwrap_or(defaults.bin_path),
            ipv4_file: env_path("BESTIP_IPV4_FILE").unwrap_or(defaults.ipv4_file),
            ipv6_file: env_path("BESTIP_IPV6_FILE"),
            output_v4: env_path("BESTIP_OUTPUT_V4").unwrap_or(defaults.output_v4),
            output_v6: env_path("BESTIP_OUTPUT_V6").unwrap_or(defaults.output_v6),
            sample_count: env_parse("BESTIP_SAMPLE_COUNT")?.unwrap_or(defaults.sample_count),
            max_latency_ms: env_parse("BESTIP_MAX_LATENCY_MS")?.unwrap_or(defaults.max_latency_ms),
            download_test_count: env_parse("BESTIP_DOWNLOAD_TEST_COUNT")?
                .unwrap_or(defaults.download_test_count),
            download_url: env_non_empty("BESTIP_DOWNLOAD_URL"),
            verbose: env_flag("BESTIP_VERBOSE"),
            run_timeout_secs: env_parse("BESTIP_RUN_TIMEOUT_SECS")?
                .unwrap_or(defaults.run_timeout_secs),
        };

        Ok(Self {
            provider_type: env::var("BESTIP_PROVIDER_TYPE").unwrap_or_else(|_| "dnspod".to_string()),
            provider_secret_id: env::var("BESTIP_PROVIDER_SECRET_ID")
                .context("BESTIP_PROVIDER_SECRET_ID is required")?,
            provider_secret_key: env::var("BESTIP_PROVIDER_SECRET_KEY")
                .context("BESTIP_PROVIDER_SECRET_KEY is required")?,
            domain: env::var("BESTIP_DOMAIN").context("BESTIP_DOMAIN is required")?,
            subdomain: env::var("BESTIP_SUBDOMAIN").unwrap_or_else(|_| "@".to_string()),
            measurement,
            interval_secs: env_parse("BESTIP_INTERVAL_SECS")?,
            dry_run: env::var("BESTIP_MODE")
                .unwrap_or_default()
                .eq_ignore_ascii_case("dry-run"),
            log_level: env::var("BESTIP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_file: env_path("BESTIP_LOG_FILE"),
        })
    }

    /// Validate the configuration
    ///
    /// Checks what the core config cannot: provider type, domain syntax,
    /// numeric ranges and the log level. Core invariants are checked again
    /// by [`BestIpConfig::validate`].
    fn validate(&self) -> Result<()> {
        match self.provider_type.as_str() {
            "dnspod" => {}
            _ => anyhow::bail!(
                "BESTIP_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: dnspod",
                self.provider_type
            ),
        }

        if self.provider_secret_id.is_empty() || self.provider_secret_key.is_empty() {
            anyhow::bail!(
                "BESTIP_PROVIDER_SECRET_ID and BESTIP_PROVIDER_SECRET_KEY are required. \
                Create an API key pair in the Tencent Cloud console."
            );
        }

        // Check for obvious placeholder secrets (common mistake)
        for secret in [&self.provider_secret_id, &self.provider_secret_key] {
            let lower = secret.to_lowercase();
            if lower.contains("your_secret") || lower.contains("replace_me") {
                anyhow::bail!(
                    "BESTIP_PROVIDER_SECRET_* appears to be a placeholder. \
                    Use the actual key pair from your DNS provider."
                );
            }
        }

        validate_domain_name(&self.domain)?;
        validate_subdomain(&self.subdomain)?;

        if !(1..=1000).contains(&self.measurement.sample_count) {
            anyhow::bail!(
                "BESTIP_SAMPLE_COUNT must be between 1 and 1000. Got: {}",
                self.measurement.sample_count
            );
        }

        if !(1..=3600).contains(&self.measurement.run_timeout_secs) {
            anyhow::bail!(
                "BESTIP_RUN_TIMEOUT_SECS must be between 1 and 3600 seconds. Got: {}",
                self.measurement.run_timeout_secs
            );
        }

        if let Some(interval) = self.interval_secs
            && !(60..=86400).contains(&interval)
        {
            anyhow::bail!(
                "BESTIP_INTERVAL_SECS must be between 60 and 86400 seconds. Got: {}",
                interval
            );
        }

        if let Some(ref url) = self.measurement.download_url
            && url.starts_with("http://")
        {
            eprintln!(
                "WARNING: BESTIP_DOWNLOAD_URL uses HTTP (not HTTPS). \
                Some networks rewrite plain HTTP downloads."
            );
        }

        if let Some(ref path) = self.log_file
            && let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "BESTIP_LOG_FILE parent directory does not exist: {}",
                parent.display()
            );
        }

        parse_log_level(&self.log_level)?;

        Ok(())
    }

    /// Assemble the core configuration
    fn to_bestip_config(&self) -> BestIpConfig {
        BestIpConfig {
            provider: ProviderConfig::Dnspod {
                secret_id: self.provider_secret_id.clone(),
                secret_key: self.provider_secret_key.clone(),
                endpoint: None,
            },
            domain: DomainConfig::new(self.domain.clone(), self.subdomain.clone()),
            measurement: self.measurement.clone(),
            engine: EngineConfig::default(),
        }
    }

    /// Log the effective configuration, never the secrets
    fn log_summary(&self) {
        info!("[Debug Configuration]");
        info!("Target record: {}.{}", self.subdomain, self.domain);
        info!("Measurement binary: {}", self.measurement.bin_path.display());
        let v6_pool = self
            .measurement
            .ipv6_file
            .as_ref()
            .map_or_else(|| "(disabled)".to_string(), |p| p.display().to_string());
        info!(
            "Pools: v4 {}, v6 {}",
            self.measurement.ipv4_file.display(),
            v6_pool
        );
        info!(
            "Reports: v4 {}, v6 {}",
            self.measurement.output_v4.display(),
            self.measurement.output_v6.display()
        );
        info!(
            "Samples: {}, max latency: {} ms, throughput tests: {}",
            self.measurement.sample_count,
            self.measurement.max_latency_ms,
            self.measurement.effective_download_test_count()
        );
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_non_empty(name).map(PathBuf::from)
}

fn env_flag(name: &str) -> bool {
    env_non_empty(name).is_some_and(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_non_empty(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} must be a number. Got '{}': {}", name, raw, e)),
        None => Ok(None),
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "BESTIP_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; catches common errors, not every invalid name.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        validate_label(domain, label)?;
    }

    Ok(())
}

/// Validate a subdomain: "@" for the apex, "*" allowed as the first label
fn validate_subdomain(subdomain: &str) -> Result<()> {
    if subdomain == "@" {
        return Ok(());
    }
    if subdomain.is_empty() {
        anyhow::bail!("BESTIP_SUBDOMAIN cannot be empty (use \"@\" for the apex)");
    }

    let mut labels = subdomain.split('.');
    if subdomain.starts_with("*.") || subdomain == "*" {
        labels.next();
    }
    for label in labels {
        validate_label(subdomain, label)?;
    }

    Ok(())
}

fn validate_label(name: &str, label: &str) -> Result<()> {
    if label.is_empty() {
        anyhow::bail!("Domain name has empty label: '{}'", name);
    }

    if label.len() > 63 {
        anyhow::bail!(
            "Domain label too long: {} chars (max 63). Label: '{}'",
            label.len(),
            label
        );
    }

    if !label.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        anyhow::bail!(
            "Domain label contains invalid characters. Label: '{}'. \
            Valid: alphanumeric, hyphen and underscore only.",
            label
        );
    }

    if label.starts_with('-') || label.ends_with('-') {
        anyhow::bail!(
            "Domain label cannot start or end with hyphen. Label: '{}'",
            label
        );
    }

    Ok(())
}

/// Install the global tracing subscriber
fn init_logging(level: Level, log_file: Option<&PathBuf>) -> Result<()> {
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(std::io::stdout.and(Mutex::new(file)))
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        None => {
            let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return BestIpExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return BestIpExitCode::ConfigError.into();
    }

    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    if let Err(e) = init_logging(log_level, config.log_file.as_ref()) {
        eprintln!("Failed to set up logging: {:#}", e);
        return BestIpExitCode::ConfigError.into();
    }

    info!("Starting bestipd daemon");
    if config.measurement.verbose {
        config.log_summary();
    }

    // Passes are strictly sequential; a single thread is enough
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return BestIpExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                BestIpExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Build the DNS provider for the configured type
#[cfg(feature = "dnspod")]
fn build_provider(config: &ProviderConfig, dry_run: bool) -> Result<Box<dyn DnsProvider>> {
    let provider = bestip_provider_dnspod::DnspodProvider::from_config(config, dry_run)?;
    Ok(Box::new(provider))
}

#[cfg(not(feature = "dnspod"))]
fn build_provider(config: &ProviderConfig, _dry_run: bool) -> Result<Box<dyn DnsProvider>> {
    anyhow::bail!(
        "Provider '{}' is not compiled in. Rebuild with --features dnspod",
        config.type_name()
    )
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<BestIpExitCode> {
    let bestip_config = config.to_bestip_config();

    let provider = match build_provider(&bestip_config.provider, config.dry_run) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to create DNS provider: {:#}", e);
            return Ok(BestIpExitCode::ConfigError);
        }
    };

    let executor = ProcessExecutor::new(
        bestip_config.measurement.bin_path.clone(),
        Duration::from_secs(bestip_config.measurement.run_timeout_secs),
    );

    let (engine, mut events) =
        match BestIpEngine::new(Box::new(executor), provider, bestip_config) {
            Ok(pair) => pair,
            Err(e) => {
                error!("Invalid configuration: {}", e);
                return Ok(BestIpExitCode::ConfigError);
            }
        };

    // Drain engine events so the channel never fills up
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!("Engine event: {:?}", event);
        }
    });

    let Some(interval) = config.interval_secs else {
        let summary = engine.run_pass().await;
        info!("------------------------------------------------");
        summary.log();

        return Ok(if summary.failed() > 0 {
            BestIpExitCode::RuntimeError
        } else {
            BestIpExitCode::CleanShutdown
        });
    };

    info!("Running a pass every {}s until SIGTERM/SIGINT", interval);

    let passes = engine
        .run_periodic_with_shutdown(Duration::from_secs(interval), async {
            match wait_for_shutdown().await {
                Ok(signal) => info!("Received shutdown signal: {}", signal),
                Err(e) => {
                    warn!("{}; falling back to Ctrl-C only", e);
                    shutdown_signal(tokio::signal::ctrl_c()).await;
                }
            }
        })
        .await;

    info!("Shutting down daemon after {} pass(es)", passes);
    Ok(BestIpExitCode::CleanShutdown)
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
