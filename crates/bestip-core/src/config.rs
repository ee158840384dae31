//! Configuration types for the bestip system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Throughput-test cap applied when none (or a non-positive one) is configured
pub const DEFAULT_DOWNLOAD_TEST_COUNT: u32 = 10;

/// Main bestip configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestIpConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Target record
    pub domain: DomainConfig,

    /// Measurement tool settings
    pub measurement: MeasurementConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl BestIpConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.domain.validate()?;
        self.measurement.validate()?;

        if self.engine.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Tencent Cloud DNSPod (API 3.0)
    Dnspod {
        /// SecretId of the API key pair
        secret_id: String,
        /// SecretKey of the API key pair
        secret_key: String,
        /// Endpoint override (defaults to the public DNSPod endpoint)
        #[serde(default)]
        endpoint: Option<String>,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Dnspod {
                secret_id,
                secret_key,
                ..
            } => {
                if secret_id.is_empty() || secret_key.is_empty() {
                    return Err(crate::Error::config(
                        "DNSPod secret_id and secret_key are both required",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Dnspod { .. } => "dnspod",
        }
    }
}

// Secrets stay out of Debug output
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Dnspod { endpoint, .. } => f
                .debug_struct("Dnspod")
                .field("secret_id", &"<REDACTED>")
                .field("secret_key", &"<REDACTED>")
                .field("endpoint", endpoint)
                .finish(),
        }
    }
}

/// The record being kept up to date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Main domain (e.g. "example.com")
    pub domain: String,

    /// Subdomain (e.g. "cf"); "@" addresses the apex
    #[serde(default = "default_subdomain")]
    pub subdomain: String,
}

impl DomainConfig {
    /// Create a new domain configuration
    pub fn new(domain: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            subdomain: subdomain.into(),
        }
    }

    /// Validate the domain configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.domain.is_empty() {
            return Err(crate::Error::config("Main domain cannot be empty"));
        }
        if self.subdomain.is_empty() {
            return Err(crate::Error::config(
                "Subdomain cannot be empty (use \"@\" for the apex)",
            ));
        }
        Ok(())
    }
}

fn default_subdomain() -> String {
    "@".to_string()
}

/// Measurement tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementConfig {
    /// Path to the measurement binary
    #[serde(default = "default_bin_path")]
    pub bin_path: PathBuf,

    /// IPv4 candidate pool
    #[serde(default = "default_ipv4_file")]
    pub ipv4_file: PathBuf,

    /// IPv6 candidate pool (None disables IPv6)
    #[serde(default)]
    pub ipv6_file: Option<PathBuf>,

    /// IPv4 report path
    #[serde(default = "default_output_v4")]
    pub output_v4: PathBuf,

    /// IPv6 report path
    #[serde(default = "default_output_v6")]
    pub output_v6: PathBuf,

    /// Latency samples per candidate
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,

    /// Per-address latency ceiling in milliseconds
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u32,

    /// How many of the fastest candidates get a throughput test
    ///
    /// Zero falls back to [`DEFAULT_DOWNLOAD_TEST_COUNT`]. Larger values
    /// (20-50) raise the chance of finding a candidate with usable throughput.
    #[serde(default)]
    pub download_test_count: u32,

    /// Throughput-test URL override
    #[serde(default)]
    pub download_url: Option<String>,

    /// Pass the debug flag to the tool and always log its output
    #[serde(default)]
    pub verbose: bool,

    /// Upper bound for one whole tool run, in seconds
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
}

impl MeasurementConfig {
    /// Candidate pool for a family, if one is configured
    pub fn pool_path(&self, family: IpFamily) -> Option<&Path> {
        match family {
            IpFamily::V4 => Some(self.ipv4_file.as_path()),
            IpFamily::V6 => self.ipv6_file.as_deref(),
        }
    }

    /// Report path for a family
    pub fn output_path(&self, family: IpFamily) -> &Path {
        match family {
            IpFamily::V4 => &self.output_v4,
            IpFamily::V6 => &self.output_v6,
        }
    }

    /// Throughput-test cap with the default applied
    pub fn effective_download_test_count(&self) -> u32 {
        if self.download_test_count == 0 {
            DEFAULT_DOWNLOAD_TEST_COUNT
        } else {
            self.download_test_count
        }
    }

    /// Validate the measurement configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.bin_path.as_os_str().is_empty() {
            return Err(crate::Error::config("Measurement binary path cannot be empty"));
        }
        if self.output_v4 == self.output_v6 {
            return Err(crate::Error::config(
                "IPv4 and IPv6 report paths must differ",
            ));
        }
        if self.sample_count == 0 {
            return Err(crate::Error::config("Sample count must be > 0"));
        }
        if self.run_timeout_secs == 0 {
            return Err(crate::Error::config("Run timeout must be > 0"));
        }
        if let Some(url) = &self.download_url
            && !url.starts_with("https://")
            && !url.starts_with("http://")
        {
            return Err(crate::Error::config(format!(
                "Download URL must use HTTP or HTTPS scheme. Got: {}",
                url
            )));
        }
        Ok(())
    }
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            bin_path: default_bin_path(),
            ipv4_file: default_ipv4_file(),
            ipv6_file: None,
            output_v4: default_output_v4(),
            output_v6: default_output_v6(),
            sample_count: default_sample_count(),
            max_latency_ms: default_max_latency_ms(),
            download_test_count: 0,
            download_url: None,
            verbose: false,
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

fn default_bin_path() -> PathBuf {
    PathBuf::from("./cfst")
}

fn default_ipv4_file() -> PathBuf {
    PathBuf::from("ip.txt")
}

fn default_output_v4() -> PathBuf {
    PathBuf::from("result_v4.csv")
}

fn default_output_v6() -> PathBuf {
    PathBuf::from("result_v6.csv")
}

fn default_sample_count() -> u32 {
    200
}

fn default_max_latency_ms() -> u32 {
    9999
}

fn default_run_timeout_secs() -> u64 {
    600
}

/// IP family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl IpFamily {
    /// Families in processing order
    pub const ALL: [IpFamily; 2] = [IpFamily::V4, IpFamily::V6];

    /// Record type that carries addresses of this family
    pub fn record_type(self) -> RecordType {
        match self {
            IpFamily::V4 => RecordType::A,
            IpFamily::V6 => RecordType::Aaaa,
        }
    }

    /// Label used in logs
    pub fn label(self) -> &'static str {
        match self {
            IpFamily::V4 => "IPv4",
            IpFamily::V6 => "IPv6",
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    100
}
