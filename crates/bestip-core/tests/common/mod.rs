//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that stand in for the external
//! measurement tool and the DNS provider without spawning processes or
//! touching the network.

#![allow(dead_code)]

use bestip_core::config::{
    BestIpConfig, DomainConfig, EngineConfig, MeasurementConfig, ProviderConfig, RecordType,
};
use bestip_core::error::{Error, Result, RunError};
use bestip_core::traits::{
    DnsProvider, DnsRecord, ExecutionOutput, Invocation, MeasurementExecutor, RecordId,
    RecordQuery,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Report header as the tool writes it
pub const HEADER: &str = "IP 地址,已发送,已接收,丢包率,平均延迟,下载速度 (MB/s)";

/// Build a report from `(address, latency, speed)` rows
pub fn report(rows: &[(&str, f64, f64)]) -> String {
    let mut csv = format!("{}\n", HEADER);
    for (address, latency, speed) in rows {
        csv.push_str(&format!("{},4,4,0.00,{:.2},{:.2}\n", address, latency, speed));
    }
    csv
}

/// What the fake tool does for one report path
#[derive(Debug, Clone)]
pub struct Script {
    /// Exit code to report
    pub exit_code: Option<i32>,
    /// Combined output to report
    pub output: String,
    /// Report to write to the invocation's output path
    pub report: Option<String>,
    /// Fail as if the process could not be launched
    pub launch_error: bool,
}

impl Script {
    /// Exit 0 after writing `report`
    pub fn success(report: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            output: "Testing latency...\n".to_string(),
            report: Some(report.into()),
            launch_error: false,
        }
    }

    /// Exit non-zero without a report
    pub fn exit(code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            output: output.into(),
            report: None,
            launch_error: false,
        }
    }

    /// Fail to launch
    pub fn launch_error() -> Self {
        Self {
            exit_code: None,
            output: String::new(),
            report: None,
            launch_error: true,
        }
    }
}

/// A MeasurementExecutor that writes canned reports instead of spawning a process
pub struct ScriptedExecutor {
    /// Scripts keyed by report path
    scripts: Arc<Mutex<HashMap<PathBuf, Script>>>,
    /// Every invocation received, in order
    invocations: Arc<Mutex<Vec<Invocation>>>,
    /// Whether the report path already existed when the tool was invoked
    stale_report_seen: Arc<Mutex<Vec<bool>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            invocations: Arc::new(Mutex::new(Vec::new())),
            stale_report_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register the script for a report path
    pub fn on_output(&self, output: impl Into<PathBuf>, script: Script) {
        self.scripts.lock().unwrap().insert(output.into(), script);
    }

    /// Number of invocations received
    pub fn invoke_call_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// Invocations received, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Per invocation: whether a report file was already present
    pub fn stale_report_seen(&self) -> Vec<bool> {
        self.stale_report_seen.lock().unwrap().clone()
    }

    /// Create a new ScriptedExecutor that shares state with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            scripts: Arc::clone(&other.scripts),
            invocations: Arc::clone(&other.invocations),
            stale_report_seen: Arc::clone(&other.stale_report_seen),
        }
    }
}

#[async_trait::async_trait]
impl MeasurementExecutor for ScriptedExecutor {
    async fn invoke(&self, invocation: &Invocation) -> std::result::Result<ExecutionOutput, RunError> {
        self.invocations.lock().unwrap().push(invocation.clone());
        self.stale_report_seen
            .lock()
            .unwrap()
            .push(invocation.output.exists());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&invocation.output)
            .cloned()
            .unwrap_or_else(|| Script::exit(1, "no script registered"));

        if script.launch_error {
            return Err(RunError::launch("No such file or directory (os error 2)"));
        }

        if let Some(report) = &script.report {
            std::fs::write(&invocation.output, report).expect("write report");
        }

        Ok(ExecutionOutput {
            exit_code: script.exit_code,
            output: script.output,
        })
    }
}

/// Failure injection for [`RecordingProvider`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    /// Behave normally
    #[default]
    None,
    /// Fail every lookup
    Lookup,
    /// Fail lookups for one record type only
    LookupFor(RecordType),
    /// Fail every create and update with a non-idempotence error
    Apply,
}

/// An in-memory DnsProvider that records calls
///
/// Like DNSPod, an update whose value equals the stored value is rejected
/// with [`Error::ValueUnchanged`].
pub struct RecordingProvider {
    records: Arc<Mutex<Vec<(RecordQuery, DnsRecord)>>>,
    list_call_count: Arc<AtomicUsize>,
    create_call_count: Arc<AtomicUsize>,
    update_call_count: Arc<AtomicUsize>,
    updated_ids: Arc<Mutex<Vec<RecordId>>>,
    lines: Arc<Mutex<Vec<String>>>,
    next_id: Arc<AtomicUsize>,
    fail_mode: Arc<Mutex<FailMode>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            list_call_count: Arc::new(AtomicUsize::new(0)),
            create_call_count: Arc::new(AtomicUsize::new(0)),
            update_call_count: Arc::new(AtomicUsize::new(0)),
            updated_ids: Arc::new(Mutex::new(Vec::new())),
            lines: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicUsize::new(1000)),
            fail_mode: Arc::new(Mutex::new(FailMode::None)),
        }
    }

    /// Pre-populate a record
    pub fn seed(&self, query: &RecordQuery, id: &str, value: &str) {
        self.records.lock().unwrap().push((
            query.clone(),
            DnsRecord {
                id: RecordId::new(id),
                name: query.subdomain.clone(),
                record_type: query.record_type,
                value: value.to_string(),
                line: "默认".to_string(),
            },
        ));
    }

    pub fn set_fail_mode(&self, mode: FailMode) {
        *self.fail_mode.lock().unwrap() = mode;
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    /// Ids passed to update_record, in order
    pub fn updated_ids(&self) -> Vec<RecordId> {
        self.updated_ids.lock().unwrap().clone()
    }

    /// Routing lines passed to create/update, in order
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Stored records matching a query
    pub fn stored(&self, query: &RecordQuery) -> Vec<DnsRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(q, _)| q == query)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Create a new RecordingProvider that shares state with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            records: Arc::clone(&other.records),
            list_call_count: Arc::clone(&other.list_call_count),
            create_call_count: Arc::clone(&other.create_call_count),
            update_call_count: Arc::clone(&other.update_call_count),
            updated_ids: Arc::clone(&other.updated_ids),
            lines: Arc::clone(&other.lines),
            next_id: Arc::clone(&other.next_id),
            fail_mode: Arc::clone(&other.fail_mode),
        }
    }

    fn fail_mode(&self) -> FailMode {
        *self.fail_mode.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn list_records(&self, query: &RecordQuery) -> Result<Vec<DnsRecord>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);

        match self.fail_mode() {
            FailMode::Lookup => return Err(Error::http("connection reset")),
            FailMode::LookupFor(t) if t == query.record_type => {
                return Err(Error::http("connection reset"));
            }
            _ => {}
        }

        Ok(self.stored(query))
    }

    async fn create_record(&self, query: &RecordQuery, line: &str, value: &str) -> Result<DnsRecord> {
        self.create_call_count.fetch_add(1, Ordering::SeqCst);
        self.lines.lock().unwrap().push(line.to_string());

        if self.fail_mode() == FailMode::Apply {
            return Err(Error::provider("recording", "InternalError"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let record = DnsRecord {
            id: RecordId::new(id),
            name: query.subdomain.clone(),
            record_type: query.record_type,
            value: value.to_string(),
            line: line.to_string(),
        };
        self.records
            .lock()
            .unwrap()
            .push((query.clone(), record.clone()));
        Ok(record)
    }

    async fn update_record(
        &self,
        query: &RecordQuery,
        line: &str,
        value: &str,
        record_id: &RecordId,
    ) -> Result<DnsRecord> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        self.updated_ids.lock().unwrap().push(record_id.clone());
        self.lines.lock().unwrap().push(line.to_string());

        if self.fail_mode() == FailMode::Apply {
            return Err(Error::provider("recording", "InternalError"));
        }

        let mut records = self.records.lock().unwrap();
        let (_, record) = records
            .iter_mut()
            .find(|(q, r)| q == query && &r.id == record_id)
            .ok_or_else(|| Error::provider("recording", "record id not found"))?;

        if record.value == value {
            return Err(Error::value_unchanged("recording", "record value unchanged"));
        }

        record.value = value.to_string();
        Ok(record.clone())
    }

    fn default_line(&self) -> &str {
        "默认"
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Measurement config rooted in `dir`
pub fn measurement_config(dir: &Path) -> MeasurementConfig {
    MeasurementConfig {
        bin_path: PathBuf::from("cfst"),
        ipv4_file: dir.join("ip.txt"),
        ipv6_file: Some(dir.join("ipv6.txt")),
        output_v4: dir.join("result_v4.csv"),
        output_v6: dir.join("result_v6.csv"),
        sample_count: 4,
        max_latency_ms: 300,
        download_test_count: 0,
        download_url: None,
        verbose: false,
        run_timeout_secs: 60,
    }
}

/// Write both candidate pools into `dir`
pub fn write_pools(dir: &Path) {
    std::fs::write(dir.join("ip.txt"), "104.16.0.0/13\n172.64.0.0/13\n").unwrap();
    std::fs::write(dir.join("ipv6.txt"), "2606:4700::/32\n").unwrap();
}

/// Helper to create a minimal BestIpConfig for testing
pub fn minimal_config(dir: &Path) -> BestIpConfig {
    BestIpConfig {
        provider: ProviderConfig::Dnspod {
            secret_id: "test-id".to_string(),
            secret_key: "test-key".to_string(),
            endpoint: None,
        },
        domain: DomainConfig::new("example.com", "cf"),
        measurement: measurement_config(dir),
        engine: EngineConfig {
            event_channel_capacity: 100,
        },
    }
}
