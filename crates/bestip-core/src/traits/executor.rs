// # Measurement Executor Trait
//
// Defines the boundary to the external latency/throughput measurement tool.
//
// The tool is a black box: the runner describes one invocation, the executor
// runs it and hands back the exit status together with everything the tool
// printed. Tests substitute an executor that writes a canned report instead
// of spawning a process.
//
// ## Implementations
//
// - [`crate::measurement::ProcessExecutor`]: spawns the CloudflareSpeedTest
//   binary with an outer timeout

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::RunError;

/// One invocation of the measurement tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Candidate pool file (`-f`)
    pub input: PathBuf,
    /// Latency samples per address (`-n`)
    pub sample_count: u32,
    /// Report destination (`-o`)
    pub output: PathBuf,
    /// Per-address latency ceiling in milliseconds (`-tl`)
    pub max_latency_ms: u32,
    /// How many top candidates get the throughput sub-test (`-dn`)
    pub download_test_count: u32,
    /// Throughput-test URL override (`-url`)
    pub download_url: Option<String>,
    /// Ask the tool for debug output (`-debug`)
    pub verbose: bool,
}

impl Invocation {
    /// Render the invocation as command-line arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.input.display().to_string(),
            "-n".to_string(),
            self.sample_count.to_string(),
            "-o".to_string(),
            self.output.display().to_string(),
            "-tl".to_string(),
            self.max_latency_ms.to_string(),
            "-dn".to_string(),
            self.download_test_count.to_string(),
        ];

        if let Some(url) = &self.download_url {
            args.push("-url".to_string());
            args.push(url.clone());
        }

        if self.verbose {
            args.push("-debug".to_string());
        }

        args
    }
}

/// What the tool left behind once it exited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutput {
    /// Exit code (`None` if the process was terminated by a signal)
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr
    pub output: String,
}

impl ExecutionOutput {
    /// Whether the tool reported success
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for running the measurement tool
///
/// Returning `Err` means the tool could not be run at all (launch failure,
/// timeout). A tool that ran and exited non-zero is `Ok` with that exit
/// code; the runner decides what to do with it.
#[async_trait]
pub trait MeasurementExecutor: Send + Sync {
    /// Run one invocation to completion
    async fn invoke(&self, invocation: &Invocation) -> Result<ExecutionOutput, RunError>;
}
