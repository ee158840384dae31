//! Measurement runner
//!
//! One `run` call covers one IP family:
//!
//! 1. Resolve the candidate pool (a missing IPv6 pool disables IPv6)
//! 2. Remove the previous report so a stale file is never parsed
//! 3. Invoke the measurement tool through the [`MeasurementExecutor`]
//! 4. Parse the report and apply [`select_best`]

use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

use super::report::MeasurementReport;
use super::selection::{SelectionResult, select_best};
use crate::config::{IpFamily, MeasurementConfig};
use crate::error::RunError;
use crate::traits::{Invocation, MeasurementExecutor};

/// Runs the measurement tool and selects the best address
pub struct MeasurementRunner {
    config: MeasurementConfig,
    executor: Box<dyn MeasurementExecutor>,
}

impl MeasurementRunner {
    /// Create a new runner
    pub fn new(config: MeasurementConfig, executor: Box<dyn MeasurementExecutor>) -> Self {
        Self { config, executor }
    }

    /// Measure one family's candidate pool and select an address
    ///
    /// # Returns
    ///
    /// - `Ok(SelectionResult::NoCandidate)`: IPv6 pool not configured or absent
    /// - `Ok(SelectionResult::Address(_))`: an address was selected
    /// - `Err(RunError)`: the run failed; nothing should be applied
    pub async fn run(&self, family: IpFamily) -> Result<SelectionResult, RunError> {
        let Some(pool) = self.config.pool_path(family) else {
            info!("[{}] No candidate pool configured, skipping", family);
            return Ok(SelectionResult::NoCandidate);
        };

        if !path_exists(pool).await {
            return match family {
                IpFamily::V6 => {
                    info!(
                        "[{}] Candidate pool {} not found, skipping",
                        family,
                        pool.display()
                    );
                    Ok(SelectionResult::NoCandidate)
                }
                IpFamily::V4 => Err(RunError::MissingInput {
                    path: pool.to_path_buf(),
                }),
            };
        }

        let output_path = self.config.output_path(family);
        remove_stale_report(output_path).await;

        let invocation = self.invocation(pool, output_path);
        info!("[{}] Running measurement against {}", family, pool.display());
        debug!("[{}] Invocation: {:?}", family, invocation.to_args());

        let execution = self.executor.invoke(&invocation).await?;

        if (self.config.verbose || !execution.success()) && !execution.output.is_empty() {
            let banner = format!(
                "--- Measurement output ({}) ---\n{}\n--- End output ---",
                family,
                execution.output.trim_end()
            );
            if execution.success() {
                info!("{}", banner);
            } else {
                warn!("{}", banner);
            }
        }

        if !execution.success() {
            let reason = match execution.exit_code {
                Some(code) => format!("exited with code {}", code),
                None => "terminated by signal".to_string(),
            };
            return Err(RunError::ExecutionFailed {
                reason,
                exit_code: execution.exit_code,
                output: execution.output,
            });
        }

        let report = MeasurementReport::from_path(output_path).await?;
        debug!(
            "[{}] Report has {} data row(s), {} malformed",
            family,
            report.data_rows(),
            report.malformed_rows()
        );

        select_best(&report).map(SelectionResult::Address)
    }

    fn invocation(&self, pool: &Path, output: &Path) -> Invocation {
        Invocation {
            input: pool.to_path_buf(),
            sample_count: self.config.sample_count,
            output: output.to_path_buf(),
            max_latency_ms: self.config.max_latency_ms,
            download_test_count: self.config.effective_download_test_count(),
            download_url: self.config.download_url.clone(),
            verbose: self.config.verbose,
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Best-effort removal of the previous report
async fn remove_stale_report(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed previous report {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to delete previous report {}: {}",
            path.display(),
            e
        ),
    }
}
