//! Selection policy: pick one address from a measurement report
//!
//! Rows arrive ordered by latency. The first row with positive throughput and
//! a non-empty address wins, so a low-latency node that fails the throughput
//! test (blocked test URL, rate limiting) is passed over without giving up
//! latency ordering among the rest.
//!
//! When no row has throughput the first data row is still returned, flagged
//! [`SelectionWarning::AllZeroThroughput`].

use tracing::{info, warn};

use super::report::{MeasurementReport, ReportRow};
use crate::error::RunError;

/// Degraded-but-usable selection classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionWarning {
    /// Every row measured zero throughput; the lowest-latency row was used
    AllZeroThroughput,
}

/// The chosen row
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Selected address
    pub address: String,
    /// The report row it came from
    pub row: ReportRow,
    /// Well-formed rows passed over before the selected one
    pub skipped: usize,
    /// Set when the selection is a fallback
    pub warning: Option<SelectionWarning>,
}

/// Outcome of one measurement run
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionResult {
    /// An address was selected
    Address(Selection),
    /// Nothing to do for this family (feature disabled)
    NoCandidate,
}

impl SelectionResult {
    /// Selected address, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            SelectionResult::Address(selection) => Some(&selection.address),
            SelectionResult::NoCandidate => None,
        }
    }

    /// Warning attached to the selection, if any
    pub fn warning(&self) -> Option<SelectionWarning> {
        match self {
            SelectionResult::Address(selection) => selection.warning,
            SelectionResult::NoCandidate => None,
        }
    }
}

/// Apply the selection policy to a report
pub fn select_best(report: &MeasurementReport) -> Result<Selection, RunError> {
    if report.data_rows() == 0 {
        return Err(RunError::empty("report contains no data rows"));
    }

    let rows = report.rows();

    let winner = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.has_throughput() && !row.address.is_empty());

    if let Some((index, row)) = winner {
        if index > 0 {
            info!(
                "Skipped {} address(es) without usable throughput. Selected: {} (speed: {} MB/s, latency: {} ms)",
                index,
                row.address,
                row.download_speed_mbps,
                row.latency_ms.map_or_else(|| "?".to_string(), |l| l.to_string())
            );
        }

        return Ok(Selection {
            address: row.address.clone(),
            row: row.clone(),
            skipped: index,
            warning: None,
        });
    }

    let first = rows.first().ok_or_else(|| {
        RunError::empty(format!(
            "all {} data row(s) are malformed",
            report.malformed_rows()
        ))
    })?;

    if first.address.is_empty() {
        return Err(RunError::empty("fallback row has an empty address"));
    }

    warn!(
        "All tested addresses measured 0.00 MB/s. Falling back to the lowest-latency one: {}",
        first.address
    );
    warn!("This usually means the throughput-test URL is blocked or timed out");
    warn!("Set a different download URL (BESTIP_DOWNLOAD_URL) to restore throughput testing");

    Ok(Selection {
        address: first.address.clone(),
        row: first.clone(),
        skipped: 0,
        warning: Some(SelectionWarning::AllZeroThroughput),
    })
}
