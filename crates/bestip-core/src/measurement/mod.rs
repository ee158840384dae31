//! Measurement: run the external tool and pick the best address
//!
//! - [`report`]: typed CSV report parsing
//! - [`selection`]: the selection policy
//! - [`runner`]: per-family run orchestration
//! - [`process`]: subprocess-backed executor

pub mod process;
pub mod report;
pub mod runner;
pub mod selection;

pub use process::ProcessExecutor;
pub use report::{MIN_COLUMNS, MeasurementReport, ReportRow};
pub use runner::MeasurementRunner;
pub use selection::{Selection, SelectionResult, SelectionWarning, select_best};
