// # bestip-core
//
// Core library for measurement-driven DDNS.
//
// ## Architecture Overview
//
// A pass runs once per IP family (IPv4, then IPv6):
// - **MeasurementExecutor**: Trait for running the external latency/throughput tool
// - **MeasurementRunner**: Invokes the tool and applies the selection policy to its report
// - **DnsProvider**: Trait for listing, creating and updating DNS records
// - **Reconciler**: Idempotent create-or-update of one record
// - **BestIpEngine**: Drives runner and reconciler per family, isolating failures
//
// ## Design Principles
//
// 1. **Tool as black box**: the measurement tool is invoked, never reimplemented
// 2. **Explicit collaborators**: executor and provider are passed in as trait objects
// 3. **Family isolation**: an IPv6 failure never affects the IPv4 outcome
// 4. **Library-First**: all core functionality can be used as a library
// 5. **Idempotency**: reconciling the same value twice leaves the record unchanged

pub mod config;
pub mod engine;
pub mod error;
pub mod measurement;
pub mod reconcile;
pub mod traits;

// Re-export core types for convenience
pub use config::{BestIpConfig, DomainConfig, IpFamily, MeasurementConfig, ProviderConfig, RecordType};
pub use engine::{BestIpEngine, EngineEvent, FamilyOutcome, PassSummary, shutdown_signal};
pub use error::{Error, ReconcileError, Result, RunError};
pub use measurement::{MeasurementRunner, ProcessExecutor, SelectionResult};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use traits::{DnsProvider, MeasurementExecutor};
