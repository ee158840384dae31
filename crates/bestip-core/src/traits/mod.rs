//! Core traits for the bestip system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`MeasurementExecutor`]: Run the external measurement tool
//! - [`DnsProvider`]: List, create and update DNS records via provider APIs

pub mod dns_provider;
pub mod executor;

pub use dns_provider::{DnsProvider, DnsRecord, RecordId, RecordQuery};
pub use executor::{ExecutionOutput, Invocation, MeasurementExecutor};
