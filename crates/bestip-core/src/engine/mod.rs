//! Core bestip engine
//!
//! The BestIpEngine is responsible for:
//! - Running the measurement for each IP family
//! - Reconciling the family's record with the selected address
//! - Keeping a failure in one family away from the other
//! - Reporting a per-family summary of every pass
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────┐
//!            │ BestIpEngine │── for V4, then V6 ──┐
//!            └──────────────┘                     │
//!                                                 ▼
//!   ┌───────────────────┐  SelectionResult  ┌────────────┐
//!   │ MeasurementRunner │──────────────────►│ Reconciler │
//!   └───────────────────┘                   └────────────┘
//!            │                                    │
//!            ▼                                    ▼
//!   MeasurementExecutor                      DnsProvider
//! ```
//!
//! ## Pass Flow
//!
//! 1. Run the measurement for the family
//! 2. `NoCandidate` → skip the family
//! 3. Reconcile `(domain, subdomain, A|AAAA)` with the selected address
//! 4. Record the outcome and emit an event
//!
//! Families run strictly one after the other; nothing is shared between them.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{BestIpConfig, DomainConfig, IpFamily};
use crate::error::{ReconcileError, Result, RunError};
use crate::measurement::{MeasurementRunner, SelectionResult, SelectionWarning};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::traits::{DnsProvider, MeasurementExecutor};

/// Pipeline stage a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Running the tool or selecting from its report
    Measurement,
    /// Looking up or writing the DNS record
    Reconciliation,
}

/// Events emitted by the BestIpEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A pass started
    PassStarted {
        /// Families the pass will process
        families: usize,
    },

    /// The measurement selected an address
    SelectionMade {
        family: IpFamily,
        address: String,
        warning: Option<SelectionWarning>,
    },

    /// The record now holds the selected address
    RecordApplied {
        family: IpFamily,
        address: String,
        outcome: ReconcileOutcome,
    },

    /// The family had nothing to do
    FamilySkipped { family: IpFamily, reason: String },

    /// The family failed; the pass continues
    FamilyFailed {
        family: IpFamily,
        stage: Stage,
        error: String,
    },

    /// A pass finished
    PassFinished { updated: usize, failed: usize },

    /// Periodic mode stopped
    Stopped { reason: String },
}

/// Why a family produced no update
#[derive(Debug)]
pub enum FamilyError {
    /// The measurement run failed
    Run(RunError),
    /// The reconciliation failed
    Reconcile(ReconcileError),
}

impl FamilyError {
    /// Stage the failure belongs to
    pub fn stage(&self) -> Stage {
        match self {
            FamilyError::Run(_) => Stage::Measurement,
            FamilyError::Reconcile(_) => Stage::Reconciliation,
        }
    }
}

impl std::fmt::Display for FamilyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FamilyError::Run(e) => write!(f, "{}", e),
            FamilyError::Reconcile(e) => write!(f, "{}", e),
        }
    }
}

/// Outcome of one family within a pass
#[derive(Debug)]
pub enum FamilyOutcome {
    /// The record points at the selected address
    Updated {
        address: String,
        outcome: ReconcileOutcome,
        warning: Option<SelectionWarning>,
    },
    /// Nothing to do
    Skipped { reason: String },
    /// The family failed
    Failed(FamilyError),
}

/// Per-family results of one pass
#[derive(Debug)]
pub struct PassSummary {
    /// When the pass started
    pub started_at: DateTime<Utc>,
    /// When the pass finished
    pub finished_at: DateTime<Utc>,
    /// Outcomes in processing order
    pub families: Vec<(IpFamily, FamilyOutcome)>,
}

impl PassSummary {
    /// Outcome for one family
    pub fn outcome(&self, family: IpFamily) -> Option<&FamilyOutcome> {
        self.families
            .iter()
            .find(|(f, _)| *f == family)
            .map(|(_, outcome)| outcome)
    }

    /// Number of families whose record now holds the selected address
    pub fn updated(&self) -> usize {
        self.families
            .iter()
            .filter(|(_, o)| matches!(o, FamilyOutcome::Updated { .. }))
            .count()
    }

    /// Number of failed families
    pub fn failed(&self) -> usize {
        self.families
            .iter()
            .filter(|(_, o)| matches!(o, FamilyOutcome::Failed(_)))
            .count()
    }

    /// Log one summary line per family
    pub fn log(&self) {
        for (family, outcome) in &self.families {
            match outcome {
                FamilyOutcome::Updated {
                    address, warning, ..
                } => match warning {
                    Some(w) => warn!("[{}] Updated to {} ({:?})", family, address, w),
                    None => info!("[{}] Updated to {}", family, address),
                },
                FamilyOutcome::Skipped { reason } => {
                    info!("[{}] No update performed: {}", family, reason)
                }
                FamilyOutcome::Failed(e) => {
                    error!("[{}] No update performed: {:?} failed: {}", family, e.stage(), e)
                }
            }
        }
        info!(
            "Pass finished in {}s",
            (self.finished_at - self.started_at).num_seconds()
        );
    }
}

/// Core bestip engine
///
/// Owns one [`MeasurementRunner`] and one [`Reconciler`] and drives them
/// family by family.
///
/// ## Lifecycle
///
/// 1. Create with [`BestIpEngine::new()`]
/// 2. Either call [`BestIpEngine::run_pass()`] once (scheduled externally)
///    or [`BestIpEngine::run_periodic()`] to repeat passes until shutdown
pub struct BestIpEngine {
    /// Measurement runner
    runner: MeasurementRunner,

    /// Record reconciler
    reconciler: Reconciler,

    /// Target record
    domain: DomainConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl BestIpEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `executor`: measurement tool executor
    /// - `provider`: DNS provider implementation
    /// - `config`: bestip configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        executor: Box<dyn MeasurementExecutor>,
        provider: Box<dyn DnsProvider>,
        config: BestIpConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            runner: MeasurementRunner::new(config.measurement, executor),
            reconciler: Reconciler::new(provider),
            domain: config.domain,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run one pass over all families
    ///
    /// Never fails: per-family errors are logged and recorded in the summary.
    pub async fn run_pass(&self) -> PassSummary {
        let started_at = Utc::now();
        self.emit_event(EngineEvent::PassStarted {
            families: IpFamily::ALL.len(),
        });

        let mut families = Vec::with_capacity(IpFamily::ALL.len());
        for family in IpFamily::ALL {
            info!("------------------------------------------------");
            info!("[{}] Starting", family);
            let outcome = self.run_family(family).await;
            families.push((family, outcome));
        }

        let summary = PassSummary {
            started_at,
            finished_at: Utc::now(),
            families,
        };

        self.emit_event(EngineEvent::PassFinished {
            updated: summary.updated(),
            failed: summary.failed(),
        });

        summary
    }

    /// Measure and reconcile one family
    async fn run_family(&self, family: IpFamily) -> FamilyOutcome {
        let selection = match self.runner.run(family).await {
            Ok(SelectionResult::Address(selection)) => selection,
            Ok(SelectionResult::NoCandidate) => {
                let reason = "no candidate pool".to_string();
                self.emit_event(EngineEvent::FamilySkipped {
                    family,
                    reason: reason.clone(),
                });
                return FamilyOutcome::Skipped { reason };
            }
            Err(e) => return self.fail(family, FamilyError::Run(e)),
        };

        info!("[{}] Best address: {}", family, selection.address);
        self.emit_event(EngineEvent::SelectionMade {
            family,
            address: selection.address.clone(),
            warning: selection.warning,
        });

        match self
            .reconciler
            .reconcile(
                &self.domain.domain,
                &self.domain.subdomain,
                family.record_type(),
                &selection.address,
            )
            .await
        {
            Ok(outcome) => {
                self.emit_event(EngineEvent::RecordApplied {
                    family,
                    address: selection.address.clone(),
                    outcome: outcome.clone(),
                });
                FamilyOutcome::Updated {
                    address: selection.address,
                    outcome,
                    warning: selection.warning,
                }
            }
            Err(e) => self.fail(family, FamilyError::Reconcile(e)),
        }
    }

    fn fail(&self, family: IpFamily, error: FamilyError) -> FamilyOutcome {
        error!("[{}] {:?} failed: {}", family, error.stage(), error);
        self.emit_event(EngineEvent::FamilyFailed {
            family,
            stage: error.stage(),
            error: error.to_string(),
        });
        FamilyOutcome::Failed(error)
    }

    /// Repeat passes every `interval` until Ctrl-C
    pub async fn run_periodic(&self, interval: Duration) -> usize {
        self.run_periodic_with_shutdown(interval, shutdown_signal(tokio::signal::ctrl_c()))
            .await
    }

    /// Repeat passes every `interval` until `shutdown` resolves
    ///
    /// A pass in flight when `shutdown` resolves is abandoned; a running
    /// measurement process is killed with it.
    ///
    /// # Returns
    ///
    /// Number of completed passes
    pub async fn run_periodic_with_shutdown<F>(&self, interval: Duration, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut passes = 0;

        loop {
            tokio::select! {
                summary = self.run_pass() => {
                    summary.log();
                    passes += 1;
                }
                _ = &mut shutdown => break,
            }

            info!("Next pass in {:?}", interval);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => break,
            }
        }

        info!("Shutdown signal received");
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
        passes
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Dropped rather than awaited so a slow consumer never stalls a pass
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// Resolve when `signal` fires
///
/// If the handler could not be installed the error is logged and the future
/// never resolves: a periodic loop keeps running instead of stopping at once.
pub async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
