//! Record reconciliation
//!
//! Makes the provider's `(domain, subdomain, type)` record hold a desired
//! value with a lookup-then-write protocol:
//!
//! ```text
//! list_records ──► match? ──yes──► update_record(first.id) ──► Updated
//!                    │                     │
//!                    no                    └─ ValueUnchanged ──► Unchanged
//!                    ▼
//!               create_record ──► Created
//! ```
//!
//! Every call looks the record up again; nothing is cached between calls.
//! There is no retry: one attempt per invocation. Two reconcilers racing on
//! the same record can both observe "no record" and create duplicates; a
//! single scheduler is assumed.

use tracing::{debug, info, warn};

use crate::config::RecordType;
use crate::error::ReconcileError;
use crate::traits::{DnsProvider, RecordId, RecordQuery};

/// Result of a successful reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No record existed; one was created
    Created {
        /// Id of the new record
        record_id: RecordId,
    },
    /// The existing record was updated to the new value
    Updated {
        /// Id of the updated record
        record_id: RecordId,
        /// Value the lookup reported before the update
        previous_value: String,
    },
    /// The provider reported the record already holds the value
    Unchanged {
        /// Id of the existing record
        record_id: RecordId,
    },
}

impl ReconcileOutcome {
    /// Id of the record that now holds the value
    pub fn record_id(&self) -> &RecordId {
        match self {
            ReconcileOutcome::Created { record_id }
            | ReconcileOutcome::Updated { record_id, .. }
            | ReconcileOutcome::Unchanged { record_id } => record_id,
        }
    }
}

/// Create-or-update protocol over a [`DnsProvider`]
pub struct Reconciler {
    provider: Box<dyn DnsProvider>,
}

impl Reconciler {
    /// Create a reconciler over the given provider
    pub fn new(provider: Box<dyn DnsProvider>) -> Self {
        Self { provider }
    }

    /// Make `(domain, subdomain, record_type)` point at `value`
    pub async fn reconcile(
        &self,
        domain: &str,
        subdomain: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let query = RecordQuery::new(domain, subdomain, record_type);
        let line = self.provider.default_line();

        info!(
            "[{}] Checking DNS record {}",
            self.provider.provider_name(),
            query
        );

        let existing = self
            .provider
            .list_records(&query)
            .await
            .map_err(ReconcileError::LookupFailed)?;

        if existing.len() > 1 {
            warn!(
                "[{}] {} records match {}; updating the first (id {})",
                self.provider.provider_name(),
                existing.len(),
                query,
                existing[0].id
            );
        }

        let Some(target) = existing.into_iter().next() else {
            info!(
                "[{}] Record not found, creating {} -> {}",
                self.provider.provider_name(),
                query,
                value
            );
            let created = self
                .provider
                .create_record(&query, line, value)
                .await
                .map_err(ReconcileError::ApplyFailed)?;

            info!(
                "[{}] DNS record created (id {})",
                self.provider.provider_name(),
                created.id
            );
            return Ok(ReconcileOutcome::Created {
                record_id: created.id,
            });
        };

        info!(
            "[{}] Record found (id {}), updating {} -> {}",
            self.provider.provider_name(),
            target.id,
            query,
            value
        );

        match self
            .provider
            .update_record(&query, line, value, &target.id)
            .await
        {
            Ok(updated) => {
                info!(
                    "[{}] DNS record updated (id {})",
                    self.provider.provider_name(),
                    updated.id
                );
                Ok(ReconcileOutcome::Updated {
                    record_id: updated.id,
                    previous_value: target.value,
                })
            }
            Err(e) if e.is_value_unchanged() => {
                debug!("[{}] {}", self.provider.provider_name(), e);
                info!(
                    "[{}] DNS record already holds {}",
                    self.provider.provider_name(),
                    value
                );
                Ok(ReconcileOutcome::Unchanged {
                    record_id: target.id,
                })
            }
            Err(e) => Err(ReconcileError::ApplyFailed(e)),
        }
    }
}
