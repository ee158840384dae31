// # DNS Provider Trait
//
// Defines the interface for reading and writing DNS records via provider APIs.
//
// ## Implementations
//
// - Tencent Cloud DNSPod: `bestip-provider-dnspod` crate
//
// ## Usage
//
// ```rust,ignore
// use bestip_core::traits::{DnsProvider, RecordQuery};
// use bestip_core::config::RecordType;
//
// let query = RecordQuery::new("example.com", "cf", RecordType::A);
// let existing = provider.list_records(&query).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RecordType;

/// Opaque provider-assigned record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a provider-specific identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier as the provider returned it
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `(domain, subdomain, type)` triple that identifies a managed record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordQuery {
    /// Main domain (e.g. "example.com")
    pub domain: String,
    /// Host part below the main domain (e.g. "cf", or "@" for the apex)
    pub subdomain: String,
    /// Record type
    pub record_type: RecordType,
}

impl RecordQuery {
    /// Create a new record query
    pub fn new(
        domain: impl Into<String>,
        subdomain: impl Into<String>,
        record_type: RecordType,
    ) -> Self {
        Self {
            domain: domain.into(),
            subdomain: subdomain.into(),
            record_type,
        }
    }

    /// Fully-qualified host name, for logging
    pub fn fqdn(&self) -> String {
        if self.subdomain.is_empty() || self.subdomain == "@" {
            self.domain.clone()
        } else {
            format!("{}.{}", self.subdomain, self.domain)
        }
    }
}

impl fmt::Display for RecordQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.fqdn(), self.record_type)
    }
}

/// A DNS record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Provider-assigned id
    pub id: RecordId,
    /// Host part (subdomain)
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Current value (IP address)
    pub value: String,
    /// Routing line the record belongs to
    pub line: String,
}

/// Trait for DNS provider implementations
///
/// The three operations mirror a provider's record API one-to-one. The
/// create-or-update decision is owned by [`crate::reconcile::Reconciler`],
/// never by the provider.
///
/// # Contract
///
/// - One API call per method invocation, no retry and no backoff
/// - No caching between calls: every `list_records` reflects the remote state
/// - An update rejected because the record already holds `value` MUST be
///   reported as [`crate::Error::ValueUnchanged`] so the reconciler can treat
///   it as success
/// - Credentials never appear in logs or `Debug` output
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List records matching `(domain, subdomain, type)`
    ///
    /// Zero matches is `Ok(vec![])`, not an error.
    async fn list_records(&self, query: &RecordQuery) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a new record on the given routing line
    async fn create_record(
        &self,
        query: &RecordQuery,
        line: &str,
        value: &str,
    ) -> Result<DnsRecord, crate::Error>;

    /// Update the record `record_id` in place
    async fn update_record(
        &self,
        query: &RecordQuery,
        line: &str,
        value: &str,
        record_id: &RecordId,
    ) -> Result<DnsRecord, crate::Error>;

    /// The provider's default routing line
    fn default_line(&self) -> &str;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fqdn() {
        let q = RecordQuery::new("example.com", "cf", RecordType::A);
        assert_eq!(q.fqdn(), "cf.example.com");
        assert_eq!(q.to_string(), "cf.example.com (A)");

        let apex = RecordQuery::new("example.com", "@", RecordType::Aaaa);
        assert_eq!(apex.fqdn(), "example.com");
    }
}
