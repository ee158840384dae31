// # DNSPod DNS Provider
//
// This crate provides a Tencent Cloud DNSPod (API 3.0) provider
// implementation for the bestip system.
//
// ## Behavior
//
// - One signed HTTPS POST per trait call, no retry and no backoff
// - Every error is propagated to the reconciler, which owns the
//   create-or-update decision
// - "No records" on lookup is an empty list, not an error
// - "Value unchanged" on modify surfaces as `Error::ValueUnchanged`
// - Dry-run mode performs lookups and logs the intended writes
//
// ## Security Requirements
//
// - SecretKey NEVER appears in logs or `Debug` output
// - Provider MUST fail fast if either half of the key pair is empty
//
// ## API Reference
//
// - Endpoint: POST https://dnspod.tencentcloudapi.com/
// - Actions: DescribeRecordList, CreateRecord, ModifyRecord (2021-03-23)
// - Signing: TC3-HMAC-SHA256

pub mod api;
pub mod sign;

use api::{
    API_VERSION, Action, ApiError, ApiRecord, CreateRecordRequest, DescribeRecordListRequest,
    Envelope, ModifyRecordRequest, NO_DATA_OF_RECORD, RECORD_VALUE_UNCHANGED, RecordIdData,
    RecordListData, ResponseBody,
};
use async_trait::async_trait;
use bestip_core::config::ProviderConfig;
use bestip_core::traits::{DnsProvider, DnsRecord, RecordId, RecordQuery};
use bestip_core::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Public DNSPod API endpoint
pub const DNSPOD_ENDPOINT: &str = "https://dnspod.tencentcloudapi.com/";

/// Routing line used for created and modified records
pub const DEFAULT_LINE: &str = "默认";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "dnspod";

/// DNSPod DNS provider
///
/// Stateless: holds credentials and an HTTP client, nothing learned from
/// previous calls.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform DescribeRecordList requests
/// - Log the intended CreateRecord/ModifyRecord payload
/// - **NOT** actually modify DNS records
pub struct DnspodProvider {
    /// SecretId of the API key pair
    secret_id: String,

    /// SecretKey of the API key pair
    /// ⚠️ NEVER log this value
    secret_key: String,

    /// Full endpoint URL
    endpoint: String,

    /// Host part of the endpoint, signed into every request
    host: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, look up records but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the key pair
impl std::fmt::Debug for DnspodProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnspodProvider")
            .field("secret_id", &"<REDACTED>")
            .field("secret_key", &"<REDACTED>")
            .field("endpoint", &self.endpoint)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DnspodProvider {
    /// Create a new DNSPod provider against the public endpoint
    ///
    /// # Parameters
    ///
    /// - `secret_id`, `secret_key`: Tencent Cloud API key pair
    /// - `dry_run`: If true, perform lookups but skip writes
    pub fn new(
        secret_id: impl Into<String>,
        secret_key: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let secret_id = secret_id.into();
        let secret_key = secret_key.into();

        if secret_id.is_empty() || secret_key.is_empty() {
            return Err(Error::config("DNSPod secret_id and secret_key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let (endpoint, host) = parse_endpoint(DNSPOD_ENDPOINT)?;

        Ok(Self {
            secret_id,
            secret_key,
            endpoint,
            host,
            client,
            dry_run,
        })
    }

    /// Create a provider in live mode
    pub fn new_live(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Result<Self> {
        Self::new(secret_id, secret_key, false)
    }

    /// Create a provider in dry-run mode
    pub fn new_dry_run(secret_id: impl Into<String>, secret_key: impl Into<String>) -> Result<Self> {
        Self::new(secret_id, secret_key, true)
    }

    /// Point the provider at a different endpoint
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        let (endpoint, host) = parse_endpoint(endpoint)?;
        self.endpoint = endpoint;
        self.host = host;
        Ok(self)
    }

    /// Build a provider from configuration
    pub fn from_config(config: &ProviderConfig, dry_run: bool) -> Result<Self> {
        match config {
            ProviderConfig::Dnspod {
                secret_id,
                secret_key,
                endpoint,
            } => {
                if dry_run {
                    tracing::warn!("DNSPod provider running in DRY-RUN mode - no changes will be made");
                }

                let provider = Self::new(secret_id.clone(), secret_key.clone(), dry_run)?;
                match endpoint {
                    Some(endpoint) => provider.with_endpoint(endpoint),
                    None => Ok(provider),
                }
            }
        }
    }

    /// Whether writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send one signed request and decode the response envelope
    ///
    /// API-level errors are returned inside the body for the caller to
    /// classify; transport and decoding failures are returned as `Err`.
    async fn call<Req, Resp>(&self, action: Action, request: &Req) -> Result<ResponseBody<Resp>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_string(request)?;
        let now = Utc::now();
        let authorization =
            sign::authorization(&self.secret_id, &self.secret_key, &self.host, &payload, now)?;

        tracing::debug!("DNSPod {} request: {}", action, payload);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", authorization)
            .header("Content-Type", sign::CONTENT_TYPE)
            .header("X-TC-Action", action.as_str())
            .header("X-TC-Timestamp", now.timestamp().to_string())
            .header("X-TC-Version", API_VERSION)
            .body(payload)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("{} response unreadable: {}", action, e)))?;

        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!("{} rejected with status {}", action, status)),
                429 => Error::rate_limited(format!("{} rejected with status {}", action, status)),
                _ => Error::provider(PROVIDER, format!("{} failed: {} - {}", action, status, text)),
            });
        }

        let envelope: Envelope<Resp> = serde_json::from_str(&text).map_err(|e| {
            Error::provider(PROVIDER, format!("Invalid {} response: {}", action, e))
        })?;

        tracing::debug!(
            "DNSPod {} response (RequestId: {})",
            action,
            envelope.response.request_id
        );

        Ok(envelope.response)
    }

    fn to_record(query: &RecordQuery, record: ApiRecord) -> DnsRecord {
        DnsRecord {
            id: RecordId::new(record.record_id.to_string()),
            name: if record.name.is_empty() {
                query.subdomain.clone()
            } else {
                record.name
            },
            record_type: query.record_type,
            value: record.value,
            line: record.line,
        }
    }
}

/// Split an endpoint URL into (url, host)
fn parse_endpoint(endpoint: &str) -> Result<(String, String)> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| Error::config(format!("Invalid DNSPod endpoint {}: {}", endpoint, e)))?;

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(Error::config(format!(
                "DNSPod endpoint has no host: {}",
                endpoint
            )));
        }
    };

    Ok((url.to_string(), host))
}

/// Classify an API-level error
fn map_api_error(action: Action, error: ApiError) -> Error {
    let detail = format!("{}: {} ({})", action, error.message, error.code);

    if error.code.starts_with("AuthFailure") {
        Error::auth(detail)
    } else if error.code.starts_with("RequestLimitExceeded") {
        Error::rate_limited(detail)
    } else if action == Action::ModifyRecord && error.code == RECORD_VALUE_UNCHANGED {
        Error::value_unchanged(PROVIDER, detail)
    } else {
        Error::provider(PROVIDER, detail)
    }
}

fn parse_record_id(record_id: &RecordId) -> Result<u64> {
    record_id.as_str().parse().map_err(|_| {
        Error::invalid_input(format!("DNSPod record id must be numeric, got {}", record_id))
    })
}

#[async_trait]
impl DnsProvider for DnspodProvider {
    async fn list_records(&self, query: &RecordQuery) -> Result<Vec<DnsRecord>> {
        tracing::debug!("Looking up DNSPod records for {}", query);

        let request = DescribeRecordListRequest {
            domain: &query.domain,
            subdomain: &query.subdomain,
            record_type: query.record_type.as_str(),
        };

        let body: ResponseBody<RecordListData> =
            self.call(Action::DescribeRecordList, &request).await?;

        if let Some(error) = body.error {
            if error.code == NO_DATA_OF_RECORD {
                tracing::debug!("No DNSPod record for {}", query);
                return Ok(Vec::new());
            }
            return Err(map_api_error(Action::DescribeRecordList, error));
        }

        Ok(body
            .data
            .record_list
            .into_iter()
            .map(|record| Self::to_record(query, record))
            .collect())
    }

    async fn create_record(&self, query: &RecordQuery, line: &str, value: &str) -> Result<DnsRecord> {
        let request = CreateRecordRequest {
            domain: &query.domain,
            sub_domain: &query.subdomain,
            record_type: query.record_type.as_str(),
            record_line: line,
            value,
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send CreateRecord with payload: {}",
                serde_json::to_string(&request)?
            );
            return Ok(DnsRecord {
                id: RecordId::new("dry-run"),
                name: query.subdomain.clone(),
                record_type: query.record_type,
                value: value.to_string(),
                line: line.to_string(),
            });
        }

        let body: ResponseBody<RecordIdData> = self.call(Action::CreateRecord, &request).await?;
        if let Some(error) = body.error {
            return Err(map_api_error(Action::CreateRecord, error));
        }

        let record_id = body.data.record_id.ok_or_else(|| {
            Error::provider(PROVIDER, "CreateRecord response carries no RecordId")
        })?;

        tracing::info!("DNSPod record created: {} -> {} (ID: {})", query, value, record_id);
        Ok(DnsRecord {
            id: RecordId::new(record_id.to_string()),
            name: query.subdomain.clone(),
            record_type: query.record_type,
            value: value.to_string(),
            line: line.to_string(),
        })
    }

    async fn update_record(
        &self,
        query: &RecordQuery,
        line: &str,
        value: &str,
        record_id: &RecordId,
    ) -> Result<DnsRecord> {
        let request = ModifyRecordRequest {
            domain: &query.domain,
            sub_domain: &query.subdomain,
            record_type: query.record_type.as_str(),
            record_line: line,
            value,
            record_id: parse_record_id(record_id)?,
        };

        let record = DnsRecord {
            id: record_id.clone(),
            name: query.subdomain.clone(),
            record_type: query.record_type,
            value: value.to_string(),
            line: line.to_string(),
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send ModifyRecord with payload: {}",
                serde_json::to_string(&request)?
            );
            return Ok(record);
        }

        let body: ResponseBody<RecordIdData> = self.call(Action::ModifyRecord, &request).await?;
        if let Some(error) = body.error {
            return Err(map_api_error(Action::ModifyRecord, error));
        }

        tracing::info!("DNSPod record updated: {} -> {} (ID: {})", query, value, record_id);
        Ok(record)
    }

    fn default_line(&self) -> &str {
        DEFAULT_LINE
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
