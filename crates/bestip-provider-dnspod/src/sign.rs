//! TC3-HMAC-SHA256 request signing for Tencent Cloud API 3.0
//!
//! Only the subset DNSPod needs: `POST /`, JSON body, signed headers
//! `content-type;host`.

use bestip_core::{Error, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Signature algorithm name
pub const ALGORITHM: &str = "TC3-HMAC-SHA256";

/// Content type sent with (and signed into) every request
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Service name used in the credential scope
pub const SERVICE: &str = "dnspod";

const SIGNED_HEADERS: &str = "content-type;host";

/// Build the `Authorization` header value for one request
///
/// `timestamp` must be the same instant sent in `X-TC-Timestamp`; its UTC
/// date is part of the credential scope.
pub fn authorization(
    secret_id: &str,
    secret_key: &str,
    host: &str,
    payload: &str,
    timestamp: DateTime<Utc>,
) -> Result<String> {
    let date = timestamp.format("%Y-%m-%d").to_string();
    let scope = format!("{}/{}/tc3_request", date, SERVICE);

    let canonical_request = canonical_request(host, payload);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        timestamp.timestamp(),
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let secret_date = hmac_sha256(format!("TC3{}", secret_key).as_bytes(), date.as_bytes())?;
    let secret_service = hmac_sha256(&secret_date, SERVICE.as_bytes())?;
    let secret_signing = hmac_sha256(&secret_service, b"tc3_request")?;
    let signature = hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes())?);

    Ok(format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, secret_id, scope, SIGNED_HEADERS, signature
    ))
}

fn canonical_request(host: &str, payload: &str) -> String {
    format!(
        "POST\n/\n\ncontent-type:{}\nhost:{}\n\n{}\n{}",
        CONTENT_TYPE,
        host,
        SIGNED_HEADERS,
        sha256_hex(payload.as_bytes())
    )
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Other(format!("HMAC key rejected: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
