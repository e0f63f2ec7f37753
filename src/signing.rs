//! HMAC-SHA256 request signing for URL-embedded authorization.
//!
//! A signed URL lets a browser fetch a screenshot without ever seeing the API
//! key. The server rebuilds the canonical query from the parameters it
//! receives and compares signatures, so canonicalization must be
//! deterministic: keys sorted, values query-escaped, pairs joined with `&`.

use crate::error::{ApiError, Result};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Everything except alphanumerics and `-_.~` is escaped. Spaces are handled
/// separately and become `+`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// HMAC-SHA256 of `message` under `key`, as lowercase hex.
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never takes the error branch.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Query-escapes a value: unreserved characters pass through, spaces become
/// `+`, every other byte is `%XX` with uppercase hex.
pub fn query_escape(value: &str) -> String {
    value
        .split(' ')
        .map(|part| utf8_percent_encode(part, QUERY_VALUE).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Serializes `params` as `k=v&k=v` with keys in lexicographic order and
/// values query-escaped.
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", query_escape(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical query plus the signature computed over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedQuery {
    pub query: String,
    pub signature: String,
}

impl SignedQuery {
    /// `query&signature=<hex>`, ready to append after `?`.
    pub fn to_query_string(&self) -> String {
        format!("{}&signature={}", self.query, self.signature)
    }
}

/// Signs parameter sets with a secret key and a public key id.
#[derive(Clone)]
pub struct RequestSigner {
    signing_key: String,
    key_id: String,
}

impl RequestSigner {
    /// Fails with `invalid_request` unless both the secret and the key id are
    /// non-empty.
    pub fn new(signing_key: impl Into<String>, key_id: impl Into<String>) -> Result<Self> {
        let signing_key = signing_key.into();
        let key_id = key_id.into();

        if signing_key.is_empty() || key_id.is_empty() {
            return Err(ApiError::invalid_request(
                "Signed URLs require signing_key (rs_secret_*) and public_key_id (rs_pub_*). \
                 Set them in ClientConfig or pass them to generate_url directly.",
                400,
            ));
        }

        Ok(Self {
            signing_key,
            key_id,
        })
    }

    /// Picks explicit credentials over configured defaults, field by field.
    pub fn resolve(
        signing_key: Option<&str>,
        key_id: Option<&str>,
        default_signing_key: Option<&str>,
        default_key_id: Option<&str>,
    ) -> Result<Self> {
        let pick = |explicit: Option<&str>, fallback: Option<&str>| {
            explicit
                .filter(|v| !v.is_empty())
                .or(fallback)
                .unwrap_or_default()
                .to_string()
        };

        Self::new(
            pick(signing_key, default_signing_key),
            pick(key_id, default_key_id),
        )
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Adds `expires` and `key_id` to `params` and signs the result.
    ///
    /// Caller entries named `expires` or `key_id` are replaced.
    pub fn sign(&self, params: &BTreeMap<String, String>, expires: i64) -> SignedQuery {
        let mut params = params.clone();
        params.insert("expires".to_string(), expires.to_string());
        params.insert("key_id".to_string(), self.key_id.clone());

        let query = canonical_query(&params);
        let signature = hmac_sha256_hex(self.signing_key.as_bytes(), query.as_bytes());

        SignedQuery { query, signature }
    }

    /// `base_url + path + "?" + canonical query + "&signature=" + hex`.
    pub fn signed_url(
        &self,
        base_url: &str,
        path: &str,
        params: &BTreeMap<String, String>,
        expires: i64,
    ) -> String {
        let signed = self.sign(params, expires);
        format!("{base_url}{path}?{}", signed.to_query_string())
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("key_id", &self.key_id)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}
