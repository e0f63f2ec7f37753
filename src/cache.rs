//! Cached screenshot management.

use crate::error::Result;
use crate::transport::{Headers, Params, Transport};
use crate::types::{decode, PurgeResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const PURGE_PATH: &str = "/v1/cache/purge";

/// Operations on the server-side screenshot cache.
#[derive(Clone)]
pub struct CacheManager {
    transport: Arc<dyn Transport>,
}

impl CacheManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Cached image bytes for `key`, or `None` if nothing is cached under it.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self
            .transport
            .get_binary(&entry_path(key), &Params::new(), &Headers::new())
            .await
        {
            Ok(response) => Ok(Some(response.body)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Removes one entry. `false` means it did not exist.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        match self
            .transport
            .delete(&entry_path(key), &Params::new(), &Headers::new())
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Removes the listed entries.
    pub async fn purge(&self, keys: &[String]) -> Result<PurgeResult> {
        self.purge_with(json!({ "keys": keys })).await
    }

    /// Removes entries whose source URL matches a glob pattern.
    pub async fn purge_url(&self, pattern: &str) -> Result<PurgeResult> {
        self.purge_with(json!({ "url": pattern })).await
    }

    /// Removes entries created before `before`.
    pub async fn purge_before(&self, before: DateTime<Utc>) -> Result<PurgeResult> {
        let before = before.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.purge_with(json!({ "before": before })).await
    }

    /// Removes entries whose storage path matches `pattern`.
    pub async fn purge_pattern(&self, pattern: &str) -> Result<PurgeResult> {
        self.purge_with(json!({ "pattern": pattern })).await
    }

    async fn purge_with(&self, body: Value) -> Result<PurgeResult> {
        debug!(%body, "purging cache");
        let response = self
            .transport
            .post(PURGE_PATH, &body, &Headers::new())
            .await?;
        decode(response)
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager").finish_non_exhaustive()
    }
}

fn entry_path(key: &str) -> String {
    format!("/v1/cache/{key}")
}
