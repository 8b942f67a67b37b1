//! Per-issuer key set cache.
//!
//! Key sets are fetched lazily on first use and kept for the lifetime of the
//! cache, with no expiry and no invalidation. The cache is constructed once by
//! the composition root and shared through an `Arc`.
//!
//! # Concurrency
//!
//! The lock is never held across a fetch. Two requests that miss at the same
//! time may both fetch; the first stored value wins and both callers get it.
//! A fetch that fails or is abandoned leaves the cache untouched.

use crate::auth::jwks::{KeySet, KeySetFetcher};
use crate::errors::AuthorizerError;
use crate::observability::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Process-lifetime map of issuer to key set.
#[derive(Debug, Default)]
pub struct KeySetCache {
    entries: RwLock<HashMap<String, Arc<KeySet>>>,
}

impl KeySetCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the key set for `issuer`, fetching it on a miss.
    ///
    /// # Errors
    ///
    /// Propagates the fetcher's error. Nothing is cached on failure, so the
    /// next call fetches again.
    #[instrument(skip_all, fields(issuer = %issuer))]
    pub async fn get_or_fetch(
        &self,
        issuer: &str,
        fetcher: &dyn KeySetFetcher,
    ) -> Result<Arc<KeySet>, AuthorizerError> {
        // Check cache first
        {
            let entries = self.entries.read().await;
            if let Some(key_set) = entries.get(issuer) {
                tracing::debug!(target: "authorizer.auth.key_cache", "Key set cache hit");
                metrics::record_key_cache_lookup(true);
                return Ok(Arc::clone(key_set));
            }
        }

        tracing::debug!(target: "authorizer.auth.key_cache", "Key set cache miss");
        metrics::record_key_cache_lookup(false);

        // Fetch outside the lock
        let fetched = Arc::new(fetcher.fetch(issuer).await?);

        let mut entries = self.entries.write().await;
        let stored = Arc::clone(
            entries
                .entry(issuer.to_string())
                .or_insert_with(|| Arc::clone(&fetched)),
        );
        metrics::set_cached_issuers(entries.len());

        if !Arc::ptr_eq(&stored, &fetched) {
            tracing::debug!(
                target: "authorizer.auth.key_cache",
                "Concurrent fetch already populated key set, discarding ours"
            );
        }

        Ok(stored)
    }

    /// Number of issuers with a cached key set.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no key set has been cached yet.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether a key set is cached for `issuer`.
    pub async fn contains(&self, issuer: &str) -> bool {
        self.entries.read().await.contains_key(issuer)
    }
}
