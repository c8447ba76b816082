//! Shared checkouts keyed by reference, ref and depth.
//!
//! Concurrent requests for the same key wait on a single populate. Entries
//! expire after an idle period or when capacity is exceeded; the workspace is
//! deleted once the last holder drops its `Arc`.

use crate::checkout::Checkout;
use crate::error::AccessError;
use moka::future::Cache;
use repoaccess_core::RepositoryReference;
use repoaccess_vcs::CloneDepth;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Identity of a shared checkout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckoutKey {
    /// Repository.
    pub reference: RepositoryReference,
    /// Requested ref, `None` for the default branch.
    pub git_ref: Option<String>,
    /// History depth.
    pub depth: CloneDepth,
}

/// Cache of shared checkouts.
pub struct CheckoutCache {
    cache: Cache<CheckoutKey, Arc<Checkout>>,
    populates: AtomicU64,
    evictions: Arc<AtomicU64>,
}

impl std::fmt::Debug for CheckoutCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutCache")
            .field("entry_count", &self.cache.entry_count())
            .field("populates", &self.populates.load(Ordering::Relaxed))
            .finish()
    }
}

impl CheckoutCache {
    /// Cache holding at most `capacity` checkouts, each dropped after `idle`
    /// without access.
    #[must_use]
    pub fn new(capacity: u64, idle: Duration) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&evictions);
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(idle)
            .eviction_listener(move |key: Arc<CheckoutKey>, _value, cause| {
                counter.fetch_add(1, Ordering::Relaxed);
                debug!(reference = %key.reference, ?cause, "shared checkout evicted");
            })
            .build();
        Self {
            cache,
            populates: AtomicU64::new(0),
            evictions,
        }
    }

    /// Cached checkout for `key`, running `populate` if there is none.
    ///
    /// Callers racing on the same key share one `populate`; its error is
    /// handed to each of them and nothing is cached.
    ///
    /// # Errors
    /// Returns the populate error.
    pub async fn get_or_populate<F>(&self, key: CheckoutKey, populate: F) -> Result<Arc<Checkout>, AccessError>
    where
        F: Future<Output = Result<Checkout, AccessError>>,
    {
        self.cache
            .try_get_with(key, async {
                self.populates.fetch_add(1, Ordering::Relaxed);
                populate.await.map(Arc::new)
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Drop the entry for `key`.
    pub async fn invalidate(&self, key: &CheckoutKey) {
        self.cache.invalidate(key).await;
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// Entries currently held.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Populates started through this cache.
    #[must_use]
    pub fn populates(&self) -> u64 {
        self.populates.load(Ordering::Relaxed)
    }

    /// Entries evicted or invalidated.
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
