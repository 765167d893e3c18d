/// Revocable references over in-memory image buffers
///
/// A `BlobUrl` is what the presentation layer renders from. The bytes live
/// in a shared table until the owner of the reference releases it; every
/// call site that replaces an image must release the reference it replaces.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::FetchError;

const URL_PREFIX: &str = "blob:filter-studio/";

/// Handle to a wrapped buffer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrl(u64);

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", URL_PREFIX, self.0)
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, Bytes>>,
}

/// Table of live references, shared by every clone
#[derive(Clone, Default)]
pub struct BlobRegistry {
    inner: Arc<Inner>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u64, Bytes>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.inner
            .live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a buffer and hand out a new reference to it.
    /// `Bytes` is refcounted, so the payload itself is not copied.
    pub fn wrap(&self, bytes: Bytes) -> BlobUrl {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let len = bytes.len();
        self.table().insert(id, bytes);
        let url = BlobUrl(id);
        log::debug!("Wrapped {} bytes as {}", len, url);
        url
    }

    /// Re-fetch the bytes behind a live reference
    pub fn fetch(&self, url: &BlobUrl) -> Result<Bytes, FetchError> {
        self.table()
            .get(&url.0)
            .cloned()
            .ok_or_else(|| FetchError::Revoked(url.clone()))
    }

    /// Revoke a reference. Releasing twice is a no-op.
    pub fn release(&self, url: &BlobUrl) {
        if self.table().remove(&url.0).is_some() {
            log::debug!("Released {}", url);
        }
    }

    pub fn is_live(&self, url: &BlobUrl) -> bool {
        self.table().contains_key(&url.0)
    }

    /// Number of references that have not been released yet
    pub fn live_count(&self) -> usize {
        self.table().len()
    }
}

impl fmt::Debug for BlobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}
