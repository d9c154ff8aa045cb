//! Pluggable repository storage.
//!
//! A repository is a flat blob namespace behind the [`BackingStore`] trait:
//! one reserved key (`refs`) for the ref map and one `object/<40-hex>` key
//! per stored object. The store owns the per-repository lock; a push session
//! acquires it before advertising refs and releases it after the final
//! status flush.

pub mod file;
pub mod memory;
pub mod objects;
pub mod refmap;

use std::path::PathBuf;
use std::time::Duration;

use packserve_hash::{HashError, ObjectId};
use packserve_object::ObjectError;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use objects::ObjectDb;
pub use refmap::RefMap;

/// Reserved key holding the serialized ref map.
pub const REFS_KEY: &str = "refs";

/// Cadence at which blocked lock acquisition retries.
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Store key for an object id.
pub fn object_key(id: &ObjectId) -> String {
    format!("object/{}", id.to_hex())
}

/// Errors produced by backing stores and the adapters over them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("store is not locked; lock() must precede set/get")]
    NotLocked,

    #[error("unable to create lock file '{path}': {source}")]
    LockCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ref map: {0}")]
    RefMapParse(String),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The injected per-repository storage contract.
///
/// `set` and `get` may only be called while the store is locked; calling
/// them unlocked is a programming error surfaced as
/// [`StoreError::NotLocked`]. `lock` blocks (retrying on a bounded cadence)
/// until the holder releases; no timeout is imposed at this layer.
pub trait BackingStore: Send + Sync {
    fn lock(&self) -> Result<(), StoreError>;
    fn unlock(&self);
    fn set(&self, name: &str, value: &[u8]) -> Result<(), StoreError>;
    fn get(&self, name: &str) -> Result<Vec<u8>, StoreError>;
}

/// RAII wrapper pairing [`BackingStore::lock`] with a guaranteed
/// [`BackingStore::unlock`] on every exit path.
pub struct LockGuard<'a> {
    store: &'a dyn BackingStore,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(store: &'a dyn BackingStore) -> Result<Self, StoreError> {
        store.lock()?;
        Ok(Self { store })
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.store.unlock();
    }
}
