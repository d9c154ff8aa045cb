use std::collections::HashMap;
use std::sync::Mutex;

use crate::{BackingStore, StoreError, LOCK_RETRY_INTERVAL};

/// An in-memory backing store.
///
/// Used by embedders that do not need persistence and throughout the test
/// suite. The lock is a flag polled on the shared retry cadence, so two
/// sessions contending for one repository serialize exactly as they would
/// against the file-backed store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    locked: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently present, in unspecified order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    fn check_locked(&self) -> Result<(), StoreError> {
        if *self.locked.lock().unwrap() {
            Ok(())
        } else {
            Err(StoreError::NotLocked)
        }
    }
}

impl BackingStore for MemoryStore {
    fn lock(&self) -> Result<(), StoreError> {
        loop {
            {
                let mut locked = self.locked.lock().unwrap();
                if !*locked {
                    *locked = true;
                    return Ok(());
                }
            }
            std::thread::sleep(LOCK_RETRY_INTERVAL);
        }
    }

    fn unlock(&self) {
        *self.locked.lock().unwrap() = false;
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check_locked()?;
        self.entries
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.check_locked()?;
        self.entries
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(name.to_string()))
    }
}
