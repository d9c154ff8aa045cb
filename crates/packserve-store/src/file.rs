use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use packserve_hash::hex;

use crate::{BackingStore, StoreError, LOCK_RETRY_INTERVAL};

/// A directory-backed store.
///
/// Keys are hex-encoded into filesystem-safe names and grouped into bucket
/// directories named after the first 20 characters of the encoded key, so
/// `object/...` entries fan out instead of piling into one directory.
/// Cross-process exclusion uses a `lock` file created with O_CREAT|O_EXCL,
/// retried on the shared cadence while another process holds it.
pub struct FileStore {
    base: PathBuf,
    lock_path: PathBuf,
    locked: AtomicBool,
}

impl FileStore {
    /// Open (creating if necessary) a store rooted at `base`.
    pub fn open(base: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        let lock_path = base.join("lock");
        Ok(Self {
            base,
            lock_path,
            locked: AtomicBool::new(false),
        })
    }

    /// The directory this store lives in.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn key_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let safe = hex::encode(name.as_bytes());
        let bucket = &safe[..safe.len().min(20)];
        let bucket_dir = self.base.join(bucket);
        fs::create_dir_all(&bucket_dir)?;
        Ok(bucket_dir.join(safe))
    }

    fn check_locked(&self) -> Result<(), StoreError> {
        if self.locked.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::NotLocked)
        }
    }
}

impl BackingStore for FileStore {
    fn lock(&self) -> Result<(), StoreError> {
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
            {
                Ok(_) => {
                    self.locked.store(true, Ordering::SeqCst);
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    std::thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(StoreError::LockCreate {
                        path: self.lock_path.clone(),
                        source: e,
                    });
                }
            }
        }
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
        let _ = fs::remove_file(&self.lock_path);
    }

    fn set(&self, name: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check_locked()?;
        let path = self.key_path(name)?;
        fs::write(path, value)?;
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.check_locked()?;
        let path = self.key_path(name)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::KeyNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
