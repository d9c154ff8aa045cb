use digest::Digest;

use crate::{HashError, ObjectId, DIGEST_LEN};

/// Streaming SHA-1 computation with collision detection.
///
/// Pack contents are attacker-supplied, so the collision-detecting SHA-1
/// variant is used throughout. Data can be fed incrementally with
/// [`update`](Hasher::update) or through the [`std::io::Write`]
/// implementation, then finalised into an [`ObjectId`].
pub struct Hasher {
    inner: Box<sha1_checked::Sha1>,
}

impl Hasher {
    pub fn new() -> Self {
        Self {
            inner: Box::new(sha1_checked::Sha1::new()),
        }
    }

    /// Feed data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the id.
    ///
    /// Returns an error if SHA-1 collision detection fires.
    pub fn finalize(self) -> Result<ObjectId, HashError> {
        let result = self.inner.try_finalize();
        if result.has_collision() {
            return Err(HashError::Sha1Collision);
        }
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(result.hash().as_slice());
        Ok(ObjectId::from(bytes))
    }

    /// Return the digest of everything fed so far without consuming the
    /// running state. Later updates continue from where they left off.
    pub fn digest(&self) -> Result<ObjectId, HashError> {
        let snapshot = Self {
            inner: self.inner.clone(),
        };
        snapshot.finalize()
    }

    /// Discard all fed data and start over.
    pub fn reset(&mut self) {
        self.inner = Box::new(sha1_checked::Sha1::new());
    }

    /// Convenience: hash a byte slice in one call.
    pub fn hash(data: &[u8]) -> Result<ObjectId, HashError> {
        let mut h = Self::new();
        h.update(data);
        h.finalize()
    }

    /// Hash a canonical object encoding: `"{type} {len}\0{payload}"`.
    pub fn hash_object(obj_type: &str, payload: &[u8]) -> Result<ObjectId, HashError> {
        let mut h = Self::new();
        h.update(format!("{} {}\0", obj_type, payload.len()).as_bytes());
        h.update(payload);
        h.finalize()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
