use std::io::{self, Read};

use crate::{HashError, Hasher, ObjectId};

/// A transparent [`Read`] wrapper that feeds every delivered byte into a
/// running SHA-1.
///
/// The pack parser reads the entire stream through this wrapper and asks for
/// [`digest`](HashingReader::digest) just before consuming the 20-byte
/// trailer, so the trailer itself never influences the digest it is compared
/// against.
pub struct HashingReader<R> {
    inner: R,
    hasher: Hasher,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
        }
    }

    /// Read a single byte, feeding it to the hash.
    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// The digest of every byte delivered so far. Non-destructive: reads may
    /// continue afterwards.
    pub fn digest(&self) -> Result<ObjectId, HashError> {
        self.hasher.digest()
    }

    /// Restart the running hash; the reader position is unaffected.
    pub fn reset(&mut self) {
        self.hasher.reset();
    }

    /// Get a mutable reference to the wrapped reader. Bytes read through it
    /// directly bypass the hash.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the wrapper and return the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
