//! Streaming pack parsing.
//!
//! A pack is `"PACK"` + big-endian version + big-endian entry count,
//! followed by that many entries (each a size header, for ref-deltas a
//! 20-byte base id, then a zlib stream) and a 20-byte SHA-1 trailer over
//! everything before it. Entries are materialized and stored as they
//! arrive; nothing is buffered beyond the object being reconstructed.

use std::io::Read;

use flate2::read::ZlibDecoder;
use tracing::debug;

use packserve_hash::{HashingReader, ObjectId, DIGEST_LEN};
use packserve_object::ObjectType;
use packserve_store::ObjectDb;

use crate::delta::apply_delta;
use crate::{PackVersion, ProtocolError};

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_HEADER_SIZE: usize = 12;

/// Pack entry type code for offset deltas (unsupported).
pub const OFS_DELTA_CODE: u8 = 6;
/// Pack entry type code for deltas referencing their base by id.
pub const REF_DELTA_CODE: u8 = 7;

/// What a completed pack receipt reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    pub version: PackVersion,
    pub objects: usize,
}

/// Read one pack from `input`, storing every object through `objects`.
///
/// All bytes from the `P` of `PACK` through the last entry byte feed the
/// running SHA-1; the digest is taken before the 20 trailer bytes are read,
/// so the trailer verifies exactly the preceding stream.
pub fn read_pack<R: Read>(
    input: R,
    objects: &ObjectDb<'_>,
) -> Result<PackSummary, ProtocolError> {
    let mut stream = HashingReader::new(input);

    let mut header = [0u8; PACK_HEADER_SIZE];
    stream
        .read_exact(&mut header)
        .map_err(|e| ProtocolError::TruncatedEntry(format!("pack header: {e}")))?;

    if &header[..4] != PACK_SIGNATURE {
        return Err(ProtocolError::InvalidPackHeader);
    }
    let raw_version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let version = PackVersion::from_wire(raw_version)
        .ok_or(ProtocolError::UnsupportedVersion(raw_version))?;
    let count = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);

    debug!(version = version.number(), objects = count, "reading pack");

    for _ in 0..count {
        read_entry(&mut stream, version, objects)?;
    }

    let computed = stream.digest()?;
    let mut trailer = [0u8; DIGEST_LEN];
    stream
        .read_exact(&mut trailer)
        .map_err(|e| ProtocolError::TruncatedEntry(format!("pack trailer: {e}")))?;
    let received = ObjectId::from(trailer);

    if computed != received {
        return Err(ProtocolError::ChecksumMismatch { computed, received });
    }

    Ok(PackSummary {
        version,
        objects: count as usize,
    })
}

/// Read, materialize, and store a single entry.
fn read_entry<R: Read>(
    stream: &mut HashingReader<R>,
    version: PackVersion,
    objects: &ObjectDb<'_>,
) -> Result<(), ProtocolError> {
    let (type_code, size) = read_entry_header(stream)?;

    if type_code == OFS_DELTA_CODE {
        return Err(ProtocolError::OfsDeltaUnsupported);
    }

    let base_id = if type_code == REF_DELTA_CODE {
        // Base reference is the raw 20-byte id, not hex.
        let mut raw = [0u8; DIGEST_LEN];
        stream
            .read_exact(&mut raw)
            .map_err(|e| ProtocolError::TruncatedEntry(format!("delta base id: {e}")))?;
        Some(ObjectId::from(raw))
    } else {
        None
    };

    let payload = inflate_entry(stream, size)?;

    let (obj_type, data) = match base_id {
        Some(base_id) => {
            // The reconstructed object inherits its base's type.
            let base = objects.load(&base_id)?;
            let data = apply_delta(&base.data, &payload, version)?;
            (base.obj_type, data)
        }
        None => {
            let obj_type = ObjectType::from_pack_code(type_code)
                .ok_or(ProtocolError::UnsupportedEntryType(type_code))?;
            (obj_type, payload)
        }
    };

    objects.save(obj_type, &data)?;
    Ok(())
}

/// Decode a pack entry size header.
///
/// Byte 0 carries the type in bits 4-6, a continuation bit in bit 7, and the
/// low four size bits; each continuation byte contributes seven more size
/// bits.
fn read_entry_header<R: Read>(
    stream: &mut HashingReader<R>,
) -> Result<(u8, usize), ProtocolError> {
    let mut byte = stream
        .read_u8()
        .map_err(|e| ProtocolError::TruncatedEntry(format!("entry size header: {e}")))?;

    let type_code = (byte >> 4) & 0x07;
    let mut size = (byte & 0x0f) as u64;
    let mut shift = 4;

    while byte & 0x80 != 0 {
        byte = stream
            .read_u8()
            .map_err(|e| ProtocolError::TruncatedEntry(format!("entry size header: {e}")))?;
        size |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
    }

    Ok((type_code, size as usize))
}

/// Inflate exactly `expected` bytes of one entry's zlib stream.
///
/// The decoder is fed one byte at a time so its internal buffering can never
/// swallow compressed bytes belonging to the next entry; after the declared
/// length, one more read must report end-of-stream.
fn inflate_entry<R: Read>(
    stream: &mut HashingReader<R>,
    expected: usize,
) -> Result<Vec<u8>, ProtocolError> {
    let mut decoder = ZlibDecoder::new(ByteFeed { inner: stream });

    let mut payload = vec![0u8; expected];
    decoder
        .read_exact(&mut payload)
        .map_err(|e| ProtocolError::TruncatedEntry(format!("object data: {e}")))?;

    let mut probe = [0u8; 1];
    match decoder.read(&mut probe) {
        Ok(0) => Ok(payload),
        Ok(_) => Err(ProtocolError::TruncatedEntry(
            "zlib stream longer than declared object size".into(),
        )),
        Err(e) => Err(ProtocolError::TruncatedEntry(format!(
            "zlib stream end: {e}"
        ))),
    }
}

/// Adapter delivering at most one byte per read call.
struct ByteFeed<'a, R> {
    inner: &'a mut R,
}

impl<R: Read> Read for ByteFeed<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.inner.read(&mut buf[..1])
    }
}
