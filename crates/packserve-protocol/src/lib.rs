//! The receive-pack protocol engine.
//!
//! Implements the server side of git's push exchange: pkt-line framing, the
//! streaming pack parser with ref-delta reconstruction, and the session
//! state machine that advertises refs, consumes update commands, unpacks
//! the object stream, and reports per-ref status.

pub mod delta;
pub mod pack;
pub mod pktline;
pub mod session;

use packserve_hash::{HashError, ObjectId};
use packserve_store::StoreError;

pub use delta::DeltaError;
pub use session::ReceiveSession;

/// Errors that can occur while receiving a push.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid pack header")]
    InvalidPackHeader,

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("base offset deltas not supported")]
    OfsDeltaUnsupported,

    #[error("unsupported pack entry type: {0}")]
    UnsupportedEntryType(u8),

    #[error("truncated pack entry: {0}")]
    TruncatedEntry(String),

    #[error("sha1 sum mismatch: computed {computed}, received {received}")]
    ChecksumMismatch {
        computed: ObjectId,
        received: ObjectId,
    },

    #[error(transparent)]
    Delta(#[from] DeltaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The pack container versions this engine accepts.
///
/// The version is reported in the pack header and changes exactly one
/// behavior: the number of copy-length bytes a delta copy instruction may
/// carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackVersion {
    V2,
    V3,
}

impl PackVersion {
    /// Interpret the 32-bit version field from a pack header.
    pub fn from_wire(version: u32) -> Option<Self> {
        match version {
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    /// How many length bytes a delta copy instruction may gate.
    pub fn copy_len_bytes(self) -> usize {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_from_wire() {
        assert_eq!(PackVersion::from_wire(2), Some(PackVersion::V2));
        assert_eq!(PackVersion::from_wire(3), Some(PackVersion::V3));
        assert_eq!(PackVersion::from_wire(1), None);
        assert_eq!(PackVersion::from_wire(4), None);
        assert_eq!(PackVersion::from_wire(0), None);
    }

    #[test]
    fn copy_len_width_depends_on_version() {
        assert_eq!(PackVersion::V2.copy_len_bytes(), 2);
        assert_eq!(PackVersion::V3.copy_len_bytes(), 3);
    }

    #[test]
    fn checksum_mismatch_message_prefix() {
        let err = ProtocolError::ChecksumMismatch {
            computed: ObjectId::NULL,
            received: ObjectId::NULL,
        };
        assert!(err.to_string().starts_with("sha1 sum mismatch"));
    }
}
