//! The object model shared by the pack parser and the store.
//!
//! An object is a `(type, payload)` pair. Its identity is the SHA-1 of the
//! canonical encoding `"<type> <decimal-len>\0<payload>"`; the id is always
//! derived, never stored separately.

pub mod header;

use bstr::BString;
use packserve_hash::{HashError, Hasher, ObjectId};

/// Errors produced by object encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object type: {0}")]
    InvalidType(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("truncated object: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// The four storable git object types.
///
/// Pack entry type codes 1-4 map onto these; codes 6 (offset delta) and
/// 7 (ref delta) describe transport encodings, not storable types, and are
/// handled by the pack parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectType {
    /// Parse from the type string in a canonical object header.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"commit" => Ok(Self::Commit),
            b"tree" => Ok(Self::Tree),
            b"blob" => Ok(Self::Blob),
            b"tag" => Ok(Self::Tag),
            _ => Err(ObjectError::InvalidType(BString::from(s))),
        }
    }

    /// Map a pack entry type code (1-4) to an object type.
    pub fn from_pack_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Commit),
            2 => Some(Self::Tree),
            3 => Some(Self::Blob),
            4 => Some(Self::Tag),
            _ => None,
        }
    }

    /// The type code used in pack entry headers.
    pub fn pack_code(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
        }
    }

    /// The canonical byte representation.
    pub fn as_bytes(&self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// The canonical string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectType {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

/// An object as the receive pipeline sees it: a type and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub obj_type: ObjectType,
    pub data: Vec<u8>,
}

impl RawObject {
    pub fn new(obj_type: ObjectType, data: Vec<u8>) -> Self {
        Self { obj_type, data }
    }

    /// Compute the id: SHA-1 over the canonical encoding.
    pub fn id(&self) -> Result<ObjectId, HashError> {
        Hasher::hash_object(self.obj_type.as_str(), &self.data)
    }

    /// Serialize to the canonical form (header + payload).
    pub fn to_canonical(&self) -> Vec<u8> {
        let hdr = header::write_header(self.obj_type, self.data.len());
        let mut out = Vec::with_capacity(hdr.len() + self.data.len());
        out.extend_from_slice(&hdr);
        out.extend_from_slice(&self.data);
        out
    }

    /// Parse from canonical form (header + payload).
    pub fn from_canonical(data: &[u8]) -> Result<Self, ObjectError> {
        let (obj_type, content_size, header_len) = header::parse_header(data)?;
        let content = &data[header_len..];
        if content.len() < content_size {
            return Err(ObjectError::Truncated {
                expected: content_size,
                actual: content.len(),
            });
        }
        Ok(Self {
            obj_type,
            data: content[..content_size].to_vec(),
        })
    }
}
