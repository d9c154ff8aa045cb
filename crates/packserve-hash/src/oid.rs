use std::fmt;
use std::str::FromStr;

use crate::{hex, HashError, DIGEST_LEN};

/// A SHA-1 object identifier.
///
/// Appears in two forms: 20 raw bytes on the wire (pack delta base
/// references, pack trailers) and 40 lowercase hex characters in ref
/// advertisements and store keys.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; DIGEST_LEN]);

impl ObjectId {
    /// The null id (all zeros). Used by clients for "create" and "delete"
    /// sides of a ref update command.
    pub const NULL: Self = Self([0u8; DIGEST_LEN]);

    /// Create an id from exactly 20 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != DIGEST_LEN {
            return Err(HashError::InvalidHashLength {
                expected: DIGEST_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Parse an id from its 40-character hex form.
    pub fn from_hex(hex_str: &str) -> Result<Self, HashError> {
        let mut arr = [0u8; DIGEST_LEN];
        hex::decode(hex_str, &mut arr)?;
        Ok(Self(arr))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Whether this is the all-zeros id.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl From<[u8; DIGEST_LEN]> for ObjectId {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn hex_roundtrip() {
        let oid = ObjectId::from_hex(SAMPLE).unwrap();
        assert_eq!(oid.to_hex(), SAMPLE);
        let parsed: ObjectId = SAMPLE.parse().unwrap();
        assert_eq!(parsed, oid);
    }

    #[test]
    fn bytes_roundtrip() {
        let oid = ObjectId::from_hex(SAMPLE).unwrap();
        let again = ObjectId::from_bytes(oid.as_bytes()).unwrap();
        assert_eq!(oid, again);
    }

    #[test]
    fn from_bytes_wrong_length() {
        let err = ObjectId::from_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidHashLength {
                expected: 20,
                actual: 10
            }
        ));
    }

    #[test]
    fn from_hex_wrong_length() {
        assert!(ObjectId::from_hex("abcd").is_err());
    }

    #[test]
    fn null_id() {
        assert!(ObjectId::NULL.is_null());
        assert_eq!(
            ObjectId::NULL.to_hex(),
            "0000000000000000000000000000000000000000"
        );
        assert!(!ObjectId::from_hex(SAMPLE).unwrap().is_null());
    }

    #[test]
    fn debug_shows_short_form() {
        let oid = ObjectId::from_hex(SAMPLE).unwrap();
        assert_eq!(format!("{:?}", oid), "ObjectId(da39a3ee)");
    }

    #[test]
    fn ordering_is_bytewise() {
        let a = ObjectId::from_hex("0000000000000000000000000000000000000001").unwrap();
        let b = ObjectId::from_hex("0000000000000000000000000000000000000002").unwrap();
        assert!(a < b);
    }
}
