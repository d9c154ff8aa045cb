use std::collections::BTreeMap;

use bstr::ByteSlice;
use packserve_hash::ObjectId;

use crate::{BackingStore, StoreError, REFS_KEY};

/// The complete set of refs for one repository.
///
/// Persisted under the reserved `refs` key as one `"<40-hex> <name>"` line
/// per ref, sorted by name. The ordering makes serialization stable and the
/// ref advertisement deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefMap {
    refs: BTreeMap<String, ObjectId>,
}

impl RefMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ObjectId> {
        self.refs.get(name).copied()
    }

    pub fn set(&mut self, name: &str, id: ObjectId) {
        self.refs.insert(name.to_string(), id);
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Iterate `(name, id)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ObjectId)> {
        self.refs.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Serialize to the textual blob form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, id) in &self.refs {
            out.extend_from_slice(id.to_hex().as_bytes());
            out.push(b' ');
            out.extend_from_slice(name.as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// Parse the textual blob form. An empty blob is the empty map.
    pub fn deserialize(data: &[u8]) -> Result<Self, StoreError> {
        let mut map = Self::new();
        for line in data.lines() {
            if line.is_empty() {
                continue;
            }
            let space = line
                .find_byte(b' ')
                .ok_or_else(|| StoreError::RefMapParse("missing space in ref line".into()))?;
            let hex = std::str::from_utf8(&line[..space])
                .map_err(|_| StoreError::RefMapParse("non-ASCII ref id".into()))?;
            let id = ObjectId::from_hex(hex)?;
            let name = std::str::from_utf8(&line[space + 1..])
                .map_err(|_| StoreError::RefMapParse("invalid UTF-8 in ref name".into()))?;
            map.set(name, id);
        }
        Ok(map)
    }

    /// Load the ref map from a locked store. A missing blob is the empty map.
    pub fn load(store: &dyn BackingStore) -> Result<Self, StoreError> {
        match store.get(REFS_KEY) {
            Ok(data) => Self::deserialize(&data),
            Err(StoreError::KeyNotFound(_)) => Ok(Self::new()),
            Err(e) => Err(e),
        }
    }

    /// Persist the ref map to a locked store as a single blob.
    pub fn save(&self, store: &dyn BackingStore) -> Result<(), StoreError> {
        store.set(REFS_KEY, &self.serialize())
    }
}
