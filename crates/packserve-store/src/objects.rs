use packserve_hash::{Hasher, ObjectId};
use packserve_object::{header, ObjectType, RawObject};

use crate::{object_key, BackingStore, StoreError};

/// Content-addressed object access over a locked backing store.
///
/// Objects are stored in canonical form (`"<type> <len>\0<payload>"`) under
/// `object/<40-hex-id>`, where the id is the SHA-1 of exactly those bytes.
pub struct ObjectDb<'a> {
    store: &'a dyn BackingStore,
}

impl<'a> ObjectDb<'a> {
    pub fn new(store: &'a dyn BackingStore) -> Self {
        Self { store }
    }

    /// Persist `(type, payload)` and return the derived id.
    pub fn save(&self, obj_type: ObjectType, payload: &[u8]) -> Result<ObjectId, StoreError> {
        let hdr = header::write_header(obj_type, payload.len());

        let mut hasher = Hasher::new();
        hasher.update(&hdr);
        hasher.update(payload);
        let id = hasher.finalize()?;

        let mut canonical = Vec::with_capacity(hdr.len() + payload.len());
        canonical.extend_from_slice(&hdr);
        canonical.extend_from_slice(payload);

        self.store.set(&object_key(&id), &canonical)?;
        Ok(id)
    }

    /// Load an object by id. A missing key is a load failure.
    pub fn load(&self, id: &ObjectId) -> Result<RawObject, StoreError> {
        let canonical = self.store.get(&object_key(id))?;
        Ok(RawObject::from_canonical(&canonical)?)
    }
}
