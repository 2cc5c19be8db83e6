use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use git2::Oid;
use log::trace;

use crate::error::Result;

/// Maps blob object ids to their raw bytes.
///
/// Populated on a blob's first `open`, evicted on the last matching
/// `release`. The single internal mutex doubles as the "shared data lock"
/// the spec requires around blob `open`/`release`.
pub struct BlobCache {
    data: Mutex<HashMap<Oid, Arc<Vec<u8>>>>,
}

impl BlobCache {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure `oid`'s bytes are cached, loading them with `load` if absent.
    pub fn ensure<F>(&self, oid: Oid, load: F) -> Result<()>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        let mut data = self.data.lock().expect("blob cache poisoned");
        if !data.contains_key(&oid) {
            let bytes = load()?;
            trace!("blob cache miss, loaded {} bytes for {}", bytes.len(), oid);
            data.insert(oid, Arc::new(bytes));
        }
        Ok(())
    }

    pub fn get(&self, oid: &Oid) -> Option<Arc<Vec<u8>>> {
        self.data.lock().expect("blob cache poisoned").get(oid).cloned()
    }

    pub fn evict(&self, oid: &Oid) {
        self.data.lock().expect("blob cache poisoned").remove(oid);
    }
}

impl Default for BlobCache {
    fn default() -> Self {
        Self::new()
    }
}
