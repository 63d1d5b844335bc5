use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::KVError;
use crate::traits::KVStore;

/// In-memory KVStore. Nothing is persisted; mostly useful for tests and
/// throwaway databases.
#[derive(Default)]
pub struct MemStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KVStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let data = self
            .data
            .read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        let mut data = self
            .data
            .write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        data.remove(key);
        Ok(())
    }
}
