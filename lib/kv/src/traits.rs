use crate::error::KVError;

/// KVStore provides a byte-oriented key-value storage interface.
///
/// Keys follow a namespaced convention, e.g. `schema:customer`. The record
/// layer stores one schema snapshot document per table under such keys.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a key-value pair, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVError>;
}
