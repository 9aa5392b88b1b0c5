use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::Error;

mod filesystem;
mod memory;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

/// Validated key of a single value in a store.
///
/// Keys are `/`-separated, with no leading or trailing `/`,
/// and no empty, `.` or `..` segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey(String);

impl StoreKey {
    pub fn new(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.is_empty() || key.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
            return Err(Error::InvalidKey(key));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key falls under the given prefix.
    pub fn has_prefix(&self, prefix: &StorePrefix) -> bool {
        self.0.starts_with(prefix.as_str())
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated key prefix: either empty (the store root) or ending in `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StorePrefix(String);

impl StorePrefix {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(prefix: impl Into<String>) -> crate::Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Ok(Self(prefix));
        }
        match prefix.strip_suffix('/') {
            Some(stem) if StoreKey::new(stem).is_ok() => Ok(Self(prefix)),
            _ => Err(Error::InvalidKey(prefix)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a relative key to this prefix.
    pub fn key(&self, suffix: &str) -> crate::Result<StoreKey> {
        StoreKey::new(format!("{}{suffix}", self.0))
    }
}

impl fmt::Display for StorePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key/value byte storage backing arrays and groups.
///
/// Replacing a value with [ChunkStore::set] is atomic with respect to readers of that key;
/// there is no coordination across keys.
pub trait ChunkStore: Send + Sync {
    /// Fetch a value, or `None` if the key is absent.
    fn get(&self, key: &StoreKey) -> crate::Result<Option<Bytes>>;

    /// Store a value, replacing any existing one.
    fn set(&self, key: &StoreKey, value: Bytes) -> crate::Result<()>;

    /// Remove a value. Removing an absent key succeeds.
    fn delete(&self, key: &StoreKey) -> crate::Result<()>;

    /// All keys under the prefix, sorted.
    fn list_prefix(&self, prefix: &StorePrefix) -> crate::Result<Vec<StoreKey>>;

    fn contains(&self, key: &StoreKey) -> crate::Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove every key under the prefix.
    fn delete_prefix(&self, prefix: &StorePrefix) -> crate::Result<()> {
        for key in self.list_prefix(prefix)? {
            self.delete(&key)?;
        }
        Ok(())
    }
}

impl<S: ChunkStore + ?Sized> ChunkStore for Arc<S> {
    fn get(&self, key: &StoreKey) -> crate::Result<Option<Bytes>> {
        (**self).get(key)
    }

    fn set(&self, key: &StoreKey, value: Bytes) -> crate::Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &StoreKey) -> crate::Result<()> {
        (**self).delete(key)
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> crate::Result<Vec<StoreKey>> {
        (**self).list_prefix(prefix)
    }

    fn contains(&self, key: &StoreKey) -> crate::Result<bool> {
        (**self).contains(key)
    }
}

impl<S: ChunkStore + ?Sized> ChunkStore for &S {
    fn get(&self, key: &StoreKey) -> crate::Result<Option<Bytes>> {
        (**self).get(key)
    }

    fn set(&self, key: &StoreKey, value: Bytes) -> crate::Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &StoreKey) -> crate::Result<()> {
        (**self).delete(key)
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> crate::Result<Vec<StoreKey>> {
        (**self).list_prefix(prefix)
    }

    fn contains(&self, key: &StoreKey) -> crate::Result<bool> {
        (**self).contains(key)
    }
}
