use std::collections::BTreeMap;
use std::sync::RwLock;

use bytes::Bytes;

use super::{ChunkStore, StoreKey, StorePrefix};

/// Store holding all values in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<BTreeMap<StoreKey, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A poisoned lock can only come from a panic inside one of the short critical
    // sections below, none of which leave the map half-updated.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<StoreKey, Bytes>> {
        self.values.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<StoreKey, Bytes>> {
        self.values.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChunkStore for MemoryStore {
    fn get(&self, key: &StoreKey) -> crate::Result<Option<Bytes>> {
        Ok(self.read().get(key).cloned())
    }

    fn set(&self, key: &StoreKey, value: Bytes) -> crate::Result<()> {
        self.write().insert(key.clone(), value);
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> crate::Result<()> {
        self.write().remove(key);
        Ok(())
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> crate::Result<Vec<StoreKey>> {
        Ok(self
            .read()
            .keys()
            .filter(|k| k.has_prefix(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> StoreKey {
        StoreKey::new(s).unwrap()
    }

    #[test]
    fn get_set_delete() {
        let store = MemoryStore::new();
        assert!(store.get(&key("a/b")).unwrap().is_none());

        store.set(&key("a/b"), Bytes::from_static(b"xyz")).unwrap();
        assert_eq!(store.get(&key("a/b")).unwrap().unwrap(), &b"xyz"[..]);
        assert!(store.contains(&key("a/b")).unwrap());

        store.set(&key("a/b"), Bytes::from_static(b"q")).unwrap();
        assert_eq!(store.get(&key("a/b")).unwrap().unwrap(), &b"q"[..]);

        store.delete(&key("a/b")).unwrap();
        store.delete(&key("a/b")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn list_and_delete_prefix() {
        let store = MemoryStore::new();
        for k in ["x/.zarray", "x/0.0", "x/0.1", "xy/0.0", "y/.zgroup"] {
            store.set(&key(k), Bytes::new()).unwrap();
        }
        let listed: Vec<_> = store
            .list_prefix(&StorePrefix::new("x/").unwrap())
            .unwrap()
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(listed, vec!["x/.zarray", "x/0.0", "x/0.1"]);
        assert_eq!(store.list_prefix(&StorePrefix::root()).unwrap().len(), 5);

        store.delete_prefix(&StorePrefix::new("x/").unwrap()).unwrap();
        assert_eq!(store.len(), 2);
    }
}
