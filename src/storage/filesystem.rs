use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;

use super::{ChunkStore, StoreKey, StorePrefix};
use crate::Error;

/// Store mapping each key to a file below a root directory.
///
/// Key segments become path components, so `a/0/1` is stored at `<root>/a/0/1`.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Open a store rooted at the given directory, creating it if necessary.
    pub fn new(root: impl AsRef<Path>) -> crate::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| Error::store_io(root.to_string_lossy(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key_to_path(&self, key: &StoreKey) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(key.as_str().split('/'));
        path
    }

    fn collect_keys(&self, dir: &Path, rel: &str, out: &mut Vec<StoreKey>) -> crate::Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::store_io(rel, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| Error::store_io(rel, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                log::warn!("skipping non-UTF-8 path in store: {:?}", entry.path());
                continue;
            };
            let key = format!("{rel}{name}");
            let file_type = entry.file_type().map_err(|e| Error::store_io(&key, e))?;
            if file_type.is_dir() {
                self.collect_keys(&entry.path(), &format!("{key}/"), out)?;
            } else {
                out.push(StoreKey::new(key)?);
            }
        }
        Ok(())
    }
}

impl ChunkStore for FilesystemStore {
    fn get(&self, key: &StoreKey) -> crate::Result<Option<Bytes>> {
        let path = self.key_to_path(key);
        match fs::read(&path) {
            Ok(v) => Ok(Some(Bytes::from(v))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            // a nested chunk directory shares its name with no value
            Err(_) if path.is_dir() => Ok(None),
            Err(e) => Err(Error::store_io(key.as_str(), e)),
        }
    }

    fn set(&self, key: &StoreKey, value: Bytes) -> crate::Result<()> {
        let path = self.key_to_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::store_io(key.as_str(), e))?;
        }

        log::trace!("writing {} bytes to {}", value.len(), path.display());
        let parent = path.parent().unwrap_or(&self.root);
        let mut file =
            NamedTempFile::new_in(parent).map_err(|e| Error::store_io(key.as_str(), e))?;
        file.write_all(&value)
            .map_err(|e| Error::store_io(key.as_str(), e))?;
        file.persist(&path)
            .map_err(|e| Error::store_io(key.as_str(), e.error))?;
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> crate::Result<()> {
        match fs::remove_file(self.key_to_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::store_io(key.as_str(), e)),
        }
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> crate::Result<Vec<StoreKey>> {
        let mut dir = self.root.clone();
        dir.extend(prefix.as_str().split('/').filter(|s| !s.is_empty()));
        let mut out = Vec::new();
        self.collect_keys(&dir, prefix.as_str(), &mut out)?;
        out.sort();
        Ok(out)
    }
}
