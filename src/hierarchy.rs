//! Node paths, groups and user attributes.
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::Error;
use crate::metadata::{ARRAY_METADATA_KEY, ATTRIBUTES_KEY, GROUP_METADATA_KEY};
use crate::storage::{ChunkStore, StorePrefix};

/// Normalize a node path.
///
/// Backslashes become slashes, leading, trailing and repeated slashes are removed,
/// and `.` or `..` segments are rejected. The root is the empty string.
pub fn normalize_path(path: &str) -> crate::Result<String> {
    let path = path.replace('\\', "/");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(Error::InvalidPath(path));
    }
    Ok(segments.join("/"))
}

/// Key prefix of everything stored below a normalized path.
pub fn path_to_prefix(path: &str) -> crate::Result<StorePrefix> {
    if path.is_empty() {
        Ok(StorePrefix::root())
    } else {
        StorePrefix::new(format!("{path}/"))
    }
}

fn node_prefix(path: &str) -> crate::Result<StorePrefix> {
    path_to_prefix(&normalize_path(path)?)
}

pub fn contains_array<S: ChunkStore + ?Sized>(store: &S, path: &str) -> crate::Result<bool> {
    store.contains(&node_prefix(path)?.key(ARRAY_METADATA_KEY)?)
}

pub fn contains_group<S: ChunkStore + ?Sized>(store: &S, path: &str) -> crate::Result<bool> {
    store.contains(&node_prefix(path)?.key(GROUP_METADATA_KEY)?)
}

/// Create a group, writing `.zgroup` at the given path.
///
/// Fails if an array or group already exists there, unless `overwrite` is set,
/// in which case everything below the path is removed first.
pub fn create_group<S: ChunkStore + ?Sized>(
    store: &S,
    path: &str,
    overwrite: bool,
) -> crate::Result<()> {
    let path = normalize_path(path)?;
    let prefix = path_to_prefix(&path)?;
    if overwrite {
        store.delete_prefix(&prefix)?;
    } else if contains_array(store, &path)? {
        return Err(Error::ContainsArray(path));
    } else if contains_group(store, &path)? {
        return Err(Error::ContainsGroup(path));
    }
    let document = serde_json::json!({ "zarr_format": 2 });
    log::debug!("creating group at {path:?}");
    store.set(
        &prefix.key(GROUP_METADATA_KEY)?,
        Bytes::from(serde_json::to_vec_pretty(&document)?),
    )
}

/// Read the `.zattrs` object of a node; absent attributes are empty.
pub fn read_attributes<S: ChunkStore + ?Sized>(
    store: &S,
    path: &str,
) -> crate::Result<Map<String, Value>> {
    let key = node_prefix(path)?.key(ATTRIBUTES_KEY)?;
    let Some(bytes) = store.get(&key)? else {
        return Ok(Map::new());
    };
    match serde_json::from_slice(&bytes)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::general(format!(
            "attributes at {key} are not a JSON object: {other}"
        ))),
    }
}

/// Replace the `.zattrs` object of a node.
pub fn write_attributes<S: ChunkStore + ?Sized>(
    store: &S,
    path: &str,
    attributes: &Map<String, Value>,
) -> crate::Result<()> {
    let key = node_prefix(path)?.key(ATTRIBUTES_KEY)?;
    store.set(&key, Bytes::from(serde_json::to_vec_pretty(attributes)?))
}
