use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::storage::{StoreKey, StorePrefix};

/// Delimiter between chunk coordinate components in a chunk key.
///
/// `.` gives a flat layout (`0.3`), `/` a nested directory layout (`0/3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChunkKeySeparator {
    #[default]
    #[serde(rename = ".")]
    Dot,
    #[serde(rename = "/")]
    Slash,
}

impl ChunkKeySeparator {
    pub fn as_char(self) -> char {
        match self {
            ChunkKeySeparator::Dot => '.',
            ChunkKeySeparator::Slash => '/',
        }
    }

    /// Key of the chunk at the given grid coordinates, below `prefix`.
    ///
    /// Zero-dimensional arrays have a single chunk with key `0`.
    pub fn encode(self, prefix: &StorePrefix, chunk_grid_indices: &[u64]) -> StoreKey {
        let mut s = String::with_capacity(prefix.as_str().len() + chunk_grid_indices.len() * 2);
        s.push_str(prefix.as_str());
        if chunk_grid_indices.is_empty() {
            s.push('0');
        }
        let mut is_first = true;
        for idx in chunk_grid_indices {
            if is_first {
                is_first = false;
            } else {
                s.push(self.as_char());
            }
            write!(s, "{idx}").unwrap();
        }
        StoreKey::new(s).expect("chunk key should be valid")
    }
}
