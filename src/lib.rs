//! Chunked N-dimensional arrays stored in the Zarr V2 layout.
//!
//! An array is described by a `.zarray` JSON document and split into chunks,
//! each compressed independently and stored under its own key.
//!
//! ```
//! use std::sync::Arc;
//! use zarr_chunked::{ArrayBuilder, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let array = ArrayBuilder::new(vec![8, 8], "<i4".parse().unwrap())
//!     .chunks([2u64])
//!     .build(store, "")
//!     .unwrap();
//! array.write_element(&[7, 7], 3i32).unwrap();
//! assert_eq!(array.read_element::<i32>(&[7, 7]).unwrap(), 3);
//! assert_eq!(array.read_element::<i32>(&[1, 1]).unwrap(), 0);
//! ```
pub mod array;
pub mod chunk;
pub mod chunk_key_encoding;
pub mod codec;
pub mod data_type;
mod error;
pub mod hierarchy;
pub mod indexing;
pub mod metadata;
pub mod storage;

pub use array::{ArrayBuilder, ArrayData, ChunkedArray};
pub use codec::{CodecRegistry, CompressorConfig};
pub use data_type::{DataType, Element};
pub use indexing::{Selection, Slice};
pub use metadata::{ArrayMetadata, Order};
pub use storage::{ChunkStore, FilesystemStore, MemoryStore};

pub use error::{Error, Result};
