use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::Error;
use crate::chunk::Chunk;
use crate::chunk_key_encoding::ChunkKeySeparator;
use crate::codec::{Codec, CodecRegistry, CompressorConfig};
use crate::data_type::{DataType, Element, elements_from_ne_bytes, elements_to_ne_bytes};
use crate::hierarchy::{
    contains_array, contains_group, normalize_path, path_to_prefix, read_attributes,
    write_attributes,
};
use crate::indexing::{BasicIndexer, Selection};
use crate::metadata::{
    ARRAY_METADATA_KEY, ArrayMetadata, ChunkSize, FillValueMetadata, MetadataRevision, Order,
    normalize_chunks, upgrade_document,
};
use crate::storage::{ChunkStore, StoreKey, StorePrefix};

/// Elements read from an array, in C order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData<T> {
    shape: Vec<u64>,
    data: Vec<T>,
}

impl<T> ArrayData<T> {
    pub fn new(shape: Vec<u64>, data: Vec<T>) -> crate::Result<Self> {
        let expected = shape.iter().product::<u64>() as usize;
        if expected != data.len() {
            return Err(Error::ValueLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// The element at the given position, if in bounds.
    pub fn get(&self, indices: &[u64]) -> Option<&T> {
        if indices.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0u64;
        for (&idx, &len) in indices.iter().zip(&self.shape) {
            if idx >= len {
                return None;
            }
            offset = offset * len + idx;
        }
        self.data.get(offset as usize)
    }
}

/// Configuration of a new array.
#[derive(Debug, Clone)]
pub struct ArrayBuilder {
    shape: Vec<u64>,
    chunks: Vec<ChunkSize>,
    data_type: DataType,
    fill_value: FillValueMetadata,
    order: Order,
    compressor: Option<CompressorConfig>,
    dimension_separator: ChunkKeySeparator,
    attributes: Option<Map<String, Value>>,
    overwrite: bool,
    codec_registry: Option<Arc<CodecRegistry>>,
}

impl ArrayBuilder {
    /// A single-chunk, uncompressed, C-order array with fill value 0.
    pub fn new(shape: Vec<u64>, data_type: DataType) -> Self {
        Self {
            shape,
            chunks: Vec::new(),
            data_type,
            fill_value: FillValueMetadata::UInt(0),
            order: Order::C,
            compressor: None,
            dimension_separator: ChunkKeySeparator::Dot,
            attributes: None,
            overwrite: false,
            codec_registry: None,
        }
    }

    /// Chunk shape; missing trailing components span their whole dimension.
    pub fn chunks(mut self, chunks: impl IntoIterator<Item = impl Into<ChunkSize>>) -> Self {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    pub fn fill_value(mut self, fill_value: impl Into<FillValueMetadata>) -> Self {
        self.fill_value = fill_value.into();
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn compressor(mut self, compressor: Option<CompressorConfig>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn dimension_separator(mut self, separator: ChunkKeySeparator) -> Self {
        self.dimension_separator = separator;
        self
    }

    pub fn attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Replace any existing node at the path instead of failing.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn codec_registry(mut self, registry: Arc<CodecRegistry>) -> Self {
        self.codec_registry = Some(registry);
        self
    }

    pub fn build_metadata(&self) -> crate::Result<ArrayMetadata> {
        let chunks = normalize_chunks(&self.shape, &self.chunks)?;
        let mut metadata = ArrayMetadata::new(self.shape.clone(), chunks, self.data_type);
        metadata.fill_value = self.fill_value;
        metadata.order = self.order;
        metadata.compressor = self.compressor.clone();
        metadata.dimension_separator = self.dimension_separator;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Persist the metadata at `path` and return the new array.
    pub fn build<S: ChunkStore + ?Sized>(
        &self,
        store: Arc<S>,
        path: &str,
    ) -> crate::Result<ChunkedArray<S>> {
        let path = normalize_path(path)?;
        let prefix = path_to_prefix(&path)?;
        let metadata = self.build_metadata()?;

        if self.overwrite {
            store.delete_prefix(&prefix)?;
        } else if contains_array(&*store, &path)? {
            return Err(Error::ContainsArray(path));
        } else if contains_group(&*store, &path)? {
            return Err(Error::ContainsGroup(path));
        }

        log::debug!(
            "creating array at {path:?}: shape {:?}, chunks {:?}, dtype {}",
            metadata.shape,
            metadata.chunks,
            metadata.dtype
        );
        store.set(
            &prefix.key(ARRAY_METADATA_KEY)?,
            Bytes::from(metadata.to_json()?),
        )?;
        if let Some(attributes) = &self.attributes {
            write_attributes(&*store, &path, attributes)?;
        }

        let registry = self
            .codec_registry
            .clone()
            .unwrap_or_else(CodecRegistry::global);
        ChunkedArray::new(store, path, metadata, registry, false)
    }
}

/// An N-dimensional array backed by independently stored chunks.
#[derive(Debug)]
pub struct ChunkedArray<S: ?Sized> {
    store: Arc<S>,
    path: String,
    prefix: StorePrefix,
    metadata: ArrayMetadata,
    /// One element in stored byte order.
    fill_element: Vec<u8>,
    registry: Arc<CodecRegistry>,
    codec: OnceLock<Arc<dyn Codec>>,
    read_only: bool,
}

impl<S: ChunkStore + ?Sized> ChunkedArray<S> {
    fn new(
        store: Arc<S>,
        path: String,
        metadata: ArrayMetadata,
        registry: Arc<CodecRegistry>,
        read_only: bool,
    ) -> crate::Result<Self> {
        let prefix = path_to_prefix(&path)?;
        let mut fill_element = metadata.fill_value.to_ne_bytes(&metadata.dtype)?;
        metadata.dtype.swap_bytes(&mut fill_element);
        Ok(Self {
            store,
            path,
            prefix,
            metadata,
            fill_element,
            registry,
            codec: OnceLock::new(),
            read_only,
        })
    }

    /// Open an existing array.
    pub fn open(store: Arc<S>, path: &str) -> crate::Result<Self> {
        Self::open_with(store, path, CodecRegistry::global(), false)
    }

    /// Open an existing array, rejecting all writes.
    pub fn open_read_only(store: Arc<S>, path: &str) -> crate::Result<Self> {
        Self::open_with(store, path, CodecRegistry::global(), true)
    }

    /// Open an existing array, resolving its compressor from the given registry.
    pub fn open_with(
        store: Arc<S>,
        path: &str,
        registry: Arc<CodecRegistry>,
        read_only: bool,
    ) -> crate::Result<Self> {
        let path = normalize_path(path)?;
        let key = path_to_prefix(&path)?.key(ARRAY_METADATA_KEY)?;
        let Some(bytes) = store.get(&key)? else {
            if contains_group(&*store, &path)? {
                return Err(Error::ContainsGroup(path));
            }
            return Err(Error::ArrayNotFound(path));
        };
        let metadata = ArrayMetadata::from_json(&bytes)?;
        log::debug!(
            "opened array at {path:?}: shape {:?}, chunks {:?}, dtype {}",
            metadata.shape,
            metadata.chunks,
            metadata.dtype
        );
        Self::new(store, path, metadata, registry, read_only)
    }

    /// Rewrite a legacy `.zarray` document with an explicit `dimension_separator`.
    ///
    /// Returns the revision the stored document had. Current documents are left untouched.
    pub fn upgrade_metadata(store: &S, path: &str) -> crate::Result<MetadataRevision> {
        let path = normalize_path(path)?;
        let key = path_to_prefix(&path)?.key(ARRAY_METADATA_KEY)?;
        let bytes = store.get(&key)?.ok_or(Error::ArrayNotFound(path))?;
        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::invalid_metadata(e.to_string()))?;
        let Value::Object(mut map) = document else {
            return Err(Error::invalid_metadata("metadata document is not a JSON object"));
        };
        let revision = upgrade_document(&mut map);
        if revision == MetadataRevision::Legacy {
            let upgraded = Value::Object(map);
            ArrayMetadata::from_document(upgraded.clone())?;
            log::warn!("upgrading legacy array metadata at {key}");
            store.set(&key, Bytes::from(serde_json::to_vec_pretty(&upgraded)?))?;
        }
        Ok(revision)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Normalized path of the array within its store.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    pub fn shape(&self) -> &[u64] {
        &self.metadata.shape
    }

    pub fn chunk_shape(&self) -> &[u64] {
        &self.metadata.chunks
    }

    pub fn data_type(&self) -> &DataType {
        &self.metadata.dtype
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of chunks along each dimension.
    pub fn chunk_grid_shape(&self) -> Vec<u64> {
        self.metadata.chunk_grid_shape()
    }

    pub fn num_chunks(&self) -> u64 {
        self.chunk_grid_shape().iter().product()
    }

    /// Store key of the chunk at the given grid coordinates.
    pub fn chunk_key(&self, chunk_coords: &[u64]) -> crate::Result<StoreKey> {
        let grid = self.chunk_grid_shape();
        if chunk_coords.len() != grid.len() {
            return Err(Error::TooManyIndices {
                expected: grid.len(),
                got: chunk_coords.len(),
            });
        }
        for (dim, (&idx, &len)) in chunk_coords.iter().zip(&grid).enumerate() {
            if idx >= len {
                return Err(Error::IndexOutOfBounds {
                    dim,
                    index: i64::try_from(idx).unwrap_or(i64::MAX),
                    length: len,
                });
            }
        }
        Ok(self
            .metadata
            .dimension_separator
            .encode(&self.prefix, chunk_coords))
    }

    /// The array's codec, created on first use.
    fn codec(&self) -> crate::Result<Option<Arc<dyn Codec>>> {
        let Some(config) = &self.metadata.compressor else {
            return Ok(None);
        };
        if let Some(codec) = self.codec.get() {
            return Ok(Some(codec.clone()));
        }
        let codec = self.registry.codec(config)?;
        Ok(Some(self.codec.get_or_init(|| codec).clone()))
    }

    fn fill_chunk(&self) -> Chunk {
        Chunk::filled(&self.metadata.chunks, self.metadata.order, &self.fill_element)
    }

    /// The stored, still encoded bytes of a chunk, or `None` if it was never written.
    pub fn retrieve_encoded_chunk(&self, chunk_coords: &[u64]) -> crate::Result<Option<Bytes>> {
        self.store.get(&self.chunk_key(chunk_coords)?)
    }

    /// Decoded chunk contents; an absent chunk is filled with the fill value.
    pub fn retrieve_chunk(&self, chunk_coords: &[u64]) -> crate::Result<Chunk> {
        let key = self.chunk_key(chunk_coords)?;
        let Some(encoded) = self.store.get(&key)? else {
            log::trace!("chunk {key} absent, using fill value");
            return Ok(self.fill_chunk());
        };
        log::trace!("fetched chunk {key} ({} bytes)", encoded.len());
        let decoded = match self.codec()? {
            Some(codec) => codec.decode(&encoded)?,
            None => encoded.to_vec(),
        };
        let item_size = self.metadata.dtype.size();
        Chunk::from_bytes(decoded, &self.metadata.chunks, self.metadata.order, item_size).map_err(
            |bytes| Error::InvalidChunk {
                key: key.to_string(),
                expected: self.metadata.chunk_num_elements() * item_size,
                got: bytes.len(),
            },
        )
    }

    fn store_chunk(&self, chunk_coords: &[u64], chunk: Chunk) -> crate::Result<()> {
        let key = self.chunk_key(chunk_coords)?;
        let encoded = match self.codec()? {
            Some(codec) => codec.encode(chunk.as_bytes())?,
            None => chunk.into_bytes(),
        };
        log::trace!("storing chunk {key} ({} bytes)", encoded.len());
        self.store.set(&key, Bytes::from(encoded))
    }

    fn indexer(&self, selection: &Selection) -> crate::Result<BasicIndexer> {
        BasicIndexer::new(selection, &self.metadata.shape, &self.metadata.chunks)
    }

    /// Read a selection as native-endian bytes, returning the result shape alongside.
    pub fn read_bytes(&self, selection: impl Into<Selection>) -> crate::Result<(Vec<u64>, Vec<u8>)> {
        let indexer = self.indexer(&selection.into())?;
        let region_shape = indexer.region_shape();
        let mut out = vec![0u8; indexer.num_elements() as usize * self.metadata.dtype.size()];
        for projection in indexer.projections() {
            let chunk = self.retrieve_chunk(&projection.chunk_coords)?;
            chunk.read_region(&projection, &region_shape, &mut out);
        }
        self.metadata.dtype.swap_bytes(&mut out);
        Ok((indexer.shape(), out))
    }

    /// Read a selection as elements of type `T`, which must match the data type.
    pub fn read<T: Element>(&self, selection: impl Into<Selection>) -> crate::Result<ArrayData<T>> {
        self.metadata.dtype.check_element::<T>()?;
        let (shape, bytes) = self.read_bytes(selection)?;
        ArrayData::new(shape, elements_from_ne_bytes(&bytes))
    }

    /// Read the single element at the given position.
    pub fn read_element<T: Element>(&self, indices: &[u64]) -> crate::Result<T> {
        self.check_element_indices(indices)?;
        let data = self.read::<T>(indices)?.into_data();
        data.into_iter()
            .next()
            .ok_or_else(|| Error::general("element read returned no data"))
    }

    fn check_element_indices(&self, indices: &[u64]) -> crate::Result<()> {
        if indices.len() != self.metadata.shape.len() {
            return Err(Error::InvalidSelection(format!(
                "element index needs {} coordinates, got {}",
                self.metadata.shape.len(),
                indices.len()
            )));
        }
        Ok(())
    }

    fn check_writable(&self) -> crate::Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly(self.path.clone()));
        }
        Ok(())
    }

    /// Overlay native-endian `bytes` onto every chunk the selection touches.
    fn write_selection(&self, indexer: &BasicIndexer, bytes: &[u8]) -> crate::Result<()> {
        let mut stored = bytes.to_vec();
        self.metadata.dtype.swap_bytes(&mut stored);
        let region_shape = indexer.region_shape();
        for projection in indexer.projections() {
            let mut chunk = if indexer.covers_chunk(&projection) {
                self.fill_chunk()
            } else {
                self.retrieve_chunk(&projection.chunk_coords)?
            };
            chunk.write_region(&projection, &region_shape, &stored);
            self.store_chunk(&projection.chunk_coords, chunk)?;
        }
        Ok(())
    }

    /// Write native-endian bytes, laid out in C order over the selection.
    pub fn write_bytes(&self, selection: impl Into<Selection>, bytes: &[u8]) -> crate::Result<()> {
        self.check_writable()?;
        let indexer = self.indexer(&selection.into())?;
        let expected = indexer.num_elements() as usize * self.metadata.dtype.size();
        if bytes.len() != expected {
            return Err(Error::ValueLength {
                expected,
                got: bytes.len(),
            });
        }
        log::debug!(
            "writing {} elements to array {:?}",
            indexer.num_elements(),
            self.path
        );
        self.write_selection(&indexer, bytes)
    }

    /// Write elements of type `T`, laid out in C order over the selection.
    pub fn write<T: Element>(&self, selection: impl Into<Selection>, values: &[T]) -> crate::Result<()> {
        self.check_writable()?;
        self.metadata.dtype.check_element::<T>()?;
        let indexer = self.indexer(&selection.into())?;
        let expected = indexer.num_elements() as usize;
        if values.len() != expected {
            return Err(Error::ValueLength {
                expected,
                got: values.len(),
            });
        }
        log::debug!("writing {expected} elements to array {:?}", self.path);
        self.write_selection(&indexer, &elements_to_ne_bytes(values))
    }

    /// Write a single element.
    pub fn write_element<T: Element>(&self, indices: &[u64], value: T) -> crate::Result<()> {
        self.check_element_indices(indices)?;
        self.write(indices, &[value])
    }

    /// Set every element of the selection to `value`.
    pub fn fill<T: Element>(&self, selection: impl Into<Selection>, value: T) -> crate::Result<()> {
        self.check_writable()?;
        self.metadata.dtype.check_element::<T>()?;
        let indexer = self.indexer(&selection.into())?;
        let values = vec![value; indexer.num_elements() as usize];
        self.write_selection(&indexer, &elements_to_ne_bytes(&values))
    }

    /// User attributes stored in `.zattrs`.
    pub fn attributes(&self) -> crate::Result<Map<String, Value>> {
        read_attributes(&*self.store, &self.path)
    }

    pub fn set_attributes(&self, attributes: &Map<String, Value>) -> crate::Result<()> {
        self.check_writable()?;
        write_attributes(&*self.store, &self.path, attributes)
    }
}
