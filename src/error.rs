pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The array descriptor is malformed or internally inconsistent.
    #[error("invalid array metadata: {0}")]
    InvalidMetadata(String),
    #[error("unknown codec: {0}")]
    UnknownCodec(String),
    #[error("invalid configuration for codec {id}: {message}")]
    InvalidCodecConfiguration { id: String, message: String },
    /// The underlying compression library failed, usually on corrupt input.
    #[error("codec {id} failed: {source}")]
    Codec {
        id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("store I/O failed for key {key}: {source}")]
    StoreIo {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("index {index} out of bounds for dimension {dim} with length {length}")]
    IndexOutOfBounds { dim: usize, index: i64, length: u64 },
    #[error("too many indices for array; expected {expected}, got {got}")]
    TooManyIndices { expected: usize, got: usize },
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("element type {requested} does not match array data type {actual}")]
    DataTypeMismatch { requested: String, actual: String },
    /// Lengths are in elements for typed writes and in bytes for raw writes.
    #[error("value length mismatch: expected {expected}, got {got}")]
    ValueLength { expected: usize, got: usize },
    #[error("chunk {key} decoded to {got} bytes, expected {expected}")]
    InvalidChunk {
        key: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid store key: {0:?}")]
    InvalidKey(String),
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("array not found at path {0:?}")]
    ArrayNotFound(String),
    #[error("path {0:?} contains an array")]
    ContainsArray(String),
    #[error("path {0:?} contains a group")]
    ContainsGroup(String),
    #[error("array at path {0:?} is read-only")]
    ReadOnly(String),
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Self::InvalidMetadata(message.into())
    }

    pub(crate) fn store_io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::StoreIo {
            key: key.into(),
            source,
        }
    }
}
