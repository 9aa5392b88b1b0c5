use half::f16;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::chunk_key_encoding::ChunkKeySeparator;
use crate::codec::CompressorConfig;
use crate::data_type::{DataKind, DataType, Element, elements_to_ne_bytes};

/// Store key of the array metadata document, relative to the array path.
pub const ARRAY_METADATA_KEY: &str = ".zarray";
/// Store key of the group metadata document, relative to the group path.
pub const GROUP_METADATA_KEY: &str = ".zgroup";
/// Store key of the user attributes document, relative to the node path.
pub const ATTRIBUTES_KEY: &str = ".zattrs";

const ZARR_FORMAT: u64 = 2;

/// Layout of elements within each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Order {
    /// Row-major: the last dimension varies fastest.
    #[default]
    C,
    /// Column-major: the first dimension varies fastest.
    F,
}

/// One component of a requested chunk shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkSize {
    Size(u64),
    /// Span the whole dimension.
    Full,
}

impl From<u64> for ChunkSize {
    fn from(value: u64) -> Self {
        Self::Size(value)
    }
}

impl From<Option<u64>> for ChunkSize {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::Full, Self::Size)
    }
}

/// Resolve a requested chunk shape against the array shape.
///
/// Missing trailing components span their whole dimension.
pub fn normalize_chunks(shape: &[u64], chunks: &[ChunkSize]) -> crate::Result<Vec<u64>> {
    if chunks.len() > shape.len() {
        return Err(Error::invalid_metadata(format!(
            "chunks have {} dimensions but shape has {}",
            chunks.len(),
            shape.len()
        )));
    }
    Ok(shape
        .iter()
        .enumerate()
        .map(|(idx, &len)| match chunks.get(idx).copied().unwrap_or(ChunkSize::Full) {
            ChunkSize::Size(n) => n,
            ChunkSize::Full => len,
        })
        .collect())
}

/// The `fill_value` field of array metadata.
///
/// Non-finite floats are written as the strings `"NaN"`, `"Infinity"` and `"-Infinity"`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum FillValueMetadata {
    /// No fill value; unwritten elements read as zero bytes.
    #[default]
    Null,
    Bool(bool),
    /// Negative integers only; non-negative integers are always [FillValueMetadata::UInt].
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl FillValueMetadata {
    fn integer<T: TryFrom<i64> + TryFrom<u64>>(&self) -> Option<T> {
        match *self {
            Self::Int(i) => <T as TryFrom<i64>>::try_from(i).ok(),
            Self::UInt(u) => <T as TryFrom<u64>>::try_from(u).ok(),
            // `as` saturates, so out-of-range floats must be rejected first
            Self::Float(f) if f.fract() == 0.0 && f < 0.0 && f >= i64::MIN as f64 => {
                <T as TryFrom<i64>>::try_from(f as i64).ok()
            }
            Self::Float(f) if f.fract() == 0.0 && f >= 0.0 && f < u64::MAX as f64 => {
                <T as TryFrom<u64>>::try_from(f as u64).ok()
            }
            _ => None,
        }
    }

    fn float(&self) -> Option<f64> {
        match *self {
            Self::Int(i) => Some(i as f64),
            Self::UInt(u) => Some(u as f64),
            Self::Float(f) => Some(f),
            _ => None,
        }
    }

    /// The fill element as native-endian bytes of the given data type.
    pub fn to_ne_bytes(&self, data_type: &DataType) -> crate::Result<Vec<u8>> {
        fn one<T: Element>(value: Option<T>) -> Option<Vec<u8>> {
            value.map(|v| elements_to_ne_bytes(&[v]))
        }

        let bytes = match (self, data_type.kind(), data_type.size()) {
            (Self::Null, _, size) => Some(vec![0; size]),
            (Self::Bool(b), DataKind::Bool, _) => Some(vec![u8::from(*b)]),
            (Self::Bool(_), _, _) => None,
            (v, DataKind::Bool, _) => one(v.integer::<u8>().filter(|n| *n <= 1).map(|n| n == 1)),
            (v, DataKind::Int, 1) => one(v.integer::<i8>()),
            (v, DataKind::Int, 2) => one(v.integer::<i16>()),
            (v, DataKind::Int, 4) => one(v.integer::<i32>()),
            (v, DataKind::Int, 8) => one(v.integer::<i64>()),
            (v, DataKind::UInt, 1) => one(v.integer::<u8>()),
            (v, DataKind::UInt, 2) => one(v.integer::<u16>()),
            (v, DataKind::UInt, 4) => one(v.integer::<u32>()),
            (v, DataKind::UInt, 8) => one(v.integer::<u64>()),
            (v, DataKind::Float, 2) => one(v.float().map(f16::from_f64)),
            (v, DataKind::Float, 4) => one(v.float().map(|f| f as f32)),
            (v, DataKind::Float, 8) => one(v.float()),
            _ => None,
        };
        bytes.ok_or_else(|| {
            Error::invalid_metadata(format!(
                "fill value {self:?} is not representable as {data_type}"
            ))
        })
    }
}

impl TryFrom<serde_json::Value> for FillValueMetadata {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Ok(Self::UInt(u))
                } else if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else {
                    n.as_f64()
                        .map(Self::Float)
                        .ok_or_else(|| format!("unsupported fill value {n}"))
                }
            }
            Value::String(s) => match s.as_str() {
                "NaN" => Ok(Self::Float(f64::NAN)),
                "Infinity" => Ok(Self::Float(f64::INFINITY)),
                "-Infinity" => Ok(Self::Float(f64::NEG_INFINITY)),
                _ => Err(format!("unsupported fill value string {s:?}")),
            },
            v => Err(format!("unsupported fill value {v}")),
        }
    }
}

impl From<FillValueMetadata> for serde_json::Value {
    fn from(value: FillValueMetadata) -> Self {
        match value {
            FillValueMetadata::Null => Self::Null,
            FillValueMetadata::Bool(b) => Self::Bool(b),
            FillValueMetadata::Int(i) => Self::from(i),
            FillValueMetadata::UInt(u) => Self::from(u),
            FillValueMetadata::Float(f) if f.is_nan() => Self::from("NaN"),
            FillValueMetadata::Float(f) if f == f64::INFINITY => Self::from("Infinity"),
            FillValueMetadata::Float(f) if f == f64::NEG_INFINITY => Self::from("-Infinity"),
            FillValueMetadata::Float(f) => Self::from(f),
        }
    }
}

impl From<bool> for FillValueMetadata {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FillValueMetadata {
    fn from(value: i64) -> Self {
        match u64::try_from(value) {
            Ok(u) => Self::UInt(u),
            Err(_) => Self::Int(value),
        }
    }
}

impl From<i32> for FillValueMetadata {
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}

impl From<u64> for FillValueMetadata {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<u32> for FillValueMetadata {
    fn from(value: u32) -> Self {
        Self::UInt(value.into())
    }
}

impl From<f64> for FillValueMetadata {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for FillValueMetadata {
    fn from(value: f32) -> Self {
        Self::Float(value.into())
    }
}

/// Schema revision of a stored array metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataRevision {
    /// Written before `dimension_separator` existed; chunk keys are always flat.
    Legacy,
    /// Carries an explicit `dimension_separator`.
    Current,
}

impl MetadataRevision {
    pub fn of(document: &serde_json::Map<String, serde_json::Value>) -> Self {
        if document.contains_key("dimension_separator") {
            Self::Current
        } else {
            Self::Legacy
        }
    }
}

/// Bring a raw metadata document up to [MetadataRevision::Current].
///
/// Returns the revision the document had before upgrading.
pub fn upgrade_document(
    document: &mut serde_json::Map<String, serde_json::Value>,
) -> MetadataRevision {
    let revision = MetadataRevision::of(document);
    if revision == MetadataRevision::Legacy {
        document.insert(
            "dimension_separator".into(),
            ChunkKeySeparator::Dot.as_char().to_string().into(),
        );
    }
    revision
}

/// Zarr V2 array metadata, as stored in `.zarray`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub zarr_format: u64,
    /// Length of each dimension.
    pub shape: Vec<u64>,
    /// Length of each dimension of a chunk.
    pub chunks: Vec<u64>,
    pub dtype: DataType,
    /// Chunk compression, or `None` for raw chunks.
    pub compressor: Option<CompressorConfig>,
    pub fill_value: FillValueMetadata,
    pub order: Order,
    /// Must be `None`; filters are not supported.
    pub filters: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub dimension_separator: ChunkKeySeparator,
}

impl ArrayMetadata {
    pub fn new(shape: Vec<u64>, chunks: Vec<u64>, dtype: DataType) -> Self {
        Self {
            zarr_format: ZARR_FORMAT,
            shape,
            chunks,
            dtype,
            compressor: None,
            fill_value: FillValueMetadata::UInt(0),
            order: Order::C,
            filters: None,
            dimension_separator: ChunkKeySeparator::Dot,
        }
    }

    /// Check the invariants which the document structure alone cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        if self.zarr_format != ZARR_FORMAT {
            return Err(Error::invalid_metadata(format!(
                "unsupported zarr_format {}",
                self.zarr_format
            )));
        }
        if self.shape.len() != self.chunks.len() {
            return Err(Error::invalid_metadata(format!(
                "shape {:?} and chunks {:?} have different lengths",
                self.shape, self.chunks
            )));
        }
        for (dim, (&len, &chunk)) in self.shape.iter().zip(&self.chunks).enumerate() {
            if len == 0 {
                return Err(Error::invalid_metadata(format!(
                    "dimension {dim} has zero length"
                )));
            }
            if chunk == 0 || chunk > len {
                return Err(Error::invalid_metadata(format!(
                    "chunk length {chunk} invalid for dimension {dim} of length {len}"
                )));
            }
        }
        let chunk_bytes = self
            .chunks
            .iter()
            .try_fold(self.dtype.size() as u64, |acc, &c| acc.checked_mul(c))
            .and_then(|n| usize::try_from(n).ok());
        if chunk_bytes.is_none() {
            return Err(Error::invalid_metadata(format!(
                "chunks {:?} of {} are too large to address",
                self.chunks, self.dtype
            )));
        }
        if self.filters.as_ref().is_some_and(|f| !f.is_empty()) {
            return Err(Error::invalid_metadata("filters are not supported"));
        }
        self.fill_value.to_ne_bytes(&self.dtype)?;
        Ok(())
    }

    /// Serialize to the JSON document stored under [ARRAY_METADATA_KEY].
    pub fn to_document(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse, upgrade and validate a metadata document.
    pub fn from_document(document: serde_json::Value) -> crate::Result<Self> {
        let serde_json::Value::Object(mut map) = document else {
            return Err(Error::invalid_metadata("metadata document is not a JSON object"));
        };
        upgrade_document(&mut map);
        let out: Self = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| Error::invalid_metadata(e.to_string()))?;
        out.validate()?;
        Ok(out)
    }

    pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
        let document: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| Error::invalid_metadata(e.to_string()))?;
        Self::from_document(document)
    }

    /// Number of chunks along each dimension.
    pub fn chunk_grid_shape(&self) -> Vec<u64> {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(len, chunk)| len.div_ceil(*chunk))
            .collect()
    }

    /// Number of elements in one chunk.
    pub fn chunk_num_elements(&self) -> usize {
        self.chunks.iter().product::<u64>() as usize
    }
}
