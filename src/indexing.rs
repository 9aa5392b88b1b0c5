//! Selections over an array and their projection onto chunks.
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::Error;

/// A strided range along one dimension.
///
/// Negative bounds count back from the end of the dimension.
/// `None` bounds span to the corresponding end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: u64,
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    pub fn all() -> Self {
        Self::new(None, None)
    }

    pub fn with_step(self, step: u64) -> Self {
        Self { step, ..self }
    }
}

/// Selection along a single dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimSelection {
    /// A single index; the dimension is dropped from the result shape.
    Index(i64),
    Slice(Slice),
}

impl From<i64> for DimSelection {
    fn from(value: i64) -> Self {
        Self::Index(value)
    }
}

impl From<Slice> for DimSelection {
    fn from(value: Slice) -> Self {
        Self::Slice(value)
    }
}

impl From<Range<i64>> for DimSelection {
    fn from(value: Range<i64>) -> Self {
        Self::Slice(Slice::new(Some(value.start), Some(value.end)))
    }
}

impl From<RangeFrom<i64>> for DimSelection {
    fn from(value: RangeFrom<i64>) -> Self {
        Self::Slice(Slice::new(Some(value.start), None))
    }
}

impl From<RangeTo<i64>> for DimSelection {
    fn from(value: RangeTo<i64>) -> Self {
        Self::Slice(Slice::new(None, Some(value.end)))
    }
}

impl From<RangeFull> for DimSelection {
    fn from(_: RangeFull) -> Self {
        Self::Slice(Slice::all())
    }
}

/// Selection over a whole array.
///
/// Dimensions beyond the given selectors are selected in full.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(Vec<DimSelection>);

impl Selection {
    pub fn new(dims: Vec<DimSelection>) -> Self {
        Self(dims)
    }

    /// Select every element.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn dims(&self) -> &[DimSelection] {
        &self.0
    }
}

impl From<Vec<DimSelection>> for Selection {
    fn from(value: Vec<DimSelection>) -> Self {
        Self(value)
    }
}

impl<const N: usize> From<[DimSelection; N]> for Selection {
    fn from(value: [DimSelection; N]) -> Self {
        Self(value.to_vec())
    }
}

/// A single element.
impl From<&[u64]> for Selection {
    fn from(value: &[u64]) -> Self {
        Self(
            value
                .iter()
                .map(|&i| DimSelection::Index(i.try_into().unwrap_or(i64::MAX)))
                .collect(),
        )
    }
}

/// Build a [Selection] from per-dimension selectors.
///
/// ```
/// use zarr_chunked::sel;
/// let s = sel![0, 2..6, ..];
/// assert_eq!(s.dims().len(), 3);
/// ```
#[macro_export]
macro_rules! sel {
    ($($dim:expr),* $(,)?) => {
        $crate::indexing::Selection::new(vec![$($crate::indexing::DimSelection::from($dim)),*])
    };
}

/// A normalized selection along one dimension.
#[derive(Debug, Clone, Copy)]
struct DimIndexer {
    start: u64,
    stop: u64,
    step: u64,
    num_items: u64,
    dim_len: u64,
    chunk_len: u64,
    drop: bool,
}

fn normalize_bound(dim: usize, bound: i64, dim_len: u64) -> crate::Result<u64> {
    let out_of_bounds = Error::IndexOutOfBounds {
        dim,
        index: bound,
        length: dim_len,
    };
    let adjusted = if bound < 0 {
        i128::from(dim_len) + i128::from(bound)
    } else {
        i128::from(bound)
    };
    if adjusted < 0 || adjusted > i128::from(dim_len) {
        return Err(out_of_bounds);
    }
    Ok(adjusted as u64)
}

impl DimIndexer {
    fn new(dim: usize, selection: DimSelection, dim_len: u64, chunk_len: u64) -> crate::Result<Self> {
        match selection {
            DimSelection::Index(index) => {
                let idx = normalize_bound(dim, index, dim_len)?;
                if idx == dim_len {
                    return Err(Error::IndexOutOfBounds {
                        dim,
                        index,
                        length: dim_len,
                    });
                }
                Ok(Self {
                    start: idx,
                    stop: idx + 1,
                    step: 1,
                    num_items: 1,
                    dim_len,
                    chunk_len,
                    drop: true,
                })
            }
            DimSelection::Slice(slice) => {
                if slice.step == 0 {
                    return Err(Error::InvalidSelection("slice step cannot be zero".into()));
                }
                let start = match slice.start {
                    Some(s) => normalize_bound(dim, s, dim_len)?,
                    None => 0,
                };
                let stop = match slice.stop {
                    Some(s) => normalize_bound(dim, s, dim_len)?,
                    None => dim_len,
                }
                .max(start);
                Ok(Self {
                    start,
                    stop,
                    step: slice.step,
                    num_items: (stop - start).div_ceil(slice.step),
                    dim_len,
                    chunk_len,
                    drop: false,
                })
            }
        }
    }

    fn projections(&self) -> Vec<DimProjection> {
        let mut out = Vec::new();
        if self.num_items == 0 {
            return out;
        }
        let first_chunk = self.start / self.chunk_len;
        let last_chunk = (self.stop - 1) / self.chunk_len;
        for chunk_index in first_chunk..=last_chunk {
            let offset = chunk_index * self.chunk_len;
            let limit = (offset + self.chunk_len).min(self.dim_len).min(self.stop);
            let first = if self.start >= offset {
                self.start
            } else {
                self.start + (offset - self.start).div_ceil(self.step) * self.step
            };
            if first >= limit {
                continue;
            }
            out.push(DimProjection {
                chunk_index,
                chunk_start: first - offset,
                step: self.step,
                count: (limit - first).div_ceil(self.step),
                out_start: (first - self.start) / self.step,
            });
        }
        out
    }
}

/// The part of one dimension's selection which falls in a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimProjection {
    /// Chunk grid coordinate along this dimension.
    pub chunk_index: u64,
    /// First selected position within the chunk.
    pub chunk_start: u64,
    pub step: u64,
    /// Number of selected positions within the chunk.
    pub count: u64,
    /// Position of the first selected element in the output along this dimension.
    pub out_start: u64,
}

/// The part of a selection which falls in a single chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkProjection {
    pub chunk_coords: Vec<u64>,
    pub dims: Vec<DimProjection>,
}

/// Resolves a [Selection] against an array shape and chunk shape.
#[derive(Debug, Clone)]
pub struct BasicIndexer {
    dims: Vec<DimIndexer>,
}

impl BasicIndexer {
    pub fn new(selection: &Selection, shape: &[u64], chunks: &[u64]) -> crate::Result<Self> {
        let given = selection.dims();
        if given.len() > shape.len() {
            return Err(Error::TooManyIndices {
                expected: shape.len(),
                got: given.len(),
            });
        }
        let dims = shape
            .iter()
            .zip(chunks)
            .enumerate()
            .map(|(dim, (&len, &chunk))| {
                let sel = given
                    .get(dim)
                    .copied()
                    .unwrap_or(DimSelection::Slice(Slice::all()));
                DimIndexer::new(dim, sel, len, chunk)
            })
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self { dims })
    }

    /// Shape of the selected region, with integer-indexed dimensions dropped.
    pub fn shape(&self) -> Vec<u64> {
        self.dims
            .iter()
            .filter(|d| !d.drop)
            .map(|d| d.num_items)
            .collect()
    }

    /// Shape of the selected region with every dimension kept.
    pub fn region_shape(&self) -> Vec<u64> {
        self.dims.iter().map(|d| d.num_items).collect()
    }

    pub fn num_elements(&self) -> u64 {
        self.dims.iter().map(|d| d.num_items).product()
    }

    /// Every chunk overlapping the selection, in C order of chunk coordinates.
    pub fn projections(&self) -> Vec<ChunkProjection> {
        let per_dim: Vec<Vec<DimProjection>> =
            self.dims.iter().map(DimIndexer::projections).collect();
        if per_dim.iter().any(Vec::is_empty) {
            return Vec::new();
        }

        let mut out = Vec::new();
        let mut cursor = vec![0usize; per_dim.len()];
        loop {
            let dims: Vec<DimProjection> = cursor
                .iter()
                .zip(&per_dim)
                .map(|(&i, projs)| projs[i])
                .collect();
            out.push(ChunkProjection {
                chunk_coords: dims.iter().map(|d| d.chunk_index).collect(),
                dims,
            });

            // odometer increment, last dimension fastest
            let mut dim = per_dim.len();
            loop {
                if dim == 0 {
                    return out;
                }
                dim -= 1;
                cursor[dim] += 1;
                if cursor[dim] < per_dim[dim].len() {
                    break;
                }
                cursor[dim] = 0;
            }
        }
    }

    /// Whether the projection covers every in-bounds element of its chunk.
    pub fn covers_chunk(&self, projection: &ChunkProjection) -> bool {
        projection.dims.iter().zip(&self.dims).all(|(p, d)| {
            let offset = p.chunk_index * d.chunk_len;
            let valid = d.chunk_len.min(d.dim_len - offset);
            p.chunk_start == 0 && p.count == valid && (p.step == 1 || p.count == 1)
        })
    }
}
