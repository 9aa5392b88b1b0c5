use crate::indexing::ChunkProjection;
use crate::metadata::Order;

/// Element strides of an array of the given shape and layout.
pub(crate) fn strides(shape: &[u64], order: Order) -> Vec<usize> {
    let mut out = vec![0usize; shape.len()];
    let mut acc = 1usize;
    match order {
        Order::C => {
            for (stride, len) in out.iter_mut().zip(shape).rev() {
                *stride = acc;
                acc *= *len as usize;
            }
        }
        Order::F => {
            for (stride, len) in out.iter_mut().zip(shape) {
                *stride = acc;
                acc *= *len as usize;
            }
        }
    }
    out
}

/// Decoded contents of one chunk, in stored byte order and element layout.
///
/// Edge chunks have the full chunk shape;
/// elements beyond the array bounds are never exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    bytes: Vec<u8>,
    shape: Vec<u64>,
    order: Order,
    item_size: usize,
}

impl Chunk {
    /// A chunk with every element set to `fill`, which is one element in stored byte order.
    pub fn filled(shape: &[u64], order: Order, fill: &[u8]) -> Self {
        let num_elements: u64 = shape.iter().product();
        Self {
            bytes: fill.repeat(num_elements as usize),
            shape: shape.to_vec(),
            order,
            item_size: fill.len(),
        }
    }

    /// Wrap decoded bytes, returning them back if the length does not match the shape.
    pub fn from_bytes(
        bytes: Vec<u8>,
        shape: &[u64],
        order: Order,
        item_size: usize,
    ) -> Result<Self, Vec<u8>> {
        let expected = shape.iter().product::<u64>() as usize * item_size;
        if bytes.len() != expected {
            return Err(bytes);
        }
        Ok(Self {
            bytes,
            shape: shape.to_vec(),
            order,
            item_size,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Copy the projected elements into `out`, a C-order buffer of `region_shape`.
    pub(crate) fn read_region(&self, projection: &ChunkProjection, region_shape: &[u64], out: &mut [u8]) {
        let item = self.item_size;
        for_each_run(projection, &self.shape, self.order, region_shape, |c, o, len| {
            out[o * item..(o + len) * item].copy_from_slice(&self.bytes[c * item..(c + len) * item]);
        });
    }

    /// Overwrite the projected elements from `src`, a C-order buffer of `region_shape`.
    pub(crate) fn write_region(&mut self, projection: &ChunkProjection, region_shape: &[u64], src: &[u8]) {
        let item = self.item_size;
        let bytes = &mut self.bytes;
        for_each_run(projection, &self.shape, self.order, region_shape, |c, o, len| {
            bytes[c * item..(c + len) * item].copy_from_slice(&src[o * item..(o + len) * item]);
        });
    }
}

/// Visit contiguous runs shared by a chunk and a C-order region buffer.
///
/// `f` receives the chunk element offset, the region element offset and the run length.
fn for_each_run(
    projection: &ChunkProjection,
    chunk_shape: &[u64],
    order: Order,
    region_shape: &[u64],
    mut f: impl FnMut(usize, usize, usize),
) {
    let dims = &projection.dims;
    let Some(last) = dims.len().checked_sub(1) else {
        f(0, 0, 1);
        return;
    };
    let chunk_strides = strides(chunk_shape, order);
    let region_strides = strides(region_shape, Order::C);

    let inner = dims[last];
    let contiguous = chunk_strides[last] == 1 && inner.step == 1;
    let (run, inner_count) = if contiguous {
        (inner.count as usize, 1)
    } else {
        (1, inner.count as usize)
    };

    let mut cursor = vec![0u64; last];
    loop {
        let mut chunk_base = 0;
        let mut region_base = 0;
        for (d, &k) in cursor.iter().enumerate() {
            chunk_base += (dims[d].chunk_start + k * dims[d].step) as usize * chunk_strides[d];
            region_base += (dims[d].out_start + k) as usize * region_strides[d];
        }
        for j in 0..inner_count {
            let c = chunk_base
                + (inner.chunk_start as usize + j * inner.step as usize) * chunk_strides[last];
            let o = region_base + (inner.out_start as usize + j) * region_strides[last];
            f(c, o, run);
        }

        let mut d = last;
        loop {
            if d == 0 {
                return;
            }
            d -= 1;
            cursor[d] += 1;
            if cursor[d] < dims[d].count {
                break;
            }
            cursor[d] = 0;
        }
    }
}
