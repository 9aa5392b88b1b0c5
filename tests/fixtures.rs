//! Write the reference fixture matrix to disk, then read it back through a fresh store.
use std::fmt::Debug;
use std::sync::Arc;

use half::f16;
use tempfile::TempDir;
use zarr_chunked::chunk_key_encoding::ChunkKeySeparator;
use zarr_chunked::storage::StorePrefix;
use zarr_chunked::{
    ArrayBuilder, ChunkStore, ChunkedArray, CompressorConfig, Element, FilesystemStore, Order,
    Selection,
};

fn data_dir() -> TempDir {
    env_logger::try_init().ok();
    tempfile::tempdir().expect("should be able to create temp dir")
}

#[derive(Debug, Clone, Copy)]
struct Fixture {
    dtype: &'static str,
    compressor: Option<&'static str>,
    order: Order,
    ndim: usize,
    separator: ChunkKeySeparator,
    write_chunks: bool,
}

impl Fixture {
    fn simple(dtype: &'static str) -> Self {
        Self {
            dtype,
            compressor: None,
            order: Order::C,
            ndim: 2,
            separator: ChunkKeySeparator::Dot,
            write_chunks: true,
        }
    }

    fn compressed(self, id: &'static str) -> Self {
        Self {
            compressor: Some(id),
            ..self
        }
    }

    fn shape(&self) -> Vec<u64> {
        vec![8; self.ndim]
    }

    /// Positions written and their values.
    fn written(&self) -> Vec<(Vec<u64>, i32)> {
        if !self.write_chunks {
            return Vec::new();
        }
        match self.ndim {
            2 => vec![(vec![0, 0], 1), (vec![0, 1], 2), (vec![7, 7], 3)],
            _ => vec![(vec![0, 0, 0], 1), (vec![0, 0, 1], 2), (vec![7, 0, 7], 3)],
        }
    }

    fn expected<T: Element>(&self, convert: fn(i32) -> T) -> Vec<T> {
        let shape = self.shape();
        let mut out = vec![convert(0); shape.iter().product::<u64>() as usize];
        for (pos, value) in self.written() {
            let offset = pos.iter().zip(&shape).fold(0, |acc, (&i, &len)| acc * len + i);
            out[offset as usize] = convert(value);
        }
        out
    }

    fn create<T: Element>(&self, dir: &TempDir, convert: fn(i32) -> T) {
        let store = Arc::new(FilesystemStore::new(dir.path()).expect("create store"));
        let mut chunks = vec![None; self.ndim];
        chunks[0] = Some(2u64);
        let array = ArrayBuilder::new(self.shape(), self.dtype.parse().expect("valid dtype"))
            .chunks(chunks)
            .fill_value(0)
            .order(self.order)
            .dimension_separator(self.separator)
            .compressor(
                self.compressor
                    .map(|id| CompressorConfig::new(id).with_option("level", 1)),
            )
            .overwrite(true)
            .build(store, "")
            .expect("create array");
        for (pos, value) in self.written() {
            array
                .write_element(&pos, convert(value))
                .expect("write element");
        }
    }
}

fn check_read_as<T: Element + PartialEq + Debug>(fixture: Fixture, convert: fn(i32) -> T) -> TempDir {
    let dir = data_dir();
    fixture.create(&dir, convert);

    let store = Arc::new(FilesystemStore::new(dir.path()).expect("open store"));
    let array = ChunkedArray::open_read_only(store, "").expect("open array");
    assert_eq!(array.shape(), fixture.shape().as_slice());
    assert_eq!(array.chunk_shape()[0], 2);

    let data = array.read::<T>(Selection::all()).expect("read all data");
    assert_eq!(data.shape(), fixture.shape().as_slice());
    assert_eq!(data.into_data(), fixture.expected(convert));

    for (pos, value) in fixture.written() {
        assert_eq!(array.read_element::<T>(&pos).expect("read element"), convert(value));
    }
    let untouched = vec![1; fixture.ndim];
    assert_eq!(
        array.read_element::<T>(&untouched).expect("read element"),
        convert(0)
    );
    dir
}

fn check_read(fixture: Fixture) -> TempDir {
    check_read_as::<i32>(fixture, |v| v)
}

fn stored_keys(dir: &TempDir) -> Vec<String> {
    let store = FilesystemStore::new(dir.path()).expect("open store");
    store
        .list_prefix(&StorePrefix::root())
        .expect("list keys")
        .into_iter()
        .map(|k| k.to_string())
        .collect()
}

#[test]
fn test_empty() {
    let dir = check_read(Fixture {
        write_chunks: false,
        ..Fixture::simple("<i4")
    });
    assert_eq!(stored_keys(&dir), vec![".zarray"]);
}

#[test]
fn test_simple_le() {
    let dir = check_read(Fixture::simple("<i4"));
    assert_eq!(stored_keys(&dir), vec![".zarray", "0.0", "3.0"]);
    let raw = std::fs::read(dir.path().join("0.0")).expect("chunk file");
    assert_eq!(raw.len(), 2 * 8 * 4);
    assert_eq!(&raw[..8], &[1, 0, 0, 0, 2, 0, 0, 0]);
}

#[test]
fn test_simple_be() {
    let dir = check_read(Fixture::simple(">i4"));
    let raw = std::fs::read(dir.path().join("0.0")).expect("chunk file");
    assert_eq!(&raw[..8], &[0, 0, 0, 1, 0, 0, 0, 2]);
}

#[cfg(feature = "gzip")]
#[test]
fn test_simple_gzip_le() {
    check_read(Fixture::simple("<i4").compressed("gzip"));
}

#[cfg(feature = "gzip")]
#[test]
fn test_simple_gzip_be() {
    check_read(Fixture::simple(">i4").compressed("gzip"));
}

#[cfg(feature = "zlib")]
#[test]
fn test_simple_zlib_le() {
    check_read(Fixture::simple("<i4").compressed("zlib"));
}

#[cfg(feature = "zlib")]
#[test]
fn test_simple_zlib_be() {
    check_read(Fixture::simple(">i4").compressed("zlib"));
}

#[cfg(feature = "bz2")]
#[test]
fn test_simple_bz2() {
    check_read(Fixture::simple("<i4").compressed("bz2"));
}

#[test]
fn test_simple_f() {
    let dir = check_read(Fixture {
        order: Order::F,
        ..Fixture::simple("<i4")
    });
    // column-major: element (0, 1) follows both rows of column 0
    let raw = std::fs::read(dir.path().join("0.0")).expect("chunk file");
    assert_eq!(&raw[..4], &1i32.to_le_bytes());
    assert_eq!(&raw[4..8], &[0; 4]);
    assert_eq!(&raw[8..12], &2i32.to_le_bytes());
}

#[test]
fn test_simple_f_3d() {
    let dir = check_read(Fixture {
        order: Order::F,
        ndim: 3,
        ..Fixture::simple("<i4")
    });
    assert_eq!(stored_keys(&dir), vec![".zarray", "0.0.0", "3.0.0"]);
}

#[test]
fn test_simple_nested() {
    let dir = check_read(Fixture {
        separator: ChunkKeySeparator::Slash,
        ..Fixture::simple(">i4")
    });
    assert!(dir.path().join("0").is_dir());
    assert!(dir.path().join("3").join("0").is_file());
    assert_eq!(stored_keys(&dir), vec![".zarray", "0/0", "3/0"]);

    let metadata: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join(".zarray")).expect("metadata"))
            .expect("valid json");
    assert_eq!(metadata["dimension_separator"], "/");
}

#[test]
fn test_float16_le() {
    check_read_as::<f16>(Fixture::simple("<f2"), |v| f16::from_f32(v as f32));
}

#[cfg(feature = "gzip")]
#[test]
fn test_float16_be() {
    check_read_as::<f16>(Fixture::simple(">f2").compressed("gzip"), |v| {
        f16::from_f32(v as f32)
    });
}
