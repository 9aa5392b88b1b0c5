use std::sync::Arc;

use bytes::Bytes;
use half::f16;
use zarr_chunked::codec::{Codec, CodecRegistry, CompressorConfig};
use zarr_chunked::hierarchy::{contains_array, contains_group, create_group};
use zarr_chunked::metadata::MetadataRevision;
use zarr_chunked::storage::StoreKey;
use zarr_chunked::{
    ArrayBuilder, ChunkStore, ChunkedArray, Element, Error, FilesystemStore, MemoryStore, Order,
    Selection, Slice, sel,
};

fn memory_store() -> Arc<MemoryStore> {
    env_logger::try_init().ok();
    Arc::new(MemoryStore::new())
}

fn roundtrip<T: Element + PartialEq + std::fmt::Debug>(dtype: &str, values: [T; 6]) {
    let store = memory_store();
    let array = ArrayBuilder::new(vec![2, 3], dtype.parse().expect("valid dtype"))
        .chunks([1u64, 2])
        .build(store.clone(), dtype)
        .expect("create array");
    array.write(Selection::all(), &values).expect("write");

    let reopened = ChunkedArray::open(store, dtype).expect("open");
    assert_eq!(reopened.data_type().to_string(), dtype);
    assert_eq!(
        reopened.read::<T>(Selection::all()).expect("read").into_data(),
        values
    );
}

#[test]
fn every_data_type_in_both_byte_orders() {
    roundtrip::<bool>("|b1", [true, false, false, true, true, false]);
    roundtrip::<i8>("|i1", [-128, -1, 0, 1, 2, 127]);
    roundtrip::<u8>("|u1", [0, 1, 2, 3, 254, 255]);
    for order in ["<", ">"] {
        roundtrip::<i16>(&format!("{order}i2"), [i16::MIN, -1, 0, 1, 300, i16::MAX]);
        roundtrip::<u16>(&format!("{order}u2"), [0, 1, 2, 256, 4097, u16::MAX]);
        roundtrip::<i32>(&format!("{order}i4"), [i32::MIN, -70000, 0, 1, 70000, i32::MAX]);
        roundtrip::<u32>(&format!("{order}u4"), [0, 1, 65536, 16777216, 3, u32::MAX]);
        roundtrip::<i64>(&format!("{order}i8"), [i64::MIN, -1, 0, 1, 1 << 40, i64::MAX]);
        roundtrip::<u64>(&format!("{order}u8"), [0, 1, 2, 1 << 33, 1 << 62, u64::MAX]);
        roundtrip::<f16>(
            &format!("{order}f2"),
            [-2.5, -1.0, 0.0, 0.5, 1024.0, 65504.0].map(f16::from_f32),
        );
        roundtrip::<f32>(&format!("{order}f4"), [-1.5, 0.0, 1e-3, 3.25, 1e20, f32::MAX]);
        roundtrip::<f64>(&format!("{order}f8"), [-1.5, 0.0, 1e-300, 3.25, 1e200, f64::MAX]);
    }
}

#[test]
fn orders_store_different_bytes_but_read_the_same() {
    let values: Vec<u16> = (0..24).collect();
    let mut chunks = Vec::new();
    for order in [Order::C, Order::F] {
        let store = memory_store();
        let array = ArrayBuilder::new(vec![2, 3, 4], "<u2".parse().expect("valid dtype"))
            .order(order)
            .build(store, "")
            .expect("create array");
        array.write(Selection::all(), &values).expect("write");
        assert_eq!(
            array.read::<u16>(sel![1, .., 2..]).expect("read").into_data(),
            vec![14, 15, 18, 19, 22, 23]
        );
        chunks.push(array.retrieve_encoded_chunk(&[0, 0, 0]).expect("get").expect("stored"));
    }
    assert_ne!(chunks[0], chunks[1]);
}

#[test]
fn selections_drop_indexed_dimensions() {
    let store = memory_store();
    let array = ArrayBuilder::new(vec![6, 5, 4], "<i4".parse().expect("valid dtype"))
        .chunks([4u64, 2, 3])
        .build(store, "")
        .expect("create array");
    let values: Vec<i32> = (0..120).collect();
    array.write(Selection::all(), &values).expect("write");

    let row = array.read::<i32>(sel![-1, 2]).expect("read");
    assert_eq!(row.shape(), &[4]);
    assert_eq!(row.data(), &[108, 109, 110, 111]);

    let strided = array
        .read::<i32>(sel![Slice::new(Some(1), Some(6)).with_step(2), 4, ..2])
        .expect("read");
    assert_eq!(strided.shape(), &[3, 2]);
    assert_eq!(strided.into_data(), vec![36, 37, 76, 77, 116, 117]);

    assert!(matches!(
        array.read::<i32>(sel![0, 0, 0, 0]),
        Err(Error::TooManyIndices { expected: 3, got: 4 })
    ));
    assert!(matches!(
        array.read::<i32>(sel![-7]),
        Err(Error::IndexOutOfBounds { dim: 0, index: -7, length: 6 })
    ));
    assert!(matches!(
        array.read::<i32>(sel![Slice::all().with_step(0)]),
        Err(Error::InvalidSelection(_))
    ));

    let empty = array.read::<i32>(sel![3..3]).expect("read");
    assert_eq!(empty.shape(), &[0, 5, 4]);
    assert!(empty.data().is_empty());
}

/// Reverses chunk bytes; enough to tell encoded chunks from raw ones.
#[derive(Debug)]
struct ReverseCodec;

impl Codec for ReverseCodec {
    fn id(&self) -> &str {
        "reverse"
    }

    fn encode(&self, bytes: &[u8]) -> zarr_chunked::Result<Vec<u8>> {
        Ok(bytes.iter().rev().copied().collect())
    }

    fn decode(&self, bytes: &[u8]) -> zarr_chunked::Result<Vec<u8>> {
        self.encode(bytes)
    }

    fn configuration(&self) -> CompressorConfig {
        CompressorConfig::new("reverse")
    }
}

fn create_reverse(_config: &CompressorConfig) -> zarr_chunked::Result<Arc<dyn Codec>> {
    Ok(Arc::new(ReverseCodec))
}

#[test]
fn runtime_registered_codec() {
    let mut registry = CodecRegistry::default();
    registry.register("reverse", create_reverse);
    let registry = Arc::new(registry);

    let store = memory_store();
    let array = ArrayBuilder::new(vec![4], "<u2".parse().expect("valid dtype"))
        .compressor(Some(CompressorConfig::new("reverse")))
        .codec_registry(registry.clone())
        .build(store.clone(), "")
        .expect("create array");
    array.write(Selection::all(), &[1u16, 2, 3, 4]).expect("write");

    let raw = array.retrieve_encoded_chunk(&[0]).expect("get").expect("stored");
    assert_eq!(&raw[..], &[0, 4, 0, 3, 0, 2, 0, 1]);

    let reopened = ChunkedArray::open_with(store.clone(), "", registry, true).expect("open");
    assert_eq!(
        reopened.read::<u16>(Selection::all()).expect("read").into_data(),
        vec![1, 2, 3, 4]
    );

    // the global registry knows nothing about this codec
    let global = ChunkedArray::open(store, "").expect("open");
    assert!(matches!(
        global.read::<u16>(Selection::all()),
        Err(Error::UnknownCodec(id)) if id == "reverse"
    ));
}

#[test]
fn hierarchy_on_disk() {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(FilesystemStore::new(dir.path()).expect("create store"));

    create_group(&*store, "", false).expect("root group");
    create_group(&*store, "raw", false).expect("group");
    let array = ArrayBuilder::new(vec![10, 10], "<f4".parse().expect("valid dtype"))
        .chunks([5u64, 5])
        .fill_value(f32::NAN)
        .build(store.clone(), "raw/volume")
        .expect("create array");
    array.fill(sel![2..8, 2..8], 1.0f32).expect("fill");

    assert!(contains_group(&*store, "").expect("contains"));
    assert!(contains_group(&*store, "raw").expect("contains"));
    assert!(contains_array(&*store, "raw/volume").expect("contains"));
    assert!(dir.path().join("raw/volume/1.1").is_file());

    let metadata: serde_json::Value = serde_json::from_slice(
        &std::fs::read(dir.path().join("raw/volume/.zarray")).expect("metadata"),
    )
    .expect("valid json");
    assert_eq!(metadata["fill_value"], "NaN");
    assert_eq!(metadata["zarr_format"], 2);
    assert_eq!(metadata["compressor"], serde_json::Value::Null);

    let reopened = ChunkedArray::open_read_only(store.clone(), "/raw/volume/").expect("open");
    let data = reopened.read::<f32>(sel![0..3, 2]).expect("read");
    assert!(data.data()[0].is_nan());
    assert!(data.data()[1].is_nan());
    assert_eq!(data.data()[2], 1.0);

    assert!(matches!(
        ArrayBuilder::new(vec![1], "|u1".parse().expect("valid dtype")).build(store.clone(), "raw"),
        Err(Error::ContainsGroup(_))
    ));

    // overwriting the group removes the array below it
    ArrayBuilder::new(vec![1], "|u1".parse().expect("valid dtype"))
        .overwrite(true)
        .build(store.clone(), "raw")
        .expect("overwrite");
    assert!(!contains_group(&*store, "raw").expect("contains"));
    assert!(!dir.path().join("raw/volume/1.1").exists());
}

#[test]
fn legacy_metadata_on_disk() {
    env_logger::try_init().ok();
    let dir = tempfile::tempdir().expect("temp dir");
    let store = FilesystemStore::new(dir.path()).expect("create store");
    let legacy = serde_json::json!({
        "chunks": [2, 2],
        "compressor": null,
        "dtype": ">i2",
        "fill_value": -1,
        "filters": null,
        "order": "C",
        "shape": [4, 4],
        "zarr_format": 2,
        "custom": "kept"
    });
    let key = StoreKey::new("old/.zarray").expect("valid key");
    store
        .set(&key, Bytes::from(serde_json::to_vec(&legacy).expect("json")))
        .expect("write metadata");

    let revision = ChunkedArray::upgrade_metadata(&store, "old").expect("upgrade");
    assert_eq!(revision, MetadataRevision::Legacy);

    let upgraded: serde_json::Value =
        serde_json::from_slice(&store.get(&key).expect("get").expect("stored")).expect("json");
    assert_eq!(upgraded["dimension_separator"], ".");
    assert_eq!(upgraded["custom"], "kept");

    let array = ChunkedArray::open(Arc::new(store), "old").expect("open");
    assert_eq!(array.read_element::<i16>(&[3, 3]).expect("read"), -1);
}

#[test]
fn invalid_metadata_is_rejected() {
    let store = memory_store();
    let key = StoreKey::new(".zarray").expect("valid key");
    for document in [
        r#"{"zarr_format": 3, "shape": [4], "chunks": [2], "dtype": "<i4", "compressor": null, "fill_value": 0, "order": "C", "filters": null}"#,
        r#"{"zarr_format": 2, "shape": [4], "chunks": [2, 2], "dtype": "<i4", "compressor": null, "fill_value": 0, "order": "C", "filters": null}"#,
        r#"{"zarr_format": 2, "shape": [4], "chunks": [2], "dtype": "<x4", "compressor": null, "fill_value": 0, "order": "C", "filters": null}"#,
        r#"{"zarr_format": 2, "shape": [4], "chunks": [2], "dtype": "<u4", "compressor": null, "fill_value": -3, "order": "C", "filters": null}"#,
        r#"{"zarr_format": 2, "shape": [4194304, 4194304, 4194304], "chunks": [4194304, 4194304, 4194304], "dtype": "<i4", "compressor": null, "fill_value": 0, "order": "C", "filters": null}"#,
        r#"{"zarr_format": 2, "shape": [4], "chunks": [2], "dtype": "<u8", "compressor": null, "fill_value": 1e30, "order": "C", "filters": null}"#,
        r#"{"zarr_format": 2, "shape": [4], "chunks": [2], "dtype": "<i8", "compressor": null, "fill_value": -1e30, "order": "C", "filters": null}"#,
        r#"not json"#,
    ] {
        store
            .set(&key, Bytes::from(document.to_owned()))
            .expect("write metadata");
        let result = ChunkedArray::open(store.clone(), "");
        assert!(
            matches!(result, Err(Error::InvalidMetadata(_))),
            "{document}: {result:?}"
        );
    }
}
