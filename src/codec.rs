//! Chunk compression codecs and the registry mapping codec ids to them.
//!
//! Built-in codecs register themselves with [inventory]; further codecs can be
//! added at runtime with [CodecRegistry::register].
use std::collections::HashMap;
use std::fmt::Debug;
use std::ops::RangeInclusive;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use crate::Error;

#[cfg(feature = "bz2")]
pub mod bz2;
#[cfg(feature = "gzip")]
pub mod gzip;
#[cfg(feature = "zlib")]
pub mod zlib;

/// A reversible byte-level transform applied to whole chunks.
pub trait Codec: Debug + Send + Sync {
    /// The identifier written to the `compressor.id` metadata field.
    fn id(&self) -> &str;

    fn encode(&self, bytes: &[u8]) -> crate::Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> crate::Result<Vec<u8>>;

    /// The compressor configuration which recreates this codec.
    fn configuration(&self) -> CompressorConfig;
}

/// The `compressor` object of array metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorConfig {
    pub id: String,
    /// Codec-specific options, e.g. `level`.
    #[serde(flatten)]
    pub configuration: serde_json::Map<String, serde_json::Value>,
}

impl CompressorConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            configuration: Default::default(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    /// Read an integer `level` option, falling back to `default` if absent.
    pub(crate) fn level(&self, default: i64, valid: RangeInclusive<i64>) -> crate::Result<i64> {
        let level = match self.configuration.get("level") {
            None | Some(serde_json::Value::Null) => default,
            Some(v) => v.as_i64().ok_or_else(|| Error::InvalidCodecConfiguration {
                id: self.id.clone(),
                message: format!("level must be an integer, got {v}"),
            })?,
        };
        if !valid.contains(&level) {
            return Err(Error::InvalidCodecConfiguration {
                id: self.id.clone(),
                message: format!(
                    "level {level} outside {}..={}",
                    valid.start(),
                    valid.end()
                ),
            });
        }
        Ok(level)
    }
}

/// Builds a configured codec from its metadata.
pub type CodecCreateFn = fn(&CompressorConfig) -> crate::Result<Arc<dyn Codec>>;

/// Registration record for a codec which is available without runtime setup.
pub struct CodecPlugin {
    id: &'static str,
    create: CodecCreateFn,
}

impl CodecPlugin {
    pub const fn new(id: &'static str, create: CodecCreateFn) -> Self {
        Self { id, create }
    }
}

inventory::collect!(CodecPlugin);

static GLOBAL_REGISTRY: LazyLock<Arc<CodecRegistry>> =
    LazyLock::new(|| Arc::new(CodecRegistry::default()));

/// Maps codec ids to codec constructors.
#[derive(Debug, Clone)]
pub struct CodecRegistry {
    constructors: HashMap<String, CodecCreateFn>,
}

impl Default for CodecRegistry {
    /// A registry holding every built-in codec.
    fn default() -> Self {
        let mut out = Self::empty();
        for plugin in inventory::iter::<CodecPlugin> {
            out.register(plugin.id, plugin.create);
        }
        out
    }
}

impl CodecRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Shared registry of built-in codecs, used by arrays unless told otherwise.
    pub fn global() -> Arc<Self> {
        GLOBAL_REGISTRY.clone()
    }

    /// Add or replace the constructor for a codec id.
    pub fn register(&mut self, id: impl Into<String>, create: CodecCreateFn) {
        let id = id.into();
        log::debug!("registering codec {id}");
        self.constructors.insert(id, create);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    /// Registered codec ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Instantiate the codec described by `config`.
    pub fn codec(&self, config: &CompressorConfig) -> crate::Result<Arc<dyn Codec>> {
        let create = self
            .constructors
            .get(&config.id)
            .ok_or_else(|| Error::UnknownCodec(config.id.clone()))?;
        create(config)
    }

    /// Encode with the default configuration of the given codec.
    pub fn encode(&self, codec_id: &str, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        self.codec(&CompressorConfig::new(codec_id))?.encode(bytes)
    }

    /// Decode with the default configuration of the given codec.
    pub fn decode(&self, codec_id: &str, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        self.codec(&CompressorConfig::new(codec_id))?.decode(bytes)
    }
}
