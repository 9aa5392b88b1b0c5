use std::io::{Read, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::{Codec, CodecPlugin, CompressorConfig};
use crate::Error;

pub const IDENTIFIER: &str = "zlib";

inventory::submit! {
    CodecPlugin::new(IDENTIFIER, create)
}

fn create(config: &CompressorConfig) -> crate::Result<Arc<dyn Codec>> {
    Ok(Arc::new(ZlibCodec::new_with_configuration(config)?))
}

/// zlib-framed deflate.
#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    /// -1 means the library default.
    level: i32,
}

impl ZlibCodec {
    /// Level must be in the range -1..=9.
    pub fn new(level: i32) -> crate::Result<Self> {
        Self::new_with_configuration(
            &CompressorConfig::new(IDENTIFIER).with_option("level", level),
        )
    }

    pub fn new_with_configuration(config: &CompressorConfig) -> crate::Result<Self> {
        let level = config.level(1, -1..=9)? as i32;
        Ok(Self { level })
    }

    fn compression(&self) -> Compression {
        match u32::try_from(self.level) {
            Ok(level) => Compression::new(level),
            Err(_) => Compression::default(),
        }
    }
}

impl Codec for ZlibCodec {
    fn id(&self) -> &str {
        IDENTIFIER
    }

    fn encode(&self, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), self.compression());
        encoder
            .write_all(bytes)
            .and_then(|_| encoder.finish())
            .map_err(|source| Error::Codec {
                id: IDENTIFIER.into(),
                source,
            })
    }

    fn decode(&self, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(bytes.len() * 2);
        ZlibDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(|source| Error::Codec {
                id: IDENTIFIER.into(),
                source,
            })?;
        Ok(out)
    }

    fn configuration(&self) -> CompressorConfig {
        CompressorConfig::new(IDENTIFIER).with_option("level", self.level)
    }
}
