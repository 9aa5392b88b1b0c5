use std::io::{Read, Write};
use std::sync::Arc;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use super::{Codec, CodecPlugin, CompressorConfig};
use crate::Error;

pub const IDENTIFIER: &str = "gzip";

inventory::submit! {
    CodecPlugin::new(IDENTIFIER, create)
}

fn create(config: &CompressorConfig) -> crate::Result<Arc<dyn Codec>> {
    Ok(Arc::new(GzipCodec::new_with_configuration(config)?))
}

/// gzip-framed deflate.
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    level: u32,
}

impl GzipCodec {
    /// Level must be in the range 0..=9.
    pub fn new(level: u32) -> crate::Result<Self> {
        Self::new_with_configuration(
            &CompressorConfig::new(IDENTIFIER).with_option("level", level),
        )
    }

    pub fn new_with_configuration(config: &CompressorConfig) -> crate::Result<Self> {
        let level = config.level(1, 0..=9)? as u32;
        Ok(Self { level })
    }

    fn error(source: std::io::Error) -> Error {
        Error::Codec {
            id: IDENTIFIER.into(),
            source,
        }
    }
}

impl Codec for GzipCodec {
    fn id(&self) -> &str {
        IDENTIFIER
    }

    fn encode(&self, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(bytes).map_err(Self::error)?;
        encoder.finish().map_err(Self::error)
    }

    fn decode(&self, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        let mut out = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(Self::error)?;
        Ok(out)
    }

    fn configuration(&self) -> CompressorConfig {
        CompressorConfig::new(IDENTIFIER).with_option("level", self.level)
    }
}
