use std::io::{Read, Write};
use std::sync::Arc;

use bzip2::Compression;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;

use super::{Codec, CodecPlugin, CompressorConfig};
use crate::Error;

pub const IDENTIFIER: &str = "bz2";

inventory::submit! {
    CodecPlugin::new(IDENTIFIER, create)
}

fn create(config: &CompressorConfig) -> crate::Result<Arc<dyn Codec>> {
    Ok(Arc::new(Bz2Codec::new_with_configuration(config)?))
}

#[derive(Debug, Clone, Copy)]
pub struct Bz2Codec {
    /// Block size in units of 100kB, 1..=9.
    level: u32,
}

impl Bz2Codec {
    pub fn new(level: u32) -> crate::Result<Self> {
        Self::new_with_configuration(
            &CompressorConfig::new(IDENTIFIER).with_option("level", level),
        )
    }

    pub fn new_with_configuration(config: &CompressorConfig) -> crate::Result<Self> {
        let level = config.level(1, 1..=9)? as u32;
        Ok(Self { level })
    }

    fn error(source: std::io::Error) -> Error {
        Error::Codec {
            id: IDENTIFIER.into(),
            source,
        }
    }
}

impl Codec for Bz2Codec {
    fn id(&self) -> &str {
        IDENTIFIER
    }

    fn encode(&self, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(bytes).map_err(Self::error)?;
        encoder.finish().map_err(Self::error)
    }

    fn decode(&self, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        let mut out = Vec::new();
        BzDecoder::new(bytes)
            .read_to_end(&mut out)
            .map_err(Self::error)?;
        Ok(out)
    }

    fn configuration(&self) -> CompressorConfig {
        CompressorConfig::new(IDENTIFIER).with_option("level", self.level)
    }
}
