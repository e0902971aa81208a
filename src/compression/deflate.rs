//! Codec for zlib/deflate compressed chunks

use std::io::{Read, Write};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use crate::errors::PrepResult;
use super::codec::ChunkCodec;

/// Deflate (zlib-wrapped) chunk codec
pub struct DeflateCodec {
    level: Compression,
}

impl DeflateCodec {
    pub fn new() -> Self {
        DeflateCodec { level: Compression::default() }
    }
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkCodec for DeflateCodec {
    fn encode(&self, raw: &[u8]) -> PrepResult<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), self.level);
        encoder.write_all(raw)?;
        Ok(encoder.finish()?)
    }

    fn decode(&self, encoded: &[u8]) -> PrepResult<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(encoded);
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw)?;
        Ok(raw)
    }

    fn name(&self) -> &'static str {
        "deflate"
    }
}
