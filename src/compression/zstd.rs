//! Codec for ZSTD compressed chunks

use log::{debug, warn};
use crate::errors::{PrepError, PrepResult};
use super::codec::ChunkCodec;

/// ZSTD chunk codec
pub struct ZstdCodec {
    /// Compression level
    level: i32,
}

impl ZstdCodec {
    pub fn new() -> Self {
        ZstdCodec { level: 3 }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkCodec for ZstdCodec {
    fn encode(&self, raw: &[u8]) -> PrepResult<Vec<u8>> {
        debug!("ZSTD encoding {} bytes at level {}", raw.len(), self.level);
        zstd::encode_all(raw, self.level).map_err(|e| {
            warn!("ZSTD encoding error: {}", e);
            PrepError::GenericError(format!("ZSTD encoding error: {}", e))
        })
    }

    fn decode(&self, encoded: &[u8]) -> PrepResult<Vec<u8>> {
        zstd::decode_all(encoded).map_err(|e| {
            warn!("ZSTD decoding error: {}", e);
            PrepError::GenericError(format!("ZSTD decoding error: {}", e))
        })
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}
