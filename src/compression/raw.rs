//! Codec for uncompressed chunks

use crate::errors::PrepResult;
use super::codec::ChunkCodec;

/// Stores chunks as-is
pub struct RawCodec;

impl ChunkCodec for RawCodec {
    fn encode(&self, raw: &[u8]) -> PrepResult<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decode(&self, encoded: &[u8]) -> PrepResult<Vec<u8>> {
        Ok(encoded.to_vec())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
