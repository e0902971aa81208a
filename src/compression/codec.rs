//! Chunk codec trait definition

use crate::errors::PrepResult;

/// Strategy trait for encoding pyramid chunks
///
/// Codecs work on the little-endian byte image of a chunk; they never see
/// the sample type.
pub trait ChunkCodec: Send + Sync {
    /// Encode a raw chunk
    fn encode(&self, raw: &[u8]) -> PrepResult<Vec<u8>>;

    /// Decode an encoded chunk
    fn decode(&self, encoded: &[u8]) -> PrepResult<Vec<u8>>;

    /// Name recorded in the pyramid manifest
    fn name(&self) -> &'static str;
}
