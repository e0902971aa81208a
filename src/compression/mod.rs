//! Chunk compression for pyramid stores
//!
//! This module implements strategies for encoding pyramid chunks.

mod codec;
mod raw;
mod deflate;
mod factory;
mod zstd;

pub use codec::ChunkCodec;
pub use raw::RawCodec;
pub use deflate::DeflateCodec;
pub use factory::{CodecFactory, CODEC_NAMES};
pub use zstd::ZstdCodec;
