//! Factory for creating chunk codecs

use crate::errors::{PrepError, PrepResult};
use super::codec::ChunkCodec;
use super::deflate::DeflateCodec;
use super::raw::RawCodec;
use super::zstd::ZstdCodec;

/// Names accepted by [`CodecFactory::by_name`]
pub const CODEC_NAMES: [&str; 3] = ["none", "deflate", "zstd"];

/// Factory for creating chunk codecs
pub struct CodecFactory;

impl CodecFactory {
    /// Get a codec by name
    pub fn by_name(name: &str) -> PrepResult<Box<dyn ChunkCodec>> {
        match name.to_lowercase().as_str() {
            "none" | "raw" | "uncompressed" => Ok(Box::new(RawCodec)),
            "deflate" | "zlib" => Ok(Box::new(DeflateCodec::new())),
            "zstd" => Ok(Box::new(ZstdCodec::new())),
            _ => Err(PrepError::InvalidConfig(format!(
                "Unknown compression '{}', expected one of {:?}",
                name, CODEC_NAMES
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_codec_restores_input() {
        let raw: Vec<u8> = (0..4096u32).map(|v| (v % 251) as u8).collect();
        for name in CODEC_NAMES {
            let codec = CodecFactory::by_name(name).unwrap();
            let encoded = codec.encode(&raw).unwrap();
            assert_eq!(codec.decode(&encoded).unwrap(), raw, "codec {}", name);
            assert_eq!(codec.name(), name);
        }
    }

    #[test]
    fn unknown_name_is_config_error() {
        assert!(matches!(CodecFactory::by_name("lzw"), Err(PrepError::InvalidConfig(_))));
    }
}
