//! Zlib (de)compression helpers shared by the v1/v2 payload codecs and by
//! the v2 entry/metadata tables, plus a stub for the texture-payload
//! codec the official packer uses (spec §1, §9 — "stubbed off", never
//! invoked by this writer).

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::Result;

/// Mirrors spec §4.10's `compressionLevel` property. `None` disables
/// payload compression outright (tables are still always zlib-compressed
/// in v2, since that is mandated by the binary layout, not a choice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    None,
    Fastest,
    #[default]
    Optimal,
    SmallestSize,
}

impl CompressionLevel {
    fn to_flate2(self) -> Compression {
        match self {
            CompressionLevel::None => Compression::none(),
            CompressionLevel::Fastest => Compression::fast(),
            CompressionLevel::Optimal => Compression::default(),
            CompressionLevel::SmallestSize => Compression::best(),
        }
    }
}

pub fn zlib_compress(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level.to_flate2());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub fn zlib_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// The official packer's texture payload codec. Referenced only by
/// interface per spec §1; this library never compresses texture bytes
/// (spec §9's final bullet), so this never actually runs.
pub struct GDeflate;

impl GDeflate {
    pub fn decompress(_data: &[u8], _expected_size: usize) -> Result<Vec<u8>> {
        unimplemented!("GDeflate is an external collaborator; texture payloads are never compressed by this writer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_roundtrips() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(8);
        let compressed = zlib_compress(&data, CompressionLevel::Optimal).unwrap();
        let decompressed = zlib_decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn none_level_still_produces_valid_zlib_stream() {
        let data = b"hello".to_vec();
        let compressed = zlib_compress(&data, CompressionLevel::None).unwrap();
        assert_eq!(zlib_decompress(&compressed).unwrap(), data);
    }
}
