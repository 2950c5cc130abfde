// tdiff-parsers/src/tree/compression.rs
//! Compression handling for tree-file baskets
//!
//! Supports the methods a basket header can name:
//! - None (stored)
//! - Zlib
//! - LZ4 (block format)
//! - ZStd (Zstandard)

use serde::{Deserialize, Serialize};

use crate::traits::{ParseError, ParseResult};

/// Compression method of a basket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    None,
    Zlib,
    Lz4,
    Zstd,
    Unknown(u8),
}

impl From<u8> for Compression {
    fn from(value: u8) -> Self {
        match value {
            0 => Compression::None,
            1 => Compression::Zlib,
            4 => Compression::Lz4,
            5 => Compression::Zstd,
            other => Compression::Unknown(other),
        }
    }
}

impl From<Compression> for u8 {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => 0,
            Compression::Zlib => 1,
            Compression::Lz4 => 4,
            Compression::Zstd => 5,
            Compression::Unknown(other) => other,
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "zlib" => Ok(Compression::Zlib),
            "lz4" => Ok(Compression::Lz4),
            "zstd" => Ok(Compression::Zstd),
            _ => Err(format!("Unknown compression: {}", s)),
        }
    }
}

/// Compresses and decompresses basket payloads
pub struct BasketCompression;

impl BasketCompression {
    /// Decompress data using the specified compression method
    pub fn decompress(
        data: &[u8],
        method: Compression,
        expected_size: usize,
    ) -> ParseResult<Vec<u8>> {
        let output = match method {
            Compression::None => data.to_vec(),
            Compression::Zlib => Self::decompress_zlib(data, expected_size)?,
            Compression::Lz4 => Self::decompress_lz4(data, expected_size)?,
            Compression::Zstd => Self::decompress_zstd(data, expected_size)?,
            Compression::Unknown(method) => {
                return Err(ParseError::DecompressionFailed(format!(
                    "Unknown compression method: {}",
                    method
                )));
            }
        };

        if output.len() != expected_size {
            return Err(ParseError::DecompressionFailed(format!(
                "{:?} size mismatch: expected {}, got {}",
                method,
                expected_size,
                output.len()
            )));
        }

        Ok(output)
    }

    fn decompress_zlib(data: &[u8], expected_size: usize) -> ParseResult<Vec<u8>> {
        use std::io::Read;

        // One byte past the declared size is enough to detect a mismatch
        let mut decoder = flate2::read::ZlibDecoder::new(data).take(expected_size as u64 + 1);
        let mut output = Vec::with_capacity(expected_size);

        decoder
            .read_to_end(&mut output)
            .map_err(|e| ParseError::DecompressionFailed(format!("ZLIB decompression failed: {}", e)))?;

        Ok(output)
    }

    fn decompress_lz4(data: &[u8], expected_size: usize) -> ParseResult<Vec<u8>> {
        let size = i32::try_from(expected_size).map_err(|_| {
            ParseError::DecompressionFailed(format!("LZ4 block too large: {} bytes", expected_size))
        })?;

        lz4::block::decompress(data, Some(size))
            .map_err(|e| ParseError::DecompressionFailed(format!("LZ4 block decompression failed: {}", e)))
    }

    fn decompress_zstd(data: &[u8], expected_size: usize) -> ParseResult<Vec<u8>> {
        use std::io::Read;

        let failed = |e: std::io::Error| {
            ParseError::DecompressionFailed(format!("ZSTD decompression failed: {}", e))
        };

        let mut decoder = zstd::stream::read::Decoder::new(data)
            .map_err(failed)?
            .take(expected_size as u64 + 1);
        let mut output = Vec::with_capacity(expected_size);
        decoder.read_to_end(&mut output).map_err(failed)?;

        Ok(output)
    }

    /// Compress data using the specified method
    pub fn compress(data: &[u8], method: Compression) -> ParseResult<Vec<u8>> {
        match method {
            Compression::None => Ok(data.to_vec()),
            Compression::Zlib => Self::compress_zlib(data),
            Compression::Lz4 => lz4::block::compress(data, None, false)
                .map_err(|e| ParseError::DecompressionFailed(format!("LZ4 compression failed: {}", e))),
            Compression::Zstd => zstd::stream::encode_all(data, 3)
                .map_err(|e| ParseError::DecompressionFailed(format!("ZSTD compression failed: {}", e))),
            Compression::Unknown(method) => Err(ParseError::DecompressionFailed(format!(
                "Cannot compress with unknown method: {}",
                method
            ))),
        }
    }

    fn compress_zlib(data: &[u8]) -> ParseResult<Vec<u8>> {
        use std::io::Write;

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());

        encoder
            .write_all(data)
            .map_err(|e| ParseError::DecompressionFailed(format!("ZLIB compression failed: {}", e)))?;

        encoder.finish().map_err(|e| {
            ParseError::DecompressionFailed(format!("ZLIB compression finalization failed: {}", e))
        })
    }

    /// Calculate CRC32 checksum
    pub fn crc32(data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Fail unless `data` hashes to `expected`
    pub fn verify_crc32(data: &[u8], expected: u32) -> ParseResult<()> {
        let actual = Self::crc32(data);
        if actual != expected {
            return Err(ParseError::ChecksumMismatch { expected, actual });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"particles vertices showers particles vertices showers";

    #[test]
    fn test_method_codes() {
        assert_eq!(Compression::from(0), Compression::None);
        assert_eq!(Compression::from(1), Compression::Zlib);
        assert_eq!(Compression::from(4), Compression::Lz4);
        assert_eq!(Compression::from(5), Compression::Zstd);
        assert_eq!(Compression::from(9), Compression::Unknown(9));
        assert_eq!(u8::from(Compression::Zstd), 5);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("ZLIB".parse::<Compression>(), Ok(Compression::Zlib));
        assert!("brotli".parse::<Compression>().is_err());
    }

    #[test]
    fn test_every_method_restores_input() {
        for method in [Compression::None, Compression::Zlib, Compression::Lz4, Compression::Zstd] {
            let packed = BasketCompression::compress(SAMPLE, method).unwrap();
            let unpacked = BasketCompression::decompress(&packed, method, SAMPLE.len()).unwrap();
            assert_eq!(unpacked, SAMPLE, "method {:?}", method);
        }
    }

    #[test]
    fn test_size_mismatch_is_error() {
        let packed = BasketCompression::compress(SAMPLE, Compression::Zlib).unwrap();
        let result = BasketCompression::decompress(&packed, Compression::Zlib, SAMPLE.len() + 1);
        assert!(matches!(result, Err(ParseError::DecompressionFailed(_))));
    }

    #[test]
    fn test_output_bounded_by_declared_size() {
        let large = vec![0u8; 1 << 20];
        for method in [Compression::Zlib, Compression::Lz4, Compression::Zstd] {
            let packed = BasketCompression::compress(&large, method).unwrap();
            assert!(packed.len() < large.len());

            let result = BasketCompression::decompress(&packed, method, 16);
            match result {
                Err(ParseError::DecompressionFailed(message)) => {
                    assert!(!message.contains(&large.len().to_string()), "method {:?}: {}", method, message);
                }
                other => panic!("method {:?} gave {:?}", method, other.map(|v| v.len())),
            }
        }
    }

    #[test]
    fn test_unknown_method() {
        assert!(BasketCompression::compress(SAMPLE, Compression::Unknown(7)).is_err());
        assert!(BasketCompression::decompress(SAMPLE, Compression::Unknown(7), SAMPLE.len()).is_err());
    }

    #[test]
    fn test_crc32() {
        let crc = BasketCompression::crc32(SAMPLE);
        assert!(BasketCompression::verify_crc32(SAMPLE, crc).is_ok());
        assert!(matches!(
            BasketCompression::verify_crc32(SAMPLE, crc.wrapping_add(1)),
            Err(ParseError::ChecksumMismatch { .. })
        ));
    }
}
