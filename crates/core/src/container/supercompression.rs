//! KTX2 per-level supercompression. Each level's payload is an independent
//! deflate stream; the uncompressed length is carried alongside so a reader
//! can size its decompression buffer without scanning ahead.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{KtxforgeError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupercompressionScheme {
    None,
    Zlib,
}

impl SupercompressionScheme {
    pub fn to_id(self) -> u32 {
        match self {
            SupercompressionScheme::None => 0,
            SupercompressionScheme::Zlib => 2,
        }
    }

    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(SupercompressionScheme::None),
            2 => Ok(SupercompressionScheme::Zlib),
            other => Err(KtxforgeError::UnsupportedFormat(other)),
        }
    }
}

pub fn compress(scheme: SupercompressionScheme, data: &[u8]) -> Result<Vec<u8>> {
    match scheme {
        SupercompressionScheme::None => Ok(data.to_vec()),
        SupercompressionScheme::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).map_err(KtxforgeError::write_failed)?;
            encoder.finish().map_err(KtxforgeError::write_failed)
        }
    }
}

/// Decompresses into a caller-provided buffer, growing it to `uncompressed_len`.
pub fn decompress_into(
    scheme: SupercompressionScheme,
    data: &[u8],
    uncompressed_len: usize,
    dst: &mut Vec<u8>,
) -> Result<()> {
    dst.clear();
    match scheme {
        SupercompressionScheme::None => {
            dst.extend_from_slice(data);
        }
        SupercompressionScheme::Zlib => {
            let mut decoder = ZlibDecoder::new(data);
            dst.reserve(uncompressed_len);
            decoder.read_to_end(dst).map_err(KtxforgeError::read_failed)?;
        }
    }
    if dst.len() != uncompressed_len {
        return Err(KtxforgeError::InconsistentLevelTable(format!(
            "decompressed {} bytes, expected {}",
            dst.len(),
            uncompressed_len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_zlib() {
        let data = b"texture payload bytes go here".repeat(8);
        let compressed = compress(SupercompressionScheme::Zlib, &data).unwrap();
        assert!(compressed.len() < data.len());
        let mut out = Vec::new();
        decompress_into(SupercompressionScheme::Zlib, &compressed, data.len(), &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn none_scheme_is_identity() {
        let data = b"raw bytes".to_vec();
        let compressed = compress(SupercompressionScheme::None, &data).unwrap();
        assert_eq!(compressed, data);
    }
}
