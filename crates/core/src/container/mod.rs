//! In-memory model of a KTX/KTX2 container: header, key/value properties,
//! per-level payload offsets, and read/write for both container generations.

pub mod ktx1;
pub mod ktx2;
pub mod props;
pub mod supercompression;

use std::io::Write;

use tracing::debug;

use crate::error::{KtxforgeError, Result};
use crate::format::PixelFormat;
pub use props::Props;
pub use supercompression::SupercompressionScheme;

/// One independently encodable 2D-surface kind a texture can be built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureType {
    Array1D,
    Texture2D,
    Array2D,
    Cube,
    CubeArray,
    Texture3D,
}

impl TextureType {
    /// Number of independently encoded 2D surfaces per mip level.
    pub fn chunk_count(self, faces: u32, array_len: u32, depth: u32) -> u32 {
        faces.max(1) * array_len.max(1) * depth.max(1)
    }

    pub fn faces(self) -> u32 {
        match self {
            TextureType::Cube | TextureType::CubeArray => 6,
            _ => 1,
        }
    }
}

/// `{widthPx, heightPx, depthPx, fileOffset, byteLength, uncompressedByteLength}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MipLevel {
    pub width_px: u32,
    pub height_px: u32,
    pub depth_px: u32,
    pub file_offset: u64,
    pub byte_length: u64,
    pub uncompressed_byte_length: u64,
}

impl MipLevel {
    /// `level[i+1]` dimensions given `level[i]`: halve, floor, clamp to 1.
    pub fn next_dims(&self) -> (u32, u32, u32) {
        (
            (self.width_px / 2).max(1),
            (self.height_px / 2).max(1),
            (self.depth_px / 2).max(1),
        )
    }
}

#[derive(Clone, Debug)]
pub struct Header {
    pub format: PixelFormat,
    pub texture_type: TextureType,
    pub width_px: u32,
    pub height_px: u32,
    pub depth_px: u32,
    pub array_len: u32,
    pub faces: u32,
}

/// Write-side state: a container is `Building` until `finalize()` is called;
/// `writeTo` requires `Finalized`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BuildState {
    Building,
    Finalized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerFormat {
    Ktx1,
    Ktx2,
}

pub struct WriteOptions {
    pub align_blocks: bool,
    pub supercompress: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            align_blocks: false,
            supercompress: false,
        }
    }
}

/// `{header, props, levels[]}`. Immutable once produced; payload bytes may
/// alias the source byte range when read from memory (see `Payload`).
pub struct Container {
    pub source_format: ContainerFormat,
    pub header: Header,
    pub props: Props,
    pub levels: Vec<MipLevel>,
    pub supercompression: SupercompressionScheme,
    payload: Payload,
    state: BuildState,
}

/// Either an owned buffer or a borrow tied to the lifetime of a mapping the
/// caller is responsible for keeping alive (see `crate::pipeline::source`).
enum Payload {
    Owned(Vec<u8>),
}

impl Container {
    pub fn build(header: Header, props: Props, levels: Vec<MipLevel>, payload: Vec<u8>) -> Self {
        Self {
            source_format: ContainerFormat::Ktx2,
            header,
            props,
            levels,
            supercompression: SupercompressionScheme::None,
            payload: Payload::Owned(payload),
            state: BuildState::Building,
        }
    }

    pub fn open_for_read(bytes: &[u8]) -> Result<Self> {
        let container = if bytes.len() >= ktx2::SIGNATURE.len() && &bytes[..ktx2::SIGNATURE.len()] == ktx2::SIGNATURE {
            ktx2::parse(bytes)
        } else if bytes.len() >= ktx1::SIGNATURE.len() && &bytes[..ktx1::SIGNATURE.len()] == ktx1::SIGNATURE {
            ktx1::parse(bytes)
        } else {
            Err(KtxforgeError::BadSignature)
        }?;
        debug!(
            format = ?container.source_format,
            levels = container.levels.len(),
            width = container.header.width_px,
            height = container.header.height_px,
            "container opened"
        );
        Ok(container)
    }

    /// Read view into one level, transparently decompressing supercompressed
    /// KTX2 levels into `scratch`. For an uncompressed container this borrows
    /// straight from the payload.
    pub fn level_bytes<'a>(&'a self, level: usize, scratch: &'a mut Vec<u8>) -> Result<&'a [u8]> {
        let raw = self.level_bytes_raw(level)?;
        if self.supercompression == SupercompressionScheme::None {
            return Ok(raw);
        }
        let rec = self.levels[level];
        supercompression::decompress_into(
            self.supercompression,
            raw,
            rec.uncompressed_byte_length as usize,
            scratch,
        )?;
        Ok(scratch.as_slice())
    }

    pub fn level_bytes_raw(&self, level: usize) -> Result<&[u8]> {
        let rec = self
            .levels
            .get(level)
            .ok_or_else(|| KtxforgeError::InconsistentLevelTable(format!("no such level {level}")))?;
        let Payload::Owned(buf) = &self.payload;
        let start = rec.file_offset as usize;
        let end = start
            .checked_add(rec.byte_length as usize)
            .ok_or(KtxforgeError::TruncatedHeader)?;
        buf.get(start..end)
            .ok_or(KtxforgeError::Truncated { level: level as u32 })
    }

    pub fn finalize(&mut self) {
        self.state = BuildState::Finalized;
    }

    pub fn write_to<W: Write>(&self, sink: &mut W, format: ContainerFormat, opts: &WriteOptions) -> Result<()> {
        if self.state != BuildState::Finalized {
            return Err(KtxforgeError::InconsistentLevelTable(
                "container must be finalized before writeTo".into(),
            ));
        }
        debug!(format = ?format, levels = self.levels.len(), "container writing");
        match format {
            ContainerFormat::Ktx1 => ktx1::write(self, sink, opts),
            ContainerFormat::Ktx2 => ktx2::write(self, sink, opts),
        }
    }
}

pub(crate) fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        (value + align - 1) / align * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_next_dims_halves_and_clamps_to_one() {
        let level = MipLevel {
            width_px: 1,
            height_px: 3,
            depth_px: 1,
            file_offset: 0,
            byte_length: 0,
            uncompressed_byte_length: 0,
        };
        assert_eq!(level.next_dims(), (1, 1, 1));
    }

    #[test]
    fn chunk_count_multiplies_nonzero_dims() {
        assert_eq!(TextureType::Cube.chunk_count(6, 0, 0), 6);
        assert_eq!(TextureType::Array2D.chunk_count(1, 4, 0), 4);
    }
}
