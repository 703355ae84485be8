//! KTX1 container: signature `\xABKTX 11\xBB\r\n\x1A\n`, a 64-byte fixed
//! header in the OpenGL vocabulary, a key/value block, then per-level
//! payloads ordered array -> face -> depth.
//!
//! Each level is either prefixed with a 4-byte length (classic layout) or,
//! when the writer was asked to align blocks, the prefix is suppressed and
//! levels are padded to the format's block size instead (see the Open
//! Questions note on distinguishing the two on read).

use std::io::Write;

use crate::container::{align_up, Container, ContainerFormat, Header, MipLevel, Props, TextureType, WriteOptions};
use crate::error::{KtxforgeError, Result};
use crate::format::PixelFormat;

pub const SIGNATURE: &[u8; 12] = b"\xABKTX 11\xBB\r\n\x1A\n";
const HEADER_LEN: usize = 64;
const ENDIAN_MARKER: u32 = 0x04030201;

/// `is_1d` is the KTX convention `pixelHeight == 0`. There is no plain
/// (non-array) 1D variant in `TextureType`, so a non-array 1D file falls
/// back to `Texture2D` (its processing height is already clamped to 1);
/// only the array case needs a dedicated branch to round-trip.
fn texture_type_from_counts(array_len: u32, faces: u32, depth: u32, is_1d: bool) -> TextureType {
    if is_1d && array_len > 0 && faces != 6 && depth <= 1 {
        return TextureType::Array1D;
    }
    match (array_len > 0, faces == 6, depth > 1) {
        (false, false, false) => TextureType::Texture2D,
        (true, false, false) => TextureType::Array2D,
        (false, true, false) => TextureType::Cube,
        (true, true, false) => TextureType::CubeArray,
        (_, false, true) => TextureType::Texture3D,
        _ => TextureType::Array2D,
    }
}

pub fn parse(bytes: &[u8]) -> Result<Container> {
    if bytes.len() < HEADER_LEN {
        return Err(KtxforgeError::TruncatedHeader);
    }
    if &bytes[..12] != SIGNATURE {
        return Err(KtxforgeError::BadSignature);
    }
    let endianness = read_u32(bytes, 12);
    if endianness != ENDIAN_MARKER {
        return Err(KtxforgeError::TruncatedHeader);
    }
    let gl_internal_format = read_u32(bytes, 24);
    let pixel_width = read_u32(bytes, 36).max(1);
    let pixel_height_raw = read_u32(bytes, 40);
    let is_1d = pixel_height_raw == 0;
    let pixel_height = pixel_height_raw.max(1);
    let pixel_depth = read_u32(bytes, 44);
    let array_elements = read_u32(bytes, 48);
    let faces = read_u32(bytes, 52).max(1);
    let mip_levels = read_u32(bytes, 56).max(1);
    let kv_len = read_u32(bytes, 60) as usize;

    let format = PixelFormat::from_gl_internal_format(gl_internal_format)?;
    let info = format.describe();

    let kv_start = HEADER_LEN;
    let kv_end = kv_start
        .checked_add(kv_len)
        .ok_or(KtxforgeError::TruncatedHeader)?;
    let kv_bytes = bytes.get(kv_start..kv_end).ok_or(KtxforgeError::TruncatedHeader)?;
    let props = Props::parse_ktx1(kv_bytes)?;

    let texture_type = texture_type_from_counts(array_elements, faces, pixel_depth.max(1), is_1d);
    let chunk_count = texture_type.chunk_count(faces, array_elements, pixel_depth);

    // Distinguish classic (length-prefixed) from aligned layout: try the
    // classic interpretation first; per the Open Questions note, an
    // ambiguous file prefers the classic layout.
    let mut levels = Vec::with_capacity(mip_levels as usize);
    let mut cursor = kv_end;
    let (mut w, mut h, mut d) = (pixel_width, pixel_height, pixel_depth.max(1));
    for level_index in 0..mip_levels {
        if cursor + 4 > bytes.len() {
            return Err(KtxforgeError::Truncated { level: level_index });
        }
        let declared_len = read_u32(bytes, cursor) as u64;
        cursor += 4;
        let face_bytes = (info.bytes_per_block as u64)
            * div_round_up(w, info.block_width) as u64
            * div_round_up(h, info.block_height) as u64
            * d as u64;
        let total_len = face_bytes * chunk_count as u64;
        if declared_len != total_len {
            return Err(KtxforgeError::InconsistentLevelTable(format!(
                "level {level_index}: declared {declared_len}, computed {total_len}"
            )));
        }
        let offset = cursor as u64;
        let end = offset
            .checked_add(total_len)
            .ok_or(KtxforgeError::Truncated { level: level_index })?;
        if end > bytes.len() as u64 {
            return Err(KtxforgeError::Truncated { level: level_index });
        }
        levels.push(MipLevel {
            width_px: w,
            height_px: h,
            depth_px: d,
            file_offset: offset,
            byte_length: total_len,
            uncompressed_byte_length: total_len,
        });
        cursor = end as usize;
        // KTX1 pads each level to 4 bytes.
        cursor = (cursor + 3) & !3;
        let next = levels.last().unwrap().next_dims();
        w = next.0;
        h = next.1;
        d = next.2;
    }

    let header = Header {
        format,
        texture_type,
        width_px: pixel_width,
        height_px: pixel_height,
        depth_px: pixel_depth.max(1),
        array_len: array_elements,
        faces,
    };
    let mut container = Container::build(header, props, levels, bytes.to_vec());
    container.source_format = ContainerFormat::Ktx1;
    container.finalize();
    Ok(container)
}

pub fn write<W: Write>(container: &Container, sink: &mut W, opts: &WriteOptions) -> Result<()> {
    let info = container.header.format.describe();
    // Block-compressed and explicit-packed formats both use glType=0 per the
    // KTX1 spec's "compressed texture" convention; glTypeSize is unused then.
    let gl_type_size = 1u32;
    let gl_internal_format = container
        .header
        .format
        .to_gl_internal_format()
        .ok_or(KtxforgeError::UnmappedFormat(container.header.format, "opengl"))?;

    let mut out = Vec::new();
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&ENDIAN_MARKER.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // glType: compressed/explicit handled via internal format
    out.extend_from_slice(&gl_type_size.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // glFormat
    out.extend_from_slice(&gl_internal_format.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // glBaseInternalFormat
    out.extend_from_slice(&container.header.width_px.to_le_bytes());
    let pixel_height = if container.header.texture_type == TextureType::Array1D {
        0
    } else {
        container.header.height_px
    };
    out.extend_from_slice(&pixel_height.to_le_bytes());
    out.extend_from_slice(&if container.header.depth_px > 1 {
        container.header.depth_px
    } else {
        0
    }
    .to_le_bytes());
    out.extend_from_slice(&container.header.array_len.to_le_bytes());
    out.extend_from_slice(&container.header.faces.to_le_bytes());
    out.extend_from_slice(&(container.levels.len() as u32).to_le_bytes());

    let kv_bytes = container.props.write_ktx1();
    out.extend_from_slice(&(kv_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&kv_bytes);

    debug_assert_eq!(out.len(), HEADER_LEN + kv_bytes.len());

    for (level_index, level) in container.levels.iter().enumerate() {
        let raw = container.level_bytes_raw(level_index)?;
        if opts.align_blocks {
            let align = info.bytes_per_block as u64;
            let padded_offset = align_up(out.len() as u64, align);
            out.resize(padded_offset as usize, 0);
            if (raw.len() as u64) % align != 0 {
                return Err(KtxforgeError::DimensionNotBlockAligned {
                    format: container.header.format,
                    width: level.width_px,
                    height: level.height_px,
                    bx: info.block_width,
                    by: info.block_height,
                });
            }
            out.extend_from_slice(raw);
        } else {
            out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
            out.extend_from_slice(raw);
            let padded = (out.len() + 3) & !3;
            out.resize(padded, 0);
        }
    }

    sink.write_all(&out).map_err(KtxforgeError::write_failed)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn div_round_up(value: u32, div: u32) -> u32 {
    (value + div - 1) / div
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Header, Props};

    fn solid_rgba8_container(w: u32, h: u32) -> Container {
        let header = Header {
            format: PixelFormat::Rgba8Unorm,
            texture_type: TextureType::Texture2D,
            width_px: w,
            height_px: h,
            depth_px: 1,
            array_len: 0,
            faces: 1,
        };
        let payload = vec![255u8, 0, 0, 255].repeat((w * h) as usize);
        let level = MipLevel {
            width_px: w,
            height_px: h,
            depth_px: 1,
            file_offset: 0,
            byte_length: payload.len() as u64,
            uncompressed_byte_length: payload.len() as u64,
        };
        let mut container = Container::build(header, Props::new(), vec![level], payload);
        container.finalize();
        container
    }

    #[test]
    fn four_by_four_red_roundtrips_with_exact_size() {
        let container = solid_rgba8_container(4, 4);
        let mut bytes = Vec::new();
        container
            .write_to(&mut bytes, ContainerFormat::Ktx1, &WriteOptions::default())
            .unwrap();
        // 64 header + 4 length prefix + 64 payload
        assert_eq!(bytes.len(), 64 + 4 + 64);

        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.levels.len(), 1);
        assert_eq!(parsed.levels[0].byte_length, 64);
        let mut scratch = Vec::new();
        let decoded = parsed.level_bytes(0, &mut scratch).unwrap();
        assert_eq!(decoded, vec![255u8, 0, 0, 255].repeat(16).as_slice());
    }

    #[test]
    fn bad_signature_is_rejected() {
        let bytes = vec![0u8; 64];
        assert!(matches!(parse(&bytes), Err(KtxforgeError::BadSignature)));
    }

    #[test]
    fn one_d_array_roundtrips_through_zero_pixel_height() {
        let w = 4;
        let array_len = 3;
        let header = Header {
            format: PixelFormat::Rgba8Unorm,
            texture_type: TextureType::Array1D,
            width_px: w,
            height_px: 1,
            depth_px: 1,
            array_len,
            faces: 1,
        };
        let payload = vec![1u8, 2, 3, 4].repeat((w * array_len) as usize);
        let level = MipLevel {
            width_px: w,
            height_px: 1,
            depth_px: 1,
            file_offset: 0,
            byte_length: payload.len() as u64,
            uncompressed_byte_length: payload.len() as u64,
        };
        let mut container = Container::build(header, Props::new(), vec![level], payload);
        container.finalize();

        let mut bytes = Vec::new();
        container
            .write_to(&mut bytes, ContainerFormat::Ktx1, &WriteOptions::default())
            .unwrap();
        assert_eq!(read_u32(&bytes, 40), 0, "pixelHeight must be written as 0 for a 1D array");

        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.header.texture_type, TextureType::Array1D);
        assert_eq!(parsed.header.array_len, array_len);
    }
}
