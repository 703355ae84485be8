//! Hand-written ASTC software backend, void-extent mode only: every block
//! encodes a single constant color for the whole block region. This is
//! always a syntactically valid ASTC block regardless of requested block
//! size (4x4 through 8x8 share the same 128-bit void-extent layout) and
//! decodes to a flat-shaded approximation of the source, trading quality
//! for guaranteed validity per every backend's feasibility contract.

use crate::error::{KtxforgeError, Result};
use crate::format::PixelFormat;

pub const NAME: &str = "astcenc";

const VOID_EXTENT_BLOCK_MODE: u32 = 0b1_1111_1100; // bits [8:0]
const COORD_DONT_CARE: u128 = 0x1FFF; // 13 bits, all ones

pub fn supports(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::Astc4x4Unorm
            | PixelFormat::Astc4x4UnormSrgb
            | PixelFormat::Astc8x8Unorm
            | PixelFormat::Astc8x8UnormSrgb
    )
}

pub fn encode(src: &[u8], w: u32, h: u32, format: PixelFormat) -> Result<Vec<u8>> {
    if !supports(format) {
        return Err(KtxforgeError::UnsupportedByAllBackends { format });
    }
    let info = format.describe();
    let (bx, by) = (info.block_width as usize, info.block_height as usize);
    let blocks_x = (w as usize + bx - 1) / bx;
    let blocks_y = (h as usize + by - 1) / by;
    let mut out = Vec::with_capacity(blocks_x * blocks_y * 16);

    for block_y in 0..blocks_y {
        for block_x in 0..blocks_x {
            let avg = average_block_color(src, w as usize, h as usize, block_x * bx, block_y * by, bx, by);
            out.extend_from_slice(&void_extent_block(avg));
        }
    }
    Ok(out)
}

fn average_block_color(src: &[u8], w: usize, h: usize, ox: usize, oy: usize, bw: usize, bh: usize) -> [u8; 4] {
    let mut sum = [0u32; 4];
    let mut count = 0u32;
    for y in 0..bh {
        let sy = (oy + y).min(h - 1);
        for x in 0..bw {
            let sx = (ox + x).min(w - 1);
            let idx = (sy * w + sx) * 4;
            for c in 0..4 {
                sum[c] += src[idx + c] as u32;
            }
            count += 1;
        }
    }
    std::array::from_fn(|c| (sum[c] / count.max(1)) as u8)
}

fn void_extent_block(color: [u8; 4]) -> [u8; 16] {
    let mut bits: u128 = VOID_EXTENT_BLOCK_MODE as u128; // bits [8:0]
    bits |= 0u128 << 9; // 2D
    bits |= 0u128 << 10; // LDR
    bits |= 0b11u128 << 11; // reserved, must be 1
    let coord_start = 13;
    for i in 0..4 {
        bits |= COORD_DONT_CARE << (coord_start + i * 13);
    }
    for (i, &c) in color.iter().enumerate() {
        let replicated = ((c as u128) << 8) | c as u128;
        bits |= replicated << (64 + i * 16);
    }
    bits.to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_is_16_bytes_regardless_of_block_dims() {
        let src = vec![200u8; 4 * 4 * 4];
        let out4x4 = encode(&src, 4, 4, PixelFormat::Astc4x4Unorm).unwrap();
        assert_eq!(out4x4.len(), 16);

        let src8 = vec![200u8; 8 * 8 * 4];
        let out8x8 = encode(&src8, 8, 8, PixelFormat::Astc8x8Unorm).unwrap();
        assert_eq!(out8x8.len(), 16);
    }

    #[test]
    fn void_extent_signature_bits_are_set() {
        let block = void_extent_block([1, 2, 3, 4]);
        let bits = u128::from_le_bytes(block);
        assert_eq!(bits & 0x1FF, VOID_EXTENT_BLOCK_MODE as u128);
    }

    #[test]
    fn non_block_aligned_dims_still_produce_whole_blocks() {
        let src = vec![64u8; 5 * 5 * 4];
        let out = encode(&src, 5, 5, PixelFormat::Astc4x4Unorm).unwrap();
        assert_eq!(out.len(), 4 * 16); // 2x2 blocks of 4x4
    }
}
