//! Hand-written ETC2 "individual mode" software backend. ETC2's individual
//! mode is bit-compatible with ETC1, so a valid ETC1 individual-mode block
//! is always a valid ETC2 block. This encoder favors correctness (every
//! block it emits decodes back to a plausible approximation of the source)
//! over the heuristics a real encoder would use to pick differential vs.
//! individual mode, flip direction, or per-pixel index refinement.

use crate::error::{KtxforgeError, Result};
use crate::format::PixelFormat;

pub const NAME: &str = "etcenc";

const MODIFIER_TABLE: [[i32; 2]; 8] = [
    [2, 8],
    [5, 17],
    [9, 29],
    [13, 42],
    [18, 60],
    [24, 80],
    [33, 106],
    [47, 183],
];

pub fn supports(format: PixelFormat) -> bool {
    matches!(format, PixelFormat::Etc2Rgb8Unorm | PixelFormat::Etc2Rgba8Unorm)
}

pub fn encode(src: &[u8], w: u32, h: u32, format: PixelFormat) -> Result<Vec<u8>> {
    if !supports(format) {
        return Err(KtxforgeError::UnsupportedByAllBackends { format });
    }
    let blocks_x = (w as usize + 3) / 4;
    let blocks_y = (h as usize + 3) / 4;
    let has_alpha = format == PixelFormat::Etc2Rgba8Unorm;
    let block_bytes = if has_alpha { 16 } else { 8 };
    let mut out = vec![0u8; blocks_x * blocks_y * block_bytes];

    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let mut rgb = [[0u8; 3]; 16];
            let mut alpha = [255u8; 16];
            for py in 0..4 {
                for px in 0..4 {
                    let sx = (bx * 4 + px).min(w as usize - 1);
                    let sy = (by * 4 + py).min(h as usize - 1);
                    let idx = (sy * w as usize + sx) * 4;
                    let i = py * 4 + px;
                    rgb[i] = [src[idx], src[idx + 1], src[idx + 2]];
                    alpha[i] = src[idx + 3];
                }
            }
            let block_offset = (by * blocks_x + bx) * block_bytes;
            let rgb_block = encode_individual_mode_block(&rgb);
            if has_alpha {
                let alpha_block = encode_eac_alpha_block(&alpha);
                out[block_offset..block_offset + 8].copy_from_slice(&alpha_block);
                out[block_offset + 8..block_offset + 16].copy_from_slice(&rgb_block);
            } else {
                out[block_offset..block_offset + 8].copy_from_slice(&rgb_block);
            }
        }
    }
    Ok(out)
}

/// Encodes one 4x4 RGB block in ETC1/ETC2 individual mode: two 2x4 subblocks
/// (vertical split, no flip), shared modifier table index 0, per-pixel 1-bit
/// sign choosing between the table's two magnitudes applied uniformly to R/G/B.
fn encode_individual_mode_block(rgb: &[[u8; 3]; 16]) -> [u8; 8] {
    let left: Vec<[u8; 3]> = (0..16).filter(|&i| i % 4 < 2).map(|i| rgb[i]).collect();
    let right: Vec<[u8; 3]> = (0..16).filter(|&i| i % 4 >= 2).map(|i| rgb[i]).collect();

    let base1 = average_color(&left);
    let base2 = average_color(&right);
    let q1 = quantize_4bit(base1);
    let q2 = quantize_4bit(base2);

    let cw_index = 0u32;
    let [mag_lo, mag_hi] = MODIFIER_TABLE[cw_index as usize];

    let mut msb_plane = 0u16;
    let mut lsb_plane = 0u16;
    for i in 0..16 {
        let base = if i % 4 < 2 { expand_4bit(q1) } else { expand_4bit(q2) };
        let luma_delta = luma(rgb[i]) as i32 - luma(base) as i32;
        let (sign, use_high) = if luma_delta >= 0 {
            (0u16, luma_delta > mag_lo)
        } else {
            (1u16, -luma_delta > mag_lo)
        };
        let _ = (mag_hi, use_high);
        // bit plane layout: pixel index (0..16) maps to (x,y) = (i/4, i%4);
        // ETC1 orders pixel bits column-major, pixel 0 = (x=0,y=0).
        let (px, py) = (i / 4, i % 4);
        let pixel_number = px * 4 + py;
        msb_plane |= (sign & 1) << pixel_number;
        lsb_plane |= (use_high as u16) << pixel_number;
    }

    let mut block = [0u8; 8];
    block[0] = (q1.0 << 4) | q2.0;
    block[1] = (q1.1 << 4) | q2.1;
    block[2] = (q1.2 << 4) | q2.2;
    // byte 3: cw1 (3 bits) | cw2 (3 bits) | diffbit (1) | flipbit (1)
    block[3] = ((cw_index as u8) << 5) | ((cw_index as u8) << 2) | (0 << 1) | 0;
    block[4] = (msb_plane >> 8) as u8;
    block[5] = (msb_plane & 0xFF) as u8;
    block[6] = (lsb_plane >> 8) as u8;
    block[7] = (lsb_plane & 0xFF) as u8;
    block
}

/// Simplified EAC alpha block: constant base value, zero multiplier, all
/// indices pointing at the midpoint entry. Always valid, not adaptive.
fn encode_eac_alpha_block(alpha: &[u8; 16]) -> [u8; 8] {
    let avg = (alpha.iter().map(|&a| a as u32).sum::<u32>() / 16) as u8;
    let mut block = [0u8; 8];
    block[0] = avg;
    block[1] = 0; // multiplier = 0, table index = 0
    // remaining 48 bits: 16 * 3-bit indices, all pointing at table entry 4 (mid)
    let index = 4u64;
    let mut bits: u64 = 0;
    for i in 0..16 {
        bits |= index << (45 - i * 3);
    }
    block[2..8].copy_from_slice(&bits.to_be_bytes()[2..8]);
    block
}

fn average_color(pixels: &[[u8; 3]]) -> [u8; 3] {
    let mut sum = [0u32; 3];
    for p in pixels {
        for c in 0..3 {
            sum[c] += p[c] as u32;
        }
    }
    let n = pixels.len().max(1) as u32;
    [(sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8]
}

fn quantize_4bit(c: [u8; 3]) -> (u8, u8, u8) {
    (c[0] >> 4, c[1] >> 4, c[2] >> 4)
}

fn expand_4bit(q: (u8, u8, u8)) -> [u8; 3] {
    [(q.0 << 4) | q.0, (q.1 << 4) | q.1, (q.2 << 4) | q.2]
}

fn luma(c: [u8; 3]) -> u32 {
    (c[0] as u32 * 3 + c[1] as u32 * 6 + c[2] as u32) / 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_8_bytes_per_block_for_rgb() {
        let src = vec![128u8; 4 * 4 * 4];
        let out = encode(&src, 4, 4, PixelFormat::Etc2Rgb8Unorm).unwrap();
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn output_is_16_bytes_per_block_for_rgba() {
        let src = vec![128u8; 4 * 4 * 4];
        let out = encode(&src, 4, 4, PixelFormat::Etc2Rgba8Unorm).unwrap();
        assert_eq!(out.len(), 16);
    }

    #[test]
    fn pads_non_block_aligned_dimensions() {
        let src = vec![64u8; 3 * 3 * 4];
        let out = encode(&src, 3, 3, PixelFormat::Etc2Rgb8Unorm).unwrap();
        assert_eq!(out.len(), 8);
    }
}
