//! Owning pixel buffer in either RGBA8 or RGBA32F storage, with the
//! preprocessing operations the pipeline orchestrator applies before mip
//! generation and block encoding.

pub mod exr;
pub mod filter;
pub mod png;
pub mod sdf;

pub use filter::Filter;

use crate::error::{KtxforgeError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Storage {
    Rgba8,
    Rgba32F,
}

/// `{widthPx, heightPx, chunks, storage}`. `chunks = faces * arrayLen *
/// depth`; every chunk shares identical 2D dimensions.
#[derive(Clone, Debug)]
pub struct ImageBuffer {
    width_px: u32,
    height_px: u32,
    chunks: u32,
    storage: Storage,
    rgba8: Vec<u8>,
    rgba32f: Vec<f32>,
    premultiplied: bool,
    is_srgb_encoded: bool,
    has_color: bool,
    has_alpha: bool,
}

impl ImageBuffer {
    pub fn width(&self) -> u32 {
        self.width_px
    }

    pub fn height(&self) -> u32 {
        self.height_px
    }

    pub fn chunks(&self) -> u32 {
        self.chunks
    }

    pub fn storage(&self) -> Storage {
        self.storage
    }

    pub fn is_premultiplied(&self) -> bool {
        self.premultiplied
    }

    pub fn is_srgb_encoded(&self) -> bool {
        self.is_srgb_encoded
    }

    /// Whether the source carried real chroma (vs. a grayscale origin),
    /// carried through from the decoder's `hasColor` flag for provenance.
    pub fn has_color(&self) -> bool {
        self.has_color
    }

    /// Whether the source carried an alpha channel or transparency chunk,
    /// carried through from the decoder's `hasAlpha` flag for provenance.
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    fn chunk_pixel_count(&self) -> usize {
        self.width_px as usize * self.height_px as usize
    }

    pub fn rgba8_bytes(&self) -> &[u8] {
        debug_assert_eq!(self.storage, Storage::Rgba8);
        &self.rgba8
    }

    pub fn rgba32f_samples(&self) -> &[f32] {
        debug_assert_eq!(self.storage, Storage::Rgba32F);
        &self.rgba32f
    }

    /// `loadFromRGBA8(pixels, w, h, hasColor, hasAlpha, chunks)`: takes
    /// ownership of a contiguous RGBA8 buffer. `has_color`/`has_alpha` are
    /// provenance only — they do not gate which channels get processed,
    /// since the buffer is always stored as full RGBA.
    pub fn load_from_rgba8(pixels: Vec<u8>, w: u32, h: u32, has_color: bool, has_alpha: bool, chunks: u32) -> Result<Self> {
        let expected = w as usize * h as usize * chunks.max(1) as usize * 4;
        if pixels.len() != expected {
            return Err(KtxforgeError::BadFlag(format!(
                "rgba8 buffer has {} bytes, expected {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width_px: w,
            height_px: h,
            chunks: chunks.max(1),
            storage: Storage::Rgba8,
            rgba8: pixels,
            rgba32f: Vec::new(),
            premultiplied: false,
            is_srgb_encoded: true,
            has_color,
            has_alpha,
        })
    }

    pub fn load_from_rgba32f(pixels: Vec<f32>, w: u32, h: u32, has_color: bool, has_alpha: bool, chunks: u32) -> Result<Self> {
        let expected = w as usize * h as usize * chunks.max(1) as usize * 4;
        if pixels.len() != expected {
            return Err(KtxforgeError::BadFlag(format!(
                "rgba32f buffer has {} samples, expected {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width_px: w,
            height_px: h,
            chunks: chunks.max(1),
            storage: Storage::Rgba32F,
            rgba8: Vec::new(),
            rgba32f: pixels,
            premultiplied: false,
            is_srgb_encoded: false,
            has_color,
            has_alpha,
        })
    }

    /// `resize(newW, newH, pow2?, filter)`: per chunk; preserves chunk count.
    pub fn resize(&mut self, new_w: u32, new_h: u32, pow2: bool, filter: Filter) {
        let (new_w, new_h) = if pow2 {
            (prev_pow2(new_w), prev_pow2(new_h))
        } else {
            (new_w.max(1), new_h.max(1))
        };
        if new_w == self.width_px && new_h == self.height_px {
            return;
        }
        match self.storage {
            Storage::Rgba8 => self.resize_rgba8(new_w, new_h, filter),
            Storage::Rgba32F => self.resize_rgba32f(new_w, new_h, filter),
        }
        self.width_px = new_w;
        self.height_px = new_h;
    }

    /// Filters in linear light: sRGB-encoded sources are linearized before
    /// resampling and re-encoded after, so gamma-space mips never blend
    /// encoded samples as if they were linear (alpha is never a transfer
    /// target and passes through unchanged either way).
    fn resize_rgba8(&mut self, new_w: u32, new_h: u32, filter: Filter) {
        let linearize = self.is_srgb_encoded;
        let mut out = Vec::with_capacity(new_w as usize * new_h as usize * self.chunks as usize * 4);
        let chunk_pixels = self.chunk_pixel_count();
        for c in 0..self.chunks as usize {
            let src_f32: Vec<f32> = self.rgba8[c * chunk_pixels * 4..(c + 1) * chunk_pixels * 4]
                .iter()
                .enumerate()
                .map(|(i, &b)| {
                    let v = b as f32 / 255.0;
                    if linearize && i % 4 != 3 { srgb_to_linear(v) } else { v }
                })
                .collect();
            let resized = resize_chunk_f32(&src_f32, self.width_px, self.height_px, new_w, new_h, filter);
            out.extend(resized.into_iter().enumerate().map(|(i, v)| {
                let v = if linearize && i % 4 != 3 { linear_to_srgb(v) } else { v };
                (v.clamp(0.0, 1.0) * 255.0).round() as u8
            }));
        }
        self.rgba8 = out;
    }

    fn resize_rgba32f(&mut self, new_w: u32, new_h: u32, filter: Filter) {
        let linearize = self.is_srgb_encoded;
        let mut out = Vec::with_capacity(new_w as usize * new_h as usize * self.chunks as usize * 4);
        let chunk_pixels = self.chunk_pixel_count();
        for c in 0..self.chunks as usize {
            let chunk = &self.rgba32f[c * chunk_pixels * 4..(c + 1) * chunk_pixels * 4];
            let src: Vec<f32> = if linearize {
                chunk
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| if i % 4 != 3 { srgb_to_linear(v) } else { v })
                    .collect()
            } else {
                chunk.to_vec()
            };
            let resized = resize_chunk_f32(&src, self.width_px, self.height_px, new_w, new_h, filter);
            if linearize {
                out.extend(
                    resized
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| if i % 4 != 3 { linear_to_srgb(v) } else { v }),
                );
            } else {
                out.extend(resized);
            }
        }
        self.rgba32f = out;
    }

    /// `swizzle(pattern)`: four tokens from {r,g,b,a,0,1}.
    pub fn swizzle(&mut self, pattern: [SwizzleToken; 4]) {
        match self.storage {
            Storage::Rgba8 => {
                for px in self.rgba8.chunks_exact_mut(4) {
                    let src = [px[0], px[1], px[2], px[3]];
                    for i in 0..4 {
                        px[i] = match pattern[i] {
                            SwizzleToken::R => src[0],
                            SwizzleToken::G => src[1],
                            SwizzleToken::B => src[2],
                            SwizzleToken::A => src[3],
                            SwizzleToken::Zero => 0,
                            SwizzleToken::One => 255,
                        };
                    }
                }
            }
            Storage::Rgba32F => {
                for px in self.rgba32f.chunks_exact_mut(4) {
                    let src = [px[0], px[1], px[2], px[3]];
                    for i in 0..4 {
                        px[i] = match pattern[i] {
                            SwizzleToken::R => src[0],
                            SwizzleToken::G => src[1],
                            SwizzleToken::B => src[2],
                            SwizzleToken::A => src[3],
                            SwizzleToken::Zero => 0.0,
                            SwizzleToken::One => 1.0,
                        };
                    }
                }
            }
        }
    }

    /// `averagePerBlock(mask, bx, by)`: collapses each `bx x by` block to its
    /// mean per masked channel, used to flatten normal-map redundancy.
    pub fn average_per_block(&mut self, mask: [bool; 4], bx: u32, by: u32) {
        let w = self.width_px as usize;
        let h = self.height_px as usize;
        let chunk_pixels = w * h;
        match self.storage {
            Storage::Rgba8 => {
                for c in 0..self.chunks as usize {
                    let chunk = &mut self.rgba8[c * chunk_pixels * 4..(c + 1) * chunk_pixels * 4];
                    average_blocks_u8(chunk, w, h, bx as usize, by as usize, mask);
                }
            }
            Storage::Rgba32F => {
                for c in 0..self.chunks as usize {
                    let chunk = &mut self.rgba32f[c * chunk_pixels * 4..(c + 1) * chunk_pixels * 4];
                    average_blocks_f32(chunk, w, h, bx as usize, by as usize, mask);
                }
            }
        }
    }

    /// `premultiplyAlpha()`: idempotent under the tracked `premultiplied` flag.
    pub fn premultiply_alpha(&mut self) {
        if self.premultiplied {
            return;
        }
        match self.storage {
            Storage::Rgba8 => {
                for px in self.rgba8.chunks_exact_mut(4) {
                    let a = px[3] as f32 / 255.0;
                    px[0] = (px[0] as f32 * a).round() as u8;
                    px[1] = (px[1] as f32 * a).round() as u8;
                    px[2] = (px[2] as f32 * a).round() as u8;
                }
            }
            Storage::Rgba32F => {
                for px in self.rgba32f.chunks_exact_mut(4) {
                    let a = px[3];
                    px[0] *= a;
                    px[1] *= a;
                    px[2] *= a;
                }
            }
        }
        self.premultiplied = true;
    }

    /// `toLinearFromSRGB()`: idempotent under the `colorspace` flag.
    pub fn to_linear_from_srgb(&mut self) {
        if !self.is_srgb_encoded {
            return;
        }
        self.apply_transfer(srgb_to_linear);
        self.is_srgb_encoded = false;
    }

    /// `toSRGBFromLinear()`: idempotent under the `colorspace` flag.
    pub fn to_srgb_from_linear(&mut self) {
        if self.is_srgb_encoded {
            return;
        }
        self.apply_transfer(linear_to_srgb);
        self.is_srgb_encoded = true;
    }

    fn apply_transfer(&mut self, f: fn(f32) -> f32) {
        match self.storage {
            Storage::Rgba8 => {
                for px in self.rgba8.chunks_exact_mut(4) {
                    for c in 0..3 {
                        let v = px[c] as f32 / 255.0;
                        px[c] = (f(v).clamp(0.0, 1.0) * 255.0).round() as u8;
                    }
                }
            }
            Storage::Rgba32F => {
                for px in self.rgba32f.chunks_exact_mut(4) {
                    for c in 0..3 {
                        px[c] = f(px[c]);
                    }
                }
            }
        }
    }

    /// `signedDistanceField(maxRadius?)`: produces a single-chunk R8 image
    /// from a binary mask derived from this buffer's red channel (or alpha
    /// for SDF-from-alpha sources, selected by the caller before calling).
    pub fn signed_distance_field(&self, max_radius: f32) -> ImageBuffer {
        let w = self.width_px as usize;
        let h = self.height_px as usize;
        let mask: Vec<f32> = match self.storage {
            Storage::Rgba8 => self.rgba8.chunks_exact(4).take(w * h).map(|px| px[0] as f32 / 255.0).collect(),
            Storage::Rgba32F => self.rgba32f.chunks_exact(4).take(w * h).map(|px| px[0]).collect(),
        };
        let (values, _radius) = sdf::signed_distance_field(&mask, w, h, max_radius);
        let mut rgba8 = Vec::with_capacity(values.len() * 4);
        for &v in &values {
            rgba8.extend_from_slice(&[v, v, v, 255]);
        }
        ImageBuffer {
            width_px: self.width_px,
            height_px: self.height_px,
            chunks: 1,
            storage: Storage::Rgba8,
            rgba8,
            rgba32f: Vec::new(),
            premultiplied: false,
            is_srgb_encoded: false,
            has_color: false,
            has_alpha: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwizzleToken {
    R,
    G,
    B,
    A,
    Zero,
    One,
}

impl SwizzleToken {
    pub fn parse(c: char) -> Result<Self> {
        Ok(match c {
            'r' => SwizzleToken::R,
            'g' => SwizzleToken::G,
            'b' => SwizzleToken::B,
            'a' => SwizzleToken::A,
            '0' => SwizzleToken::Zero,
            '1' => SwizzleToken::One,
            other => return Err(KtxforgeError::BadSwizzleSpec(format!("unknown token '{other}'"))),
        })
    }

    pub fn parse_pattern(pattern: &str) -> Result<[Self; 4]> {
        let chars: Vec<char> = pattern.chars().collect();
        if chars.len() != 4 {
            return Err(KtxforgeError::BadSwizzleSpec(format!(
                "expected 4 tokens, got {}",
                chars.len()
            )));
        }
        Ok([
            Self::parse(chars[0])?,
            Self::parse(chars[1])?,
            Self::parse(chars[2])?,
            Self::parse(chars[3])?,
        ])
    }
}

fn resize_chunk_f32(src: &[f32], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32, filter: Filter) -> Vec<f32> {
    // Horizontal pass then vertical pass, each channel-interleaved.
    let mut rows = Vec::with_capacity(src_h as usize * dst_w as usize * 4);
    for y in 0..src_h as usize {
        let row = &src[y * src_w as usize * 4..(y + 1) * src_w as usize * 4];
        let resized_row = filter::resample_axis(row, src_w as usize, dst_w as usize, 4, filter);
        rows.extend(resized_row);
    }
    let mut out = vec![0.0f32; dst_w as usize * dst_h as usize * 4];
    for x in 0..dst_w as usize {
        let mut column = vec![0.0f32; src_h as usize * 4];
        for y in 0..src_h as usize {
            for c in 0..4 {
                column[y * 4 + c] = rows[y * dst_w as usize * 4 + x * 4 + c];
            }
        }
        let resized_column = filter::resample_axis(&column, src_h as usize, dst_h as usize, 4, filter);
        for y in 0..dst_h as usize {
            for c in 0..4 {
                out[y * dst_w as usize * 4 + x * 4 + c] = resized_column[y * 4 + c];
            }
        }
    }
    out
}

fn average_blocks_u8(chunk: &mut [u8], w: usize, h: usize, bx: usize, by: usize, mask: [bool; 4]) {
    let mut by_block = 0;
    while by_block < h {
        let mut bx_block = 0;
        while bx_block < w {
            let bw = bx.min(w - bx_block);
            let bh = by.min(h - by_block);
            let mut sums = [0u32; 4];
            let count = (bw * bh) as u32;
            for y in 0..bh {
                for x in 0..bw {
                    let idx = ((by_block + y) * w + (bx_block + x)) * 4;
                    for c in 0..4 {
                        sums[c] += chunk[idx + c] as u32;
                    }
                }
            }
            let means: [u8; 4] = std::array::from_fn(|c| (sums[c] / count.max(1)) as u8);
            for y in 0..bh {
                for x in 0..bw {
                    let idx = ((by_block + y) * w + (bx_block + x)) * 4;
                    for c in 0..4 {
                        if mask[c] {
                            chunk[idx + c] = means[c];
                        }
                    }
                }
            }
            bx_block += bx;
        }
        by_block += by;
    }
}

fn average_blocks_f32(chunk: &mut [f32], w: usize, h: usize, bx: usize, by: usize, mask: [bool; 4]) {
    let mut by_block = 0;
    while by_block < h {
        let mut bx_block = 0;
        while bx_block < w {
            let bw = bx.min(w - bx_block);
            let bh = by.min(h - by_block);
            let mut sums = [0.0f32; 4];
            let count = (bw * bh).max(1) as f32;
            for y in 0..bh {
                for x in 0..bw {
                    let idx = ((by_block + y) * w + (bx_block + x)) * 4;
                    for c in 0..4 {
                        sums[c] += chunk[idx + c];
                    }
                }
            }
            let means: [f32; 4] = std::array::from_fn(|c| sums[c] / count);
            for y in 0..bh {
                for x in 0..bw {
                    let idx = ((by_block + y) * w + (bx_block + x)) * 4;
                    for c in 0..4 {
                        if mask[c] {
                            chunk[idx + c] = means[c];
                        }
                    }
                }
            }
            bx_block += bx;
        }
        by_block += by;
    }
}

/// Standard piecewise sRGB transfer, threshold at 0.0031308.
pub fn linear_to_srgb(linear: f32) -> f32 {
    if linear <= 0.0031308 {
        linear * 12.92
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    }
}

/// Standard piecewise inverse sRGB transfer, threshold at 0.04045.
pub fn srgb_to_linear(encoded: f32) -> f32 {
    if encoded <= 0.04045 {
        encoded / 12.92
    } else {
        ((encoded + 0.055) / 1.055).powf(2.4)
    }
}

fn prev_pow2(v: u32) -> u32 {
    if v <= 1 {
        1
    } else {
        1u32 << (31 - v.leading_zeros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiply_is_idempotent() {
        let mut img = ImageBuffer::load_from_rgba8(vec![200, 100, 50, 128], 1, 1, true, true, 1).unwrap();
        img.premultiply_alpha();
        let once = img.rgba8_bytes().to_vec();
        img.premultiply_alpha();
        assert_eq!(img.rgba8_bytes(), once.as_slice());
    }

    #[test]
    fn srgb_roundtrip_is_close() {
        let v = 0.6f32;
        let back = srgb_to_linear(linear_to_srgb(v));
        assert!((back - v).abs() < 1e-4);
    }

    #[test]
    fn swizzle_rrr1_reads_red_into_all_channels() {
        let mut img = ImageBuffer::load_from_rgba8(vec![10, 20, 30, 40], 1, 1, true, true, 1).unwrap();
        img.swizzle(SwizzleToken::parse_pattern("rrr1").unwrap());
        assert_eq!(img.rgba8_bytes(), &[10, 10, 10, 255]);
    }

    #[test]
    fn resize_of_srgb_encoded_image_filters_in_linear_space() {
        // A 2x2 checkerboard of full-white/full-black halved to 1x1 must land
        // near sRGB mid-gray (~188), not linear mid-gray (~128), because the
        // average is taken in linear light and re-encoded afterward.
        let mut img = ImageBuffer::load_from_rgba8(
            vec![255, 255, 255, 255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255, 255],
            2,
            2,
            true,
            true,
            1,
        )
        .unwrap();
        assert!(img.is_srgb_encoded());
        img.resize(1, 1, false, Filter::Box);
        let px = img.rgba8_bytes();
        assert!(px[0] > 160 && px[0] < 210, "expected sRGB-reencoded mid value, got {}", px[0]);
        assert_eq!(px[3], 255);
    }

    #[test]
    fn resize_preserves_chunk_count() {
        let mut img = ImageBuffer::load_from_rgba8(vec![255u8; 4 * 4 * 4 * 2], 4, 4, true, true, 2).unwrap();
        img.resize(2, 2, false, Filter::Box);
        assert_eq!(img.chunks(), 2);
        assert_eq!(img.width(), 2);
        assert_eq!(img.height(), 2);
    }
}
