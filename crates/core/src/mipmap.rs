//! Deterministic mip chain construction: level 0 always emitted, each
//! subsequent level halves and floors each dimension down to 1, with
//! optional minimum/maximum size clamps and a non-pow-2 fixup.

use crate::image::{Filter, ImageBuffer};

#[derive(Clone, Copy, Debug)]
pub struct MipPolicy {
    pub enabled: bool,
    pub min_px: u32,
    pub max_px: u32,
    pub filter: Filter,
    pub keep_non_pow2: bool,
}

impl Default for MipPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_px: 1,
            max_px: u32::MAX,
            filter: Filter::Lanczos4,
            keep_non_pow2: false,
        }
    }
}

/// `⌊log2(max(w,h))⌋ + 1`, the full mip chain length before min/max clamps.
pub fn full_chain_length(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    (31 - largest.leading_zeros()) + 1
}

fn prev_pow2(v: u32) -> u32 {
    if v <= 1 {
        1
    } else {
        1u32 << (31 - v.leading_zeros())
    }
}

fn is_pow2(v: u32) -> bool {
    v != 0 && (v & (v - 1)) == 0
}

/// Builds the mip chain for `source` under `policy`. Always includes level
/// 0. Levels whose larger dimension would go below `min_px` are skipped from
/// the bottom; levels whose dimensions exceed `max_px` are skipped from the
/// top (i.e. never generated in the first place).
pub fn build_chain(mut source: ImageBuffer, policy: &MipPolicy) -> Vec<ImageBuffer> {
    if !policy.keep_non_pow2 && (!is_pow2(source.width()) || !is_pow2(source.height())) {
        let w = prev_pow2(source.width());
        let h = prev_pow2(source.height());
        source.resize(w, h, false, policy.filter);
    }

    let mut levels = Vec::new();
    if policy.max_px == u32::MAX || source.width().max(source.height()) <= policy.max_px {
        levels.push(source.clone());
    }

    if !policy.enabled {
        return levels;
    }

    let mut current = source;
    loop {
        let (w, h) = (current.width(), current.height());
        if w <= 1 && h <= 1 {
            break;
        }
        let next_w = (w / 2).max(1);
        let next_h = (h / 2).max(1);
        if next_w.max(next_h) < policy.min_px {
            break;
        }
        let mut next = current.clone();
        next.resize(next_w, next_h, false, policy.filter);
        if next_w.max(next_h) <= policy.max_px {
            levels.push(next.clone());
        }
        current = next;
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageBuffer;

    #[test]
    fn full_chain_length_matches_log2_formula() {
        assert_eq!(full_chain_length(256, 256), 9);
        assert_eq!(full_chain_length(1, 1), 1);
        assert_eq!(full_chain_length(300, 150), 9);
    }

    #[test]
    fn single_level_for_1x1_source() {
        let img = ImageBuffer::load_from_rgba8(vec![0u8; 4], 1, 1, true, true, 1).unwrap();
        let chain = build_chain(img, &MipPolicy::default());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn min_px_clamp_stops_generation() {
        let img = ImageBuffer::load_from_rgba8(vec![0u8; 8 * 8 * 4], 8, 8, true, true, 1).unwrap();
        let policy = MipPolicy {
            min_px: 4,
            ..MipPolicy::default()
        };
        let chain = build_chain(img, &policy);
        // 8 -> 4 -> (2 would be below min_px, stop)
        assert_eq!(chain.len(), 2);
    }
}
