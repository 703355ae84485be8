//! BC1/BC3/BC4/BC5/BC7 LDR backend via Intel's ISPC texture compressor
//! bindings. One of three backends the feasibility table allows for this
//! format family (`squish, bcenc, ate` in the original); this crate ships
//! only the ISPC-backed one.

use intel_tex_2::{bc1, bc3, bc4, bc5, bc7, RgbaSurface};

use crate::error::{KtxforgeError, Result};
use crate::format::PixelFormat;

pub const NAME: &str = "ispc";

pub fn supports(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::Bc1RgbaUnorm
            | PixelFormat::Bc1RgbaUnormSrgb
            | PixelFormat::Bc3RgbaUnorm
            | PixelFormat::Bc3RgbaUnormSrgb
            | PixelFormat::Bc4RUnorm
            | PixelFormat::Bc5RgUnorm
            | PixelFormat::Bc7RgbaUnorm
            | PixelFormat::Bc7RgbaUnormSrgb
    )
}

/// Maps the dispatcher's 0..100 quality to the settings this backend accepts.
/// BC1/3/4/5 have no tunable quality knob in the ISPC bindings; BC7 exposes
/// discrete speed/quality tiers, so values are bucketed to the nearest one
/// and the actual bucket used is reported back to the caller. `has_alpha`
/// is the source's *actual* transparency (not the quality dial) and picks
/// between BC7's opaque and alpha settings families so real transparency is
/// never silently dropped by a fast/low-quality request.
pub fn encode(src: &[u8], w: u32, h: u32, format: PixelFormat, quality: u8, has_alpha: bool) -> Result<(Vec<u8>, u8)> {
    let surface = RgbaSurface {
        width: w,
        height: h,
        stride: w * 4,
        data: src,
    };
    match format {
        PixelFormat::Bc1RgbaUnorm | PixelFormat::Bc1RgbaUnormSrgb => Ok((bc1::compress_blocks(&surface), quality)),
        PixelFormat::Bc3RgbaUnorm | PixelFormat::Bc3RgbaUnormSrgb => Ok((bc3::compress_blocks(&surface), quality)),
        PixelFormat::Bc4RUnorm => Ok((bc4::compress_blocks(&surface), quality)),
        PixelFormat::Bc5RgUnorm => Ok((bc5::compress_blocks(&surface), quality)),
        PixelFormat::Bc7RgbaUnorm | PixelFormat::Bc7RgbaUnormSrgb => {
            let (settings, used) = bc7_settings_for_quality(quality, has_alpha);
            Ok((bc7::compress_blocks(&settings, &surface), used))
        }
        other => Err(KtxforgeError::UnsupportedByAllBackends { format: other }),
    }
}

fn bc7_settings_for_quality(quality: u8, has_alpha: bool) -> (intel_tex_2::bc7::EncodeSettings, u8) {
    if has_alpha {
        if quality < 25 {
            (bc7::alpha_ultra_fast_settings(), 10)
        } else if quality < 60 {
            (bc7::alpha_fast_settings(), 40)
        } else if quality < 90 {
            (bc7::alpha_basic_settings(), 75)
        } else {
            (bc7::alpha_slow_settings(), 100)
        }
    } else if quality < 25 {
        (bc7::opaque_ultra_fast_settings(), 10)
    } else if quality < 60 {
        (bc7::opaque_fast_settings(), 40)
    } else if quality < 90 {
        (bc7::opaque_basic_settings(), 75)
    } else {
        (bc7::opaque_slow_settings(), 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supports_all_five_ldr_block_families() {
        assert!(supports(PixelFormat::Bc1RgbaUnorm));
        assert!(supports(PixelFormat::Bc7RgbaUnorm));
        assert!(!supports(PixelFormat::Rgba8Unorm));
    }

    #[test]
    fn bc1_output_is_8_bytes_per_block() {
        let src = vec![255u8; 4 * 4 * 4];
        let (out, _) = encode(&src, 4, 4, PixelFormat::Bc1RgbaUnorm, 50, false).unwrap();
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn bc7_low_quality_with_alpha_still_picks_an_alpha_settings_tier() {
        let (_settings, used) = bc7_settings_for_quality(10, true);
        assert_eq!(used, 10);
        let (_settings, used) = bc7_settings_for_quality(10, false);
        assert_eq!(used, 10);
    }
}
