//! Built-in explicit-format backend: no compression, just a repack of the
//! source storage into the destination format's byte layout.

use half::f16;

use crate::error::{KtxforgeError, Result};
use crate::format::PixelFormat;
use crate::image::{ImageBuffer, Storage};

pub fn encode(src: &ImageBuffer, format: PixelFormat) -> Result<Vec<u8>> {
    match format {
        PixelFormat::R8Unorm => from_rgba8(src, 1),
        PixelFormat::Rg8Unorm => from_rgba8(src, 2),
        PixelFormat::Rgba8Unorm | PixelFormat::Rgba8UnormSrgb => from_rgba8(src, 4),
        PixelFormat::Rgba16Float => from_rgba32f_to_f16(src),
        PixelFormat::Rgba32Float => from_rgba32f(src),
        other => Err(KtxforgeError::UnsupportedByAllBackends { format: other }),
    }
}

fn from_rgba8(src: &ImageBuffer, channels: usize) -> Result<Vec<u8>> {
    if src.storage() != Storage::Rgba8 {
        return Err(KtxforgeError::UnsupportedByAllBackends {
            format: PixelFormat::Rgba8Unorm,
        });
    }
    let bytes = src.rgba8_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 4 * channels);
    for px in bytes.chunks_exact(4) {
        out.extend_from_slice(&px[..channels]);
    }
    Ok(out)
}

fn from_rgba32f(src: &ImageBuffer) -> Result<Vec<u8>> {
    if src.storage() != Storage::Rgba32F {
        return Err(KtxforgeError::UnsupportedByAllBackends {
            format: PixelFormat::Rgba32Float,
        });
    }
    let samples = src.rgba32f_samples();
    let mut out = Vec::with_capacity(samples.len() * 4);
    for &v in samples {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Ok(out)
}

fn from_rgba32f_to_f16(src: &ImageBuffer) -> Result<Vec<u8>> {
    if src.storage() != Storage::Rgba32F {
        return Err(KtxforgeError::UnsupportedByAllBackends {
            format: PixelFormat::Rgba16Float,
        });
    }
    let samples = src.rgba32f_samples();
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &v in samples {
        out.extend_from_slice(&f16::from_f32(v).to_le_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r8_keeps_only_red_channel() {
        let img = ImageBuffer::load_from_rgba8(vec![10, 20, 30, 40], 1, 1, true, true, 1).unwrap();
        let out = encode(&img, PixelFormat::R8Unorm).unwrap();
        assert_eq!(out, vec![10]);
    }

    #[test]
    fn rgba32f_is_16_bytes_per_pixel() {
        let img = ImageBuffer::load_from_rgba32f(vec![1.0, 0.5, 0.0, 1.0], 1, 1, true, true, 1).unwrap();
        let out = encode(&img, PixelFormat::Rgba32Float).unwrap();
        assert_eq!(out.len(), 16);
    }
}
