//! PNG interface: decode bytes to RGBA8, or inspect the header without
//! decoding pixels. Parsing and zlib inflate are delegated to the `png`
//! crate; this module only adapts its output to the pipeline's needs.

use crate::error::{KtxforgeError, Result};

pub struct PngHeader {
    pub width: u32,
    pub height: u32,
    pub has_color: bool,
    pub has_alpha: bool,
    pub has_palette: bool,
}

pub fn inspect_header(bytes: &[u8]) -> Result<PngHeader> {
    let decoder = png::Decoder::new(bytes);
    let reader = decoder
        .read_info()
        .map_err(|e| KtxforgeError::ReadFailed(e.to_string()))?;
    let info = reader.info();
    let has_color = matches!(
        info.color_type,
        png::ColorType::Rgb | png::ColorType::Rgba | png::ColorType::Indexed
    );
    let has_alpha = matches!(info.color_type, png::ColorType::GrayscaleAlpha | png::ColorType::Rgba)
        || info.trns.is_some();
    let has_palette = matches!(info.color_type, png::ColorType::Indexed);
    Ok(PngHeader {
        width: info.width,
        height: info.height,
        has_color,
        has_alpha,
        has_palette,
    })
}

/// Decodes to a contiguous RGBA8 buffer plus the header flags the pipeline
/// needs for provenance (`hasColor`/`hasAlpha`/`hasPalette`).
pub fn decode_rgba8(bytes: &[u8]) -> Result<(Vec<u8>, u32, u32, PngHeader)> {
    let header = inspect_header(bytes)?;
    let decoder = png::Decoder::new(bytes);
    let mut reader = decoder
        .read_info()
        .map_err(|e| KtxforgeError::ReadFailed(e.to_string()))?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buf)
        .map_err(|e| KtxforgeError::ReadFailed(e.to_string()))?;
    buf.truncate(frame.buffer_size());

    let rgba = match frame.color_type {
        png::ColorType::Rgba => buf,
        png::ColorType::Rgb => expand_rgb_to_rgba(&buf),
        png::ColorType::Grayscale => expand_gray_to_rgba(&buf),
        png::ColorType::GrayscaleAlpha => expand_gray_alpha_to_rgba(&buf),
        png::ColorType::Indexed => {
            return Err(KtxforgeError::ReadFailed(
                "indexed PNG decoding requires palette expansion not yet supported".into(),
            ))
        }
    };
    Ok((rgba, header.width, header.height, header))
}

fn expand_rgb_to_rgba(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() / 3 * 4);
    for chunk in src.chunks_exact(3) {
        out.extend_from_slice(chunk);
        out.push(255);
    }
    out
}

fn expand_gray_to_rgba(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() * 4);
    for &g in src {
        out.extend_from_slice(&[g, g, g, 255]);
    }
    out
}

fn expand_gray_alpha_to_rgba(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() * 2);
    for chunk in src.chunks_exact(2) {
        let g = chunk[0];
        let a = chunk[1];
        out.extend_from_slice(&[g, g, g, a]);
    }
    out
}

pub fn encode_rgba8(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| KtxforgeError::WriteFailed(e.to_string()))?;
        writer
            .write_image_data(pixels)
            .map_err(|e| KtxforgeError::WriteFailed(e.to_string()))?;
    }
    Ok(out)
}
