//! OpenEXR interface, feature-gated behind `exr`: decode to RGBA32F for HDR
//! sources. Supplements the PNG-only input path named by the container
//! spec so HDR block formats (BC6/ASTC HDR) have somewhere to start from.

use exr::prelude::*;

use crate::error::{KtxforgeError, Result};

struct RgbaBuffer {
    width: usize,
    pixels: Vec<[f32; 4]>,
}

pub fn decode_rgba32f(bytes: &[u8]) -> Result<(Vec<f32>, u32, u32)> {
    let image = read_first_rgba_layer_from_buffered(
        bytes,
        |resolution, _channels| RgbaBuffer {
            width: resolution.width(),
            pixels: vec![[0f32; 4]; resolution.area()],
        },
        |buffer: &mut RgbaBuffer, position: Vec2<usize>, (r, g, b, a): (f32, f32, f32, f32)| {
            buffer.pixels[position.y() * buffer.width + position.x()] = [r, g, b, a];
        },
    )
    .map_err(|e| KtxforgeError::ReadFailed(e.to_string()))?;

    let size = image.layer_data.size;
    let width = size.width() as u32;
    let height = size.height() as u32;
    let buffer = image.layer_data.channel_data.pixels;
    let mut out = Vec::with_capacity(buffer.pixels.len() * 4);
    for px in &buffer.pixels {
        out.extend_from_slice(px);
    }
    Ok((out, width, height))
}

pub fn encode_rgba32f(pixels: &[f32], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let image = Image::from_channels(
        (width as usize, height as usize),
        SpecificChannels::rgba(|pos: Vec2<usize>| {
            let idx = (pos.y() * width as usize + pos.x()) * 4;
            (pixels[idx], pixels[idx + 1], pixels[idx + 2], pixels[idx + 3])
        }),
    );
    image
        .write()
        .to_buffered(std::io::Cursor::new(&mut out))
        .map_err(|e| KtxforgeError::WriteFailed(e.to_string()))?;
    Ok(out)
}
