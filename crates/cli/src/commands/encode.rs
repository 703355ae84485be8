use ktxforge_core::container::{ContainerFormat, TextureType};
use ktxforge_core::encode::Backend;
use ktxforge_core::error::{KtxforgeError, Result};
use ktxforge_core::format::PixelFormat;
use ktxforge_core::image::SwizzleToken;
use ktxforge_core::pipeline::{self, EncodeOptions, ResizeSpec};

use crate::cli::EncodeArgs;

pub fn run(args: &EncodeArgs) -> Result<()> {
    let format = PixelFormat::from_cli_token(&args.format)?;
    let container_format = container_format_for(&args.output)?;
    let texture_type = parse_texture_type(&args.texture_type)?;
    let pinned_backend = args.encoder.as_deref().map(parse_backend).transpose()?;
    let swizzle = args.swizzle.as_deref().map(SwizzleToken::parse_pattern).transpose()?;
    let average_mask = args.avg.as_deref().map(parse_channel_mask).transpose()?;
    let resize = args.resize.as_deref().map(parse_resize_spec).transpose()?;

    let opts = EncodeOptions {
        input: args.input.clone(),
        output: args.output.clone(),
        format,
        container_format,
        pinned_backend,
        texture_type,
        srgb: args.srgb,
        signed: args.signed,
        hdr: args.hdr,
        normal_map: args.normal,
        sdf: args.sdf,
        sdf_radius: args.sdf_radius,
        premultiply: args.premul,
        opt_opaque: args.opt_opaque,
        swizzle,
        average_mask,
        resize,
        mip_enabled: !args.mip_none,
        mip_align: args.mip_align,
        mip_min_px: args.mip_min,
        mip_max_px: args.mip_max,
        quality: args.quality,
    };

    let outcome = pipeline::run_encode(&opts)?;
    tracing::info!(
        output = %outcome.output_path.display(),
        levels = outcome.levels_written,
        backend = outcome.backend_used,
        quality = outcome.quality_used,
        "encode finished"
    );
    Ok(())
}

fn container_format_for(output: &std::path::Path) -> Result<ContainerFormat> {
    match output.extension().and_then(|e| e.to_str()) {
        Some("ktx2") => Ok(ContainerFormat::Ktx2),
        Some("ktx") => Ok(ContainerFormat::Ktx1),
        Some(other) => Err(KtxforgeError::UnsupportedExtension(other.to_string())),
        None => Err(KtxforgeError::UnsupportedExtension("<none>".to_string())),
    }
}

fn parse_texture_type(token: &str) -> Result<TextureType> {
    Ok(match token {
        "1d-array" => TextureType::Array1D,
        "2d" => TextureType::Texture2D,
        "2d-array" => TextureType::Array2D,
        "cube" => TextureType::Cube,
        "cube-array" => TextureType::CubeArray,
        "3d" => TextureType::Texture3D,
        other => return Err(KtxforgeError::BadFlag(format!("unknown -type value: {other}"))),
    })
}

fn parse_backend(token: &str) -> Result<Backend> {
    Backend::ALL
        .iter()
        .copied()
        .find(|b| b.name() == token)
        .ok_or_else(|| KtxforgeError::BadFlag(format!("unknown -encoder value: {token}")))
}

fn parse_channel_mask(token: &str) -> Result<[bool; 4]> {
    let mut mask = [false; 4];
    for c in token.chars() {
        match c {
            'r' => mask[0] = true,
            'g' => mask[1] = true,
            'b' => mask[2] = true,
            'a' => mask[3] = true,
            other => return Err(KtxforgeError::BadFlag(format!("unknown -avg channel '{other}'"))),
        }
    }
    Ok(mask)
}

fn parse_resize_spec(token: &str) -> Result<ResizeSpec> {
    if token == "pow2" {
        return Ok(ResizeSpec::NearestLowerPow2);
    }
    let (w, h) = token
        .split_once('x')
        .ok_or_else(|| KtxforgeError::BadResizeSpec(token.to_string()))?;
    let w: u32 = w.parse().map_err(|_| KtxforgeError::BadResizeSpec(token.to_string()))?;
    let h: u32 = h.parse().map_err(|_| KtxforgeError::BadResizeSpec(token.to_string()))?;
    Ok(ResizeSpec::Explicit(w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_spec_parses_dimensions() {
        assert_eq!(parse_resize_spec("128x64").unwrap(), ResizeSpec::Explicit(128, 64));
        assert!(parse_resize_spec("bogus").is_err());
    }

    #[test]
    fn channel_mask_maps_letters_to_positions() {
        assert_eq!(parse_channel_mask("gb").unwrap(), [false, true, true, false]);
    }
}
