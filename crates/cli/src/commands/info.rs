use ktxforge_core::container::{Container, TextureType};
use ktxforge_core::error::{KtxforgeError, Result};
use ktxforge_core::image::png;

use crate::cli::InfoArgs;

pub fn run(args: &InfoArgs) -> Result<()> {
    let bytes = std::fs::read(&args.input).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            KtxforgeError::FileNotFound(args.input.display().to_string())
        } else {
            KtxforgeError::read_failed(e)
        }
    })?;

    if args.input.extension().and_then(|e| e.to_str()) == Some("png") {
        let header = png::inspect_header(&bytes)?;
        println!("format: png");
        println!("dims: {}x{}", header.width, header.height);
        println!("hasColor: {}", header.has_color);
        println!("hasAlpha: {}", header.has_alpha);
        println!("hasPalette: {}", header.has_palette);
        return Ok(());
    }

    let container = Container::open_for_read(&bytes)?;
    let format = container.header.format;
    println!("type: {}", texture_type_name(container.header.texture_type));
    println!("dims: {}x{}", container.header.width_px, container.header.height_px);
    println!("mips: {}", container.levels.len());
    println!(
        "format: vk={} gl={:?} metal={}",
        format.to_vk_format(),
        format.to_gl_internal_format(),
        format.to_metal_name()
    );
    for (key, value) in container.props.iter() {
        println!("prop.{key}: {value}");
    }
    Ok(())
}

fn texture_type_name(t: TextureType) -> &'static str {
    match t {
        TextureType::Array1D => "1D-array",
        TextureType::Texture2D => "2D",
        TextureType::Array2D => "2D-array",
        TextureType::Cube => "Cube",
        TextureType::CubeArray => "Cube-array",
        TextureType::Texture3D => "3D",
    }
}
