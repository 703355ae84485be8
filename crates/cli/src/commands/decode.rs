use ktxforge_core::container::Container;
use ktxforge_core::error::{KtxforgeError, Result};
use ktxforge_core::format::PixelFormat;
use ktxforge_core::image::png;

use crate::cli::DecodeArgs;

/// Decodes a container's level back to PNG. Only the RGBA8 explicit formats
/// round-trip without a software block decoder; anything else (block
/// compressed or other explicit layouts) is rejected as `UnsupportedDecode`.
pub fn run(args: &DecodeArgs) -> Result<()> {
    let bytes = std::fs::read(&args.input).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            KtxforgeError::FileNotFound(args.input.display().to_string())
        } else {
            KtxforgeError::read_failed(e)
        }
    })?;
    let container = Container::open_for_read(&bytes)?;
    if !matches!(container.header.format, PixelFormat::Rgba8Unorm | PixelFormat::Rgba8UnormSrgb) {
        return Err(KtxforgeError::UnsupportedDecode(container.header.format));
    }
    let mut scratch = Vec::new();
    let level = container.level_bytes(args.level, &mut scratch)?;
    let png_bytes = png::encode_rgba8(level, container.header.width_px, container.header.height_px)?;
    std::fs::write(&args.output, png_bytes).map_err(KtxforgeError::write_failed)?;
    tracing::info!(output = %args.output.display(), "decode finished");
    Ok(())
}
