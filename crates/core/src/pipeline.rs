//! Pipeline orchestrator (C7): end-to-end load -> preprocess -> mip ->
//! encode -> container write, single-threaded per job (the script driver in
//! the CLI crate is the only source of parallelism, per the concurrency
//! model). Output is written through a staged temp file so partial writes
//! never appear under the final path.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, info_span, warn};

use crate::container::{Container, ContainerFormat, Header, MipLevel, Props, TextureType, WriteOptions};
use crate::encode::{self, ContentFlags, EncodeRequest};
use crate::error::{KtxforgeError, Result};
use crate::format::PixelFormat;
use crate::image::{png, Filter, ImageBuffer, SwizzleToken};
use crate::mipmap::{self, MipPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeSpec {
    Explicit(u32, u32),
    NearestLowerPow2,
}

#[derive(Clone, Debug)]
pub struct EncodeOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: PixelFormat,
    pub container_format: ContainerFormat,
    pub pinned_backend: Option<encode::Backend>,
    pub texture_type: TextureType,
    pub srgb: bool,
    pub signed: bool,
    pub hdr: bool,
    pub normal_map: bool,
    pub sdf: bool,
    pub sdf_radius: f32,
    pub premultiply: bool,
    pub opt_opaque: bool,
    pub swizzle: Option<[SwizzleToken; 4]>,
    pub average_mask: Option<[bool; 4]>,
    pub resize: Option<ResizeSpec>,
    pub mip_enabled: bool,
    pub mip_align: bool,
    pub mip_min_px: u32,
    pub mip_max_px: u32,
    pub quality: u8,
}

pub struct EncodeOutcome {
    pub output_path: PathBuf,
    pub levels_written: usize,
    pub backend_used: &'static str,
    pub quality_used: u8,
}

pub fn run_encode(opts: &EncodeOptions) -> Result<EncodeOutcome> {
    // One span per job, timed end-to-end the way `KramTimer.h` wraps a
    // single texture conversion in the original tool.
    let span = info_span!("encode_job", input = %opts.input.display());
    let _guard = span.enter();

    info!(input = %opts.input.display(), output = %opts.output.display(), "encode starting");

    let mut image = load_source(&opts.input)?;

    // Step 2: swizzle, average-per-block, resize, colorspace adjust,
    // premultiply, SDF, in that order.
    if let Some(pattern) = opts.swizzle {
        image.swizzle(pattern);
    }
    if let Some(mask) = opts.average_mask {
        image.average_per_block(mask, 4, 4);
    }
    match opts.resize {
        Some(ResizeSpec::Explicit(w, h)) => image.resize(w, h, false, Filter::Lanczos4),
        Some(ResizeSpec::NearestLowerPow2) => {
            let (w, h) = (image.width(), image.height());
            image.resize(w, h, true, Filter::Lanczos4);
        }
        None => {}
    }
    if opts.srgb && !image.is_srgb_encoded() {
        image.to_srgb_from_linear();
    }
    if opts.premultiply {
        image.premultiply_alpha();
    }
    if opts.sdf {
        image = image.signed_distance_field(opts.sdf_radius);
    }

    // Step 3: mip chain.
    let policy = MipPolicy {
        enabled: opts.mip_enabled,
        min_px: opts.mip_min_px,
        max_px: opts.mip_max_px,
        filter: Filter::Lanczos4,
        keep_non_pow2: true,
    };
    let chain = mipmap::build_chain(image, &policy);

    // Step 3: select the final target format, honoring `-optopaque`'s BC1
    // 3-color/4-color choice from §4.5.
    let target_format = resolve_optopaque_format(opts.format, opts.opt_opaque, &chain[0]);

    let content_flags = {
        let mut flags = ContentFlags::empty();
        if opts.normal_map {
            flags |= ContentFlags::NORMAL_MAP;
        }
        if opts.sdf {
            flags |= ContentFlags::SDF;
        }
        if opts.hdr {
            flags |= ContentFlags::HDR;
        }
        if opts.premultiply {
            flags |= ContentFlags::PREMULTIPLIED;
        }
        flags
    };

    // Step 4: encode each level.
    let mut level_payloads = Vec::with_capacity(chain.len());
    let mut backend_used = "explicit";
    let mut quality_used = opts.quality;
    for level in &chain {
        let req = EncodeRequest {
            format: target_format,
            quality: opts.quality,
            content_flags,
            pinned_backend: opts.pinned_backend,
        };
        let result = encode::encode_level_chunk(level, level.width(), level.height(), &req)?;
        backend_used = result.backend_used.name();
        quality_used = result.quality_used;
        level_payloads.push((level.width(), level.height(), result.bytes));
    }

    // Step 5: assemble the container.
    let mut payload = Vec::new();
    let mut levels = Vec::with_capacity(level_payloads.len());
    for (w, h, bytes) in &level_payloads {
        let offset = payload.len() as u64;
        let len = bytes.len() as u64;
        payload.extend_from_slice(bytes);
        levels.push(MipLevel {
            width_px: *w,
            height_px: *h,
            depth_px: 1,
            file_offset: offset,
            byte_length: len,
            uncompressed_byte_length: len,
        });
    }

    let header = Header {
        format: target_format,
        texture_type: opts.texture_type,
        width_px: chain[0].width(),
        height_px: chain[0].height(),
        depth_px: 1,
        array_len: 0,
        faces: opts.texture_type.faces(),
    };

    let mut props = Props::new();
    props.insert("provenance", "ktxforge")?;
    props.insert("ktxforge.backend", backend_used)?;
    props.insert("ktxforge.quality", quality_used.to_string())?;
    props.insert("ktxforge.hasColor", chain[0].has_color().to_string())?;
    props.insert("ktxforge.hasAlpha", chain[0].has_alpha().to_string())?;

    let mut container = Container::build(header, props, levels, payload);
    container.finalize();

    let write_opts = WriteOptions {
        align_blocks: opts.mip_align,
        supercompress: false,
    };

    // Step 6: staged write, then promote.
    write_staged(&opts.output, |file| container.write_to(file, opts.container_format, &write_opts))?;

    Ok(EncodeOutcome {
        output_path: opts.output.clone(),
        levels_written: level_payloads.len(),
        backend_used,
        quality_used,
    })
}

fn resolve_optopaque_format(requested: PixelFormat, opt_opaque: bool, level0: &ImageBuffer) -> PixelFormat {
    if !opt_opaque || requested != PixelFormat::Bc7RgbaUnorm {
        return requested;
    }
    let fully_opaque = match level0.storage() {
        crate::image::Storage::Rgba8 => level0.rgba8_bytes().chunks_exact(4).all(|px| px[3] == 255),
        crate::image::Storage::Rgba32F => level0.rgba32f_samples().chunks_exact(4).all(|px| px[3] >= 1.0),
    };
    if fully_opaque {
        PixelFormat::Bc1RgbaUnorm
    } else {
        requested
    }
}

fn load_source(path: &Path) -> Result<ImageBuffer> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            KtxforgeError::FileNotFound(path.display().to_string())
        } else {
            KtxforgeError::read_failed(e)
        }
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("ktx") | Some("ktx2") => {
            let container = Container::open_for_read(&bytes)?;
            let mut scratch = Vec::new();
            let level0 = container.level_bytes(0, &mut scratch)?;
            let info = container.header.format.describe();
            if info.is_block_compressed() {
                return Err(KtxforgeError::UnsupportedDecode(container.header.format));
            }
            ImageBuffer::load_from_rgba8(
                level0.to_vec(),
                container.header.width_px,
                container.header.height_px,
                info.channels >= 3,
                info.channels == 2 || info.channels == 4,
                1,
            )
        }
        Some("exr") => {
            let (samples, w, h) = crate::image::exr::decode_rgba32f(&bytes)?;
            ImageBuffer::load_from_rgba32f(samples, w, h, true, true, 1)
        }
        Some("png") | None => {
            let (rgba, w, h, header) = png::decode_rgba8(&bytes)?;
            ImageBuffer::load_from_rgba8(rgba, w, h, header.has_color, header.has_alpha, 1)
        }
        Some(other) => Err(KtxforgeError::UnsupportedExtension(other.to_string())),
    }
}

/// Writes through a temp file on the same volume as the destination, then
/// promotes it into place. A cross-volume rename failure is retried once via
/// buffered copy; any other failure deletes the partial temp file.
fn write_staged(dest: &Path, write_fn: impl FnOnce(&mut File) -> Result<()>) -> Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(parent).map_err(KtxforgeError::write_failed)?;
    write_fn(staged.as_file_mut())?;
    staged.as_file_mut().flush().map_err(KtxforgeError::write_failed)?;

    match staged.persist(dest) {
        Ok(_) => Ok(()),
        Err(persist_err) => {
            warn!(error = %persist_err.error, "staged rename failed, falling back to buffered copy");
            let temp_path = persist_err.file.path().to_path_buf();
            let copy_result = std::fs::copy(&temp_path, dest);
            drop(persist_err.file);
            copy_result
                .map(|_| ())
                .map_err(|e| KtxforgeError::TempFilePromotionFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn staged_write_promotes_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        write_staged(&dest, |f| {
            f.write_all(b"hello").map_err(KtxforgeError::write_failed)
        })
        .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    }

    #[test]
    fn resolve_optopaque_switches_to_bc1_when_fully_opaque() {
        let img = ImageBuffer::load_from_rgba8(vec![1, 2, 3, 255, 4, 5, 6, 255], 2, 1, true, true, 1).unwrap();
        let format = resolve_optopaque_format(PixelFormat::Bc7RgbaUnorm, true, &img);
        assert_eq!(format, PixelFormat::Bc1RgbaUnorm);
    }

    #[test]
    fn resolve_optopaque_keeps_bc7_when_not_opaque() {
        let img = ImageBuffer::load_from_rgba8(vec![1, 2, 3, 255, 4, 5, 6, 128], 2, 1, true, true, 1).unwrap();
        let format = resolve_optopaque_format(PixelFormat::Bc7RgbaUnorm, true, &img);
        assert_eq!(format, PixelFormat::Bc7RgbaUnorm);
    }
}
