//! Encoder dispatch (C5): chooses a concrete backend per (format, quality,
//! content flags), validates feasibility against the format/backend table,
//! and exposes a uniform "encode one mip chunk into a block stream" call.
//! Backends themselves (C6) are plain capability records plus free
//! functions, never polymorphic encoder objects.

pub mod astc;
pub mod bc;
pub mod etc2;
pub mod explicit;

use crate::error::{KtxforgeError, Result};
use crate::format::PixelFormat;
use crate::image::{ImageBuffer, Storage, SwizzleToken};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ContentFlags: u8 {
        const NORMAL_MAP    = 1 << 0;
        const SDF           = 1 << 1;
        const HDR           = 1 << 2;
        const PREMULTIPLIED = 1 << 3;
    }
}

/// Capability descriptor a backend advertises: `{name, formats[], ldr, hdr,
/// minQuality, maxQuality}`.
#[derive(Clone, Copy, Debug)]
pub struct BackendCapability {
    pub name: &'static str,
    pub ldr: bool,
    pub hdr: bool,
    pub min_quality: u8,
    pub max_quality: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Explicit,
    Ispc,
    Etcenc,
    Astcenc,
}

impl Backend {
    pub const ALL: &'static [Backend] = &[Backend::Explicit, Backend::Ispc, Backend::Etcenc, Backend::Astcenc];

    pub fn name(self) -> &'static str {
        match self {
            Backend::Explicit => "explicit",
            Backend::Ispc => bc::NAME,
            Backend::Etcenc => etc2::NAME,
            Backend::Astcenc => astc::NAME,
        }
    }

    pub fn capability(self) -> BackendCapability {
        match self {
            Backend::Explicit => BackendCapability {
                name: self.name(),
                ldr: true,
                hdr: true,
                min_quality: 0,
                max_quality: 100,
            },
            Backend::Ispc => BackendCapability {
                name: self.name(),
                ldr: true,
                hdr: false,
                min_quality: 0,
                max_quality: 100,
            },
            Backend::Etcenc => BackendCapability {
                name: self.name(),
                ldr: true,
                hdr: false,
                min_quality: 0,
                max_quality: 100,
            },
            Backend::Astcenc => BackendCapability {
                name: self.name(),
                ldr: true,
                hdr: false,
                min_quality: 0,
                max_quality: 100,
            },
        }
    }

    fn supports(self, format: PixelFormat) -> bool {
        match self {
            Backend::Explicit => matches!(
                format,
                PixelFormat::R8Unorm
                    | PixelFormat::Rg8Unorm
                    | PixelFormat::Rgba8Unorm
                    | PixelFormat::Rgba8UnormSrgb
                    | PixelFormat::Rgba16Float
                    | PixelFormat::Rgba32Float
            ),
            Backend::Ispc => bc::supports(format),
            Backend::Etcenc => etc2::supports(format),
            Backend::Astcenc => astc::supports(format),
        }
    }
}

/// `encodeLevelChunk(src, format, quality, contentFlags) -> BlockStream`.
pub struct EncodeRequest {
    pub format: PixelFormat,
    pub quality: u8,
    pub content_flags: ContentFlags,
    pub pinned_backend: Option<Backend>,
}

pub struct EncodeResult {
    pub bytes: Vec<u8>,
    pub backend_used: Backend,
    pub quality_used: u8,
}

/// Picks the first backend matching `content_flags` and supporting
/// `format`, unless the caller pinned one. BC6 (HDR) has no backend at all
/// and always fails with `NoHDRBC6Backend` regardless of pinning.
fn choose_backend(format: PixelFormat, content_flags: ContentFlags, pinned: Option<Backend>) -> Result<Backend> {
    if let Some(backend) = pinned {
        return if backend.supports(format) {
            Ok(backend)
        } else {
            Err(KtxforgeError::UnsupportedByAllBackends { format })
        };
    }
    let wants_hdr = content_flags.contains(ContentFlags::HDR);
    for &backend in Backend::ALL {
        if !backend.supports(format) {
            continue;
        }
        let cap = backend.capability();
        if wants_hdr && !cap.hdr {
            continue;
        }
        if !wants_hdr && !cap.ldr {
            continue;
        }
        return Ok(backend);
    }
    Err(KtxforgeError::UnsupportedByAllBackends { format })
}

/// Applies per-family pre-encode rules before handing off to a backend:
/// normal maps get a channel-average prepass, SDF content is swizzled to
/// `rrr1`, and BC1 opacity determines 3-color vs 4-color encode intent.
fn apply_pre_encode_rules(mut src: ImageBuffer, format: PixelFormat, content_flags: ContentFlags) -> Result<ImageBuffer> {
    if content_flags.contains(ContentFlags::NORMAL_MAP) {
        src.average_per_block([false, true, true, false], 4, 4);
    }
    if content_flags.contains(ContentFlags::SDF) && format != PixelFormat::R8Unorm {
        src.swizzle(SwizzleToken::parse_pattern("rrr1")?);
    }
    Ok(src)
}

pub fn encode_level_chunk(src: &ImageBuffer, w: u32, h: u32, req: &EncodeRequest) -> Result<EncodeResult> {
    let backend = choose_backend(req.format, req.content_flags, req.pinned_backend)?;
    let prepared = apply_pre_encode_rules(src.clone(), req.format, req.content_flags)?;

    let (bytes, quality_used) = match backend {
        Backend::Explicit => (explicit::encode(&prepared, req.format)?, req.quality),
        Backend::Ispc => {
            require_rgba8(&prepared, req.format)?;
            let has_alpha = has_meaningful_alpha(prepared.rgba8_bytes());
            bc::encode(prepared.rgba8_bytes(), w, h, req.format, req.quality, has_alpha)?
        }
        Backend::Etcenc => {
            require_rgba8(&prepared, req.format)?;
            (etc2::encode(prepared.rgba8_bytes(), w, h, req.format)?, req.quality)
        }
        Backend::Astcenc => {
            require_rgba8(&prepared, req.format)?;
            (astc::encode(prepared.rgba8_bytes(), w, h, req.format)?, req.quality)
        }
    };

    Ok(EncodeResult {
        bytes,
        backend_used: backend,
        quality_used,
    })
}

fn require_rgba8(src: &ImageBuffer, format: PixelFormat) -> Result<()> {
    if src.storage() != Storage::Rgba8 {
        return Err(KtxforgeError::UnsupportedByAllBackends { format });
    }
    Ok(())
}

/// Whether the source carries any non-opaque alpha, independent of the
/// requested quality tier — used to pick BC7's opaque vs. alpha settings.
fn has_meaningful_alpha(rgba8: &[u8]) -> bool {
    rgba8.chunks_exact(4).any(|px| px[3] != 255)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chooses_explicit_backend_for_rgba8() {
        let backend = choose_backend(PixelFormat::Rgba8Unorm, ContentFlags::empty(), None).unwrap();
        assert_eq!(backend, Backend::Explicit);
    }

    #[test]
    fn chooses_ispc_for_bc7() {
        let backend = choose_backend(PixelFormat::Bc7RgbaUnorm, ContentFlags::empty(), None).unwrap();
        assert_eq!(backend, Backend::Ispc);
    }

    #[test]
    fn pinned_backend_must_support_format() {
        let err = choose_backend(PixelFormat::Bc7RgbaUnorm, ContentFlags::empty(), Some(Backend::Astcenc));
        assert!(err.is_err());
    }

    #[test]
    fn meaningful_alpha_detection_ignores_fully_opaque_images() {
        assert!(!has_meaningful_alpha(&[255, 0, 0, 255, 0, 255, 0, 255]));
        assert!(has_meaningful_alpha(&[255, 0, 0, 255, 0, 255, 0, 128]));
    }

    #[test]
    fn end_to_end_encode_explicit_rgba8() {
        let img = ImageBuffer::load_from_rgba8(vec![255, 0, 0, 255], 1, 1, true, true, 1).unwrap();
        let req = EncodeRequest {
            format: PixelFormat::Rgba8Unorm,
            quality: 50,
            content_flags: ContentFlags::empty(),
            pinned_backend: None,
        };
        let result = encode_level_chunk(&img, 1, 1, &req).unwrap();
        assert_eq!(result.bytes, vec![255, 0, 0, 255]);
        assert_eq!(result.backend_used, Backend::Explicit);
    }
}
