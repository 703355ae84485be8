//! Pixel format registry: channel layout, block geometry and the three
//! external vocabularies (OpenGL, Vulkan, Metal) used by KTX1/KTX2 containers.

use crate::error::{KtxforgeError, Result};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FormatFlags: u16 {
        const SRGB             = 1 << 0;
        const SIGNED           = 1 << 1;
        const FLOAT            = 1 << 2;
        const HDR              = 1 << 3;
        const BLOCK_COMPRESSED = 1 << 4;
        const EXPLICIT         = 1 << 5;
    }
}

/// One entry per pixel format the core understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Bc1RgbaUnorm,
    Bc1RgbaUnormSrgb,
    Bc3RgbaUnorm,
    Bc3RgbaUnormSrgb,
    Bc4RUnorm,
    Bc5RgUnorm,
    Bc7RgbaUnorm,
    Bc7RgbaUnormSrgb,
    Etc2Rgb8Unorm,
    Etc2Rgba8Unorm,
    Astc4x4Unorm,
    Astc4x4UnormSrgb,
    Astc8x8Unorm,
    Astc8x8UnormSrgb,
}

/// Static facts about a format: channel count, block geometry, byte size, flags.
#[derive(Clone, Copy, Debug)]
pub struct FormatInfo {
    pub format: PixelFormat,
    pub channels: u8,
    pub block_width: u32,
    pub block_height: u32,
    pub bytes_per_block: u32,
    pub flags: FormatFlags,
}

impl FormatInfo {
    pub fn is_srgb(&self) -> bool {
        self.flags.contains(FormatFlags::SRGB)
    }

    pub fn is_block_compressed(&self) -> bool {
        self.flags.contains(FormatFlags::BLOCK_COMPRESSED)
    }

    pub fn is_hdr(&self) -> bool {
        self.flags.contains(FormatFlags::HDR)
    }

    pub fn is_explicit(&self) -> bool {
        self.flags.contains(FormatFlags::EXPLICIT)
    }
}

const fn info(
    format: PixelFormat,
    channels: u8,
    bw: u32,
    bh: u32,
    bytes: u32,
    flags: FormatFlags,
) -> FormatInfo {
    FormatInfo {
        format,
        channels,
        block_width: bw,
        block_height: bh,
        bytes_per_block: bytes,
        flags,
    }
}

impl PixelFormat {
    /// Every format the registry knows, in a stable order used by `--help` listings.
    pub const ALL: &'static [PixelFormat] = &[
        PixelFormat::R8Unorm,
        PixelFormat::Rg8Unorm,
        PixelFormat::Rgba8Unorm,
        PixelFormat::Rgba8UnormSrgb,
        PixelFormat::Rgba16Float,
        PixelFormat::Rgba32Float,
        PixelFormat::Bc1RgbaUnorm,
        PixelFormat::Bc1RgbaUnormSrgb,
        PixelFormat::Bc3RgbaUnorm,
        PixelFormat::Bc3RgbaUnormSrgb,
        PixelFormat::Bc4RUnorm,
        PixelFormat::Bc5RgUnorm,
        PixelFormat::Bc7RgbaUnorm,
        PixelFormat::Bc7RgbaUnormSrgb,
        PixelFormat::Etc2Rgb8Unorm,
        PixelFormat::Etc2Rgba8Unorm,
        PixelFormat::Astc4x4Unorm,
        PixelFormat::Astc4x4UnormSrgb,
        PixelFormat::Astc8x8Unorm,
        PixelFormat::Astc8x8UnormSrgb,
    ];

    pub fn describe(self) -> FormatInfo {
        use FormatFlags as F;
        match self {
            PixelFormat::R8Unorm => info(self, 1, 1, 1, 1, F::EXPLICIT),
            PixelFormat::Rg8Unorm => info(self, 2, 1, 1, 2, F::EXPLICIT),
            PixelFormat::Rgba8Unorm => info(self, 4, 1, 1, 4, F::EXPLICIT),
            PixelFormat::Rgba8UnormSrgb => info(self, 4, 1, 1, 4, F::union(F::EXPLICIT, F::SRGB)),
            PixelFormat::Rgba16Float => info(self, 4, 1, 1, 8, F::union(F::EXPLICIT, F::union(F::FLOAT, F::HDR))),
            PixelFormat::Rgba32Float => info(self, 4, 1, 1, 16, F::union(F::EXPLICIT, F::union(F::FLOAT, F::HDR))),
            PixelFormat::Bc1RgbaUnorm => info(self, 4, 4, 4, 8, F::BLOCK_COMPRESSED),
            PixelFormat::Bc1RgbaUnormSrgb => info(self, 4, 4, 4, 8, F::union(F::BLOCK_COMPRESSED, F::SRGB)),
            PixelFormat::Bc3RgbaUnorm => info(self, 4, 4, 4, 16, F::BLOCK_COMPRESSED),
            PixelFormat::Bc3RgbaUnormSrgb => info(self, 4, 4, 4, 16, F::union(F::BLOCK_COMPRESSED, F::SRGB)),
            PixelFormat::Bc4RUnorm => info(self, 1, 4, 4, 8, F::BLOCK_COMPRESSED),
            PixelFormat::Bc5RgUnorm => info(self, 2, 4, 4, 16, F::BLOCK_COMPRESSED),
            PixelFormat::Bc7RgbaUnorm => info(self, 4, 4, 4, 16, F::BLOCK_COMPRESSED),
            PixelFormat::Bc7RgbaUnormSrgb => info(self, 4, 4, 4, 16, F::union(F::BLOCK_COMPRESSED, F::SRGB)),
            PixelFormat::Etc2Rgb8Unorm => info(self, 3, 4, 4, 8, F::BLOCK_COMPRESSED),
            PixelFormat::Etc2Rgba8Unorm => info(self, 4, 4, 4, 16, F::BLOCK_COMPRESSED),
            PixelFormat::Astc4x4Unorm => info(self, 4, 4, 4, 16, F::BLOCK_COMPRESSED),
            PixelFormat::Astc4x4UnormSrgb => info(self, 4, 4, 4, 16, F::union(F::BLOCK_COMPRESSED, F::SRGB)),
            PixelFormat::Astc8x8Unorm => info(self, 4, 8, 8, 16, F::BLOCK_COMPRESSED),
            PixelFormat::Astc8x8UnormSrgb => info(self, 4, 8, 8, 16, F::union(F::BLOCK_COMPRESSED, F::SRGB)),
        }
    }

    /// Vulkan `VkFormat` id as stored in a KTX2 header's `vkFormat` field.
    pub fn to_vk_format(self) -> u32 {
        match self {
            PixelFormat::R8Unorm => 9,
            PixelFormat::Rg8Unorm => 16,
            PixelFormat::Rgba8Unorm => 37,
            PixelFormat::Rgba8UnormSrgb => 43,
            PixelFormat::Rgba16Float => 97,
            PixelFormat::Rgba32Float => 109,
            PixelFormat::Bc1RgbaUnorm => 145,
            PixelFormat::Bc1RgbaUnormSrgb => 146,
            PixelFormat::Bc3RgbaUnorm => 137,
            PixelFormat::Bc3RgbaUnormSrgb => 138,
            PixelFormat::Bc4RUnorm => 139,
            PixelFormat::Bc5RgUnorm => 141,
            PixelFormat::Bc7RgbaUnorm => 145 + 20,
            PixelFormat::Bc7RgbaUnormSrgb => 145 + 21,
            PixelFormat::Etc2Rgb8Unorm => 147,
            PixelFormat::Etc2Rgba8Unorm => 151,
            PixelFormat::Astc4x4Unorm => 157,
            PixelFormat::Astc4x4UnormSrgb => 158,
            PixelFormat::Astc8x8Unorm => 165,
            PixelFormat::Astc8x8UnormSrgb => 166,
        }
    }

    pub fn from_vk_format(vk: u32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.to_vk_format() == vk)
            .ok_or(KtxforgeError::UnsupportedFormat(vk))
    }

    /// GL internal format enum, used by KTX1's `glInternalFormat` field.
    pub fn to_gl_internal_format(self) -> Option<u32> {
        Some(match self {
            PixelFormat::R8Unorm => 0x8229,
            PixelFormat::Rg8Unorm => 0x822B,
            PixelFormat::Rgba8Unorm => 0x8058,
            PixelFormat::Rgba8UnormSrgb => 0x8C43,
            PixelFormat::Rgba16Float => 0x881A,
            PixelFormat::Rgba32Float => 0x8814,
            PixelFormat::Bc1RgbaUnorm => 0x83F1,
            PixelFormat::Bc1RgbaUnormSrgb => 0x8C4D,
            PixelFormat::Bc3RgbaUnorm => 0x83F3,
            PixelFormat::Bc3RgbaUnormSrgb => 0x8C4F,
            PixelFormat::Bc4RUnorm => 0x8DBB,
            PixelFormat::Bc5RgUnorm => 0x8DBD,
            PixelFormat::Bc7RgbaUnorm => 0x8E8C,
            PixelFormat::Bc7RgbaUnormSrgb => 0x8E8D,
            PixelFormat::Etc2Rgb8Unorm => 0x9274,
            PixelFormat::Etc2Rgba8Unorm => 0x9278,
            PixelFormat::Astc4x4Unorm => 0x93B0,
            PixelFormat::Astc4x4UnormSrgb => 0x93D0,
            PixelFormat::Astc8x8Unorm => 0x93B7,
            PixelFormat::Astc8x8UnormSrgb => 0x93D7,
        })
    }

    pub fn from_gl_internal_format(gl: u32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.to_gl_internal_format() == Some(gl))
            .ok_or(KtxforgeError::UnsupportedFormat(gl))
    }

    /// Metal-ish `MTLPixelFormat`-shaped id, used only by the `--vocabulary metal`
    /// `info` subcommand output; not persisted in any container.
    pub fn to_metal_name(self) -> &'static str {
        match self {
            PixelFormat::R8Unorm => "R8Unorm",
            PixelFormat::Rg8Unorm => "RG8Unorm",
            PixelFormat::Rgba8Unorm => "RGBA8Unorm",
            PixelFormat::Rgba8UnormSrgb => "RGBA8Unorm_sRGB",
            PixelFormat::Rgba16Float => "RGBA16Float",
            PixelFormat::Rgba32Float => "RGBA32Float",
            PixelFormat::Bc1RgbaUnorm => "BC1_RGBA",
            PixelFormat::Bc1RgbaUnormSrgb => "BC1_RGBA_sRGB",
            PixelFormat::Bc3RgbaUnorm => "BC3_RGBA",
            PixelFormat::Bc3RgbaUnormSrgb => "BC3_RGBA_sRGB",
            PixelFormat::Bc4RUnorm => "BC4_RUnorm",
            PixelFormat::Bc5RgUnorm => "BC5_RGUnorm",
            PixelFormat::Bc7RgbaUnorm => "BC7_RGBAUnorm",
            PixelFormat::Bc7RgbaUnormSrgb => "BC7_RGBAUnorm_sRGB",
            PixelFormat::Etc2Rgb8Unorm => "ETC2_RGB8",
            PixelFormat::Etc2Rgba8Unorm => "EAC_RGBA8",
            PixelFormat::Astc4x4Unorm => "ASTC_4x4_LDR",
            PixelFormat::Astc4x4UnormSrgb => "ASTC_4x4_sRGB",
            PixelFormat::Astc8x8Unorm => "ASTC_8x8_LDR",
            PixelFormat::Astc8x8UnormSrgb => "ASTC_8x8_sRGB",
        }
    }

    pub fn from_metal_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.to_metal_name() == name)
            .ok_or_else(|| KtxforgeError::UnmappedFormat(PixelFormat::Rgba8Unorm, "metal"))
    }

    /// Short CLI-facing token, e.g. `"bc7"`, `"astc4x4"`. Used to parse `-f`/`--format`.
    pub fn from_cli_token(token: &str) -> Result<Self> {
        Ok(match token {
            "r8" => PixelFormat::R8Unorm,
            "rg8" => PixelFormat::Rg8Unorm,
            "rgba8" => PixelFormat::Rgba8Unorm,
            "rgba8-srgb" => PixelFormat::Rgba8UnormSrgb,
            "rgba16f" => PixelFormat::Rgba16Float,
            "rgba32f" => PixelFormat::Rgba32Float,
            "bc1" => PixelFormat::Bc1RgbaUnorm,
            "bc1-srgb" => PixelFormat::Bc1RgbaUnormSrgb,
            "bc3" => PixelFormat::Bc3RgbaUnorm,
            "bc3-srgb" => PixelFormat::Bc3RgbaUnormSrgb,
            "bc4" => PixelFormat::Bc4RUnorm,
            "bc5" => PixelFormat::Bc5RgUnorm,
            "bc7" => PixelFormat::Bc7RgbaUnorm,
            "bc7-srgb" => PixelFormat::Bc7RgbaUnormSrgb,
            "etc2" => PixelFormat::Etc2Rgb8Unorm,
            "etc2a" => PixelFormat::Etc2Rgba8Unorm,
            "astc4x4" => PixelFormat::Astc4x4Unorm,
            "astc4x4-srgb" => PixelFormat::Astc4x4UnormSrgb,
            "astc8x8" => PixelFormat::Astc8x8Unorm,
            "astc8x8-srgb" => PixelFormat::Astc8x8UnormSrgb,
            "bc6h" => return Err(KtxforgeError::NoHDRBC6Backend),
            other => return Err(KtxforgeError::BadFlag(format!("unknown format token: {other}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_format_roundtrips_for_every_format() {
        for f in PixelFormat::ALL {
            let vk = f.to_vk_format();
            assert_eq!(PixelFormat::from_vk_format(vk).unwrap(), *f);
        }
    }

    #[test]
    fn block_compressed_formats_have_block_dims_above_one() {
        for f in PixelFormat::ALL {
            let d = f.describe();
            if d.is_block_compressed() {
                assert!(d.block_width > 1 && d.block_height > 1);
            } else {
                assert_eq!((d.block_width, d.block_height), (1, 1));
            }
        }
    }

    #[test]
    fn cli_token_roundtrips() {
        assert_eq!(PixelFormat::from_cli_token("bc7").unwrap(), PixelFormat::Bc7RgbaUnorm);
        assert!(PixelFormat::from_cli_token("nope").is_err());
    }
}
