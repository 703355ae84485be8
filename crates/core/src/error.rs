use thiserror::Error;

use crate::format::PixelFormat;

pub type Result<T> = std::result::Result<T, KtxforgeError>;

#[derive(Error, Debug)]
pub enum KtxforgeError {
    // ---- Input ----
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("bad container signature")]
    BadSignature,

    #[error("truncated container header")]
    TruncatedHeader,

    #[error("inconsistent mip level table: {0}")]
    InconsistentLevelTable(String),

    #[error("unsupported pixel format id {0}")]
    UnsupportedFormat(u32),

    #[error("level {level} payload runs past end of file")]
    Truncated { level: u32 },

    // ---- Semantic ----
    #[error("format {format:?} has no available encoder backend for the requested content")]
    UnsupportedByAllBackends { format: PixelFormat },

    #[error("pixel format {0:?} has no mapping in vocabulary {1}")]
    UnmappedFormat(PixelFormat, &'static str),

    #[error("no HDR BC6H backend is available")]
    NoHDRBC6Backend,

    #[error("cannot decode block-compressed HDR format {0:?} for editing")]
    UnsupportedDecode(PixelFormat),

    #[error("dimensions {width}x{height} are not aligned to the {bx}x{by} block size of {format:?}")]
    DimensionNotBlockAligned {
        format: PixelFormat,
        width: u32,
        height: u32,
        bx: u32,
        by: u32,
    },

    // ---- I/O ----
    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("failed to promote staged output to final path: {0}")]
    TempFilePromotionFailed(String),

    // ---- Resource ----
    #[error("out of memory while allocating {0} bytes")]
    OutOfMemory(usize),

    #[error("memory mapping failed: {0}")]
    MappingFailed(String),

    // ---- Argument ----
    #[error("bad flag: {0}")]
    BadFlag(String),

    #[error("bad resize spec: {0}")]
    BadResizeSpec(String),

    #[error("bad swizzle spec: {0}")]
    BadSwizzleSpec(String),
}

impl KtxforgeError {
    pub fn read_failed(err: std::io::Error) -> Self {
        Self::ReadFailed(err.to_string())
    }

    pub fn write_failed(err: std::io::Error) -> Self {
        Self::WriteFailed(err.to_string())
    }

    pub fn mapping_failed(err: std::io::Error) -> Self {
        Self::MappingFailed(err.to_string())
    }
}
