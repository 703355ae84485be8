pub mod container;
pub mod encode;
pub mod error;
pub mod format;
pub mod image;
pub mod mipmap;
pub mod pipeline;

pub use error::{KtxforgeError, Result};
pub use format::PixelFormat;
