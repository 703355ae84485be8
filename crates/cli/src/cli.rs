//! Command-line surface: `encode`, `decode`, `info`, `script`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ktxforge", version, about = "texture block-compression toolchain")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load an image, preprocess, generate mips, encode, and write a container.
    Encode(EncodeArgs),
    /// Decode a container's first level back to PNG.
    Decode(DecodeArgs),
    /// Print human-readable container (or PNG header) metadata.
    Info(InfoArgs),
    /// Run a line-oriented command file with a bounded worker pool.
    Script(ScriptArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct EncodeArgs {
    #[arg(long = "input", short = 'i')]
    pub input: PathBuf,

    #[arg(long = "output", short = 'o')]
    pub output: PathBuf,

    #[arg(long = "format", short = 'f')]
    pub format: String,

    /// Pin a specific backend instead of letting the dispatcher choose one.
    #[arg(long = "encoder")]
    pub encoder: Option<String>,

    #[arg(long = "type", default_value = "2d")]
    pub texture_type: String,

    #[arg(long = "srgb")]
    pub srgb: bool,

    #[arg(long = "signed")]
    pub signed: bool,

    #[arg(long = "hdr")]
    pub hdr: bool,

    #[arg(long = "normal")]
    pub normal: bool,

    #[arg(long = "sdf")]
    pub sdf: bool,

    #[arg(long = "sdf-radius", default_value_t = 0.0)]
    pub sdf_radius: f32,

    #[arg(long = "premul")]
    pub premul: bool,

    #[arg(long = "optopaque")]
    pub opt_opaque: bool,

    #[arg(long = "swizzle")]
    pub swizzle: Option<String>,

    #[arg(long = "avg")]
    pub avg: Option<String>,

    #[arg(long = "resize")]
    pub resize: Option<String>,

    #[arg(long = "mipnone")]
    pub mip_none: bool,

    #[arg(long = "mipalign")]
    pub mip_align: bool,

    #[arg(long = "mipmin", default_value_t = 1)]
    pub mip_min: u32,

    #[arg(long = "mipmax", default_value_t = u32::MAX)]
    pub mip_max: u32,

    #[arg(long = "quality", default_value_t = 50)]
    pub quality: u8,

    #[arg(long = "v", short = 'v')]
    pub verbose: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DecodeArgs {
    #[arg(long = "input", short = 'i')]
    pub input: PathBuf,

    #[arg(long = "output", short = 'o')]
    pub output: PathBuf,

    #[arg(long = "level", default_value_t = 0)]
    pub level: usize,
}

#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {
    #[arg(long = "input", short = 'i')]
    pub input: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct ScriptArgs {
    #[arg(long = "input", short = 'i')]
    pub input: PathBuf,

    #[arg(long = "jobs", short = 'j', default_value_t = 1)]
    pub jobs: usize,
}

/// kram's own CLI (`original_source/source/kram/Kram.cpp`, e.g.
/// `isStringEqual(word, "-mipmax")`) uses single-dash long flags, but
/// clap's derive macro always renders `long = "..."` as double-dash. Rather
/// than hand-build a non-derive `clap::Command` — unverifiable without
/// running the toolchain — this rewrites single-dash multi-letter tokens to
/// double-dash before parsing, so the documented `-input`/`-mipmax` syntax
/// reaches clap as `--input`/`--mipmax`. True short flags (`-i`, `-v`,
/// single character) and negative numeric values (`-0.5`) are left alone,
/// since both already fail the "more than one letter after the dash"
/// check; tokens that are already double-dash pass through untouched.
pub fn normalize_argv<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            if let Some(rest) = arg.strip_prefix('-') {
                let starts_alpha = rest.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
                if !rest.starts_with('-') && starts_alpha && rest.len() > 1 {
                    return format!("-{arg}");
                }
            }
            arg
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_single_dash_long_flags_to_double_dash() {
        let out = normalize_argv(["ktxforge", "encode", "-input", "a.png", "-mipmax", "64"].map(String::from));
        assert_eq!(out, vec!["ktxforge", "encode", "--input", "a.png", "--mipmax", "64"]);
    }

    #[test]
    fn leaves_short_flags_and_negative_numbers_alone() {
        let out = normalize_argv(["-i", "a.png", "-v", "-0.5"].map(String::from));
        assert_eq!(out, vec!["-i", "a.png", "-v", "-0.5"]);
    }

    #[test]
    fn leaves_already_double_dash_tokens_alone() {
        let out = normalize_argv(["--input", "a.png"].map(String::from));
        assert_eq!(out, vec!["--input", "a.png"]);
    }

    #[test]
    fn rewrites_hyphenated_long_flag_names() {
        let out = normalize_argv(["-sdf-radius", "2.0"].map(String::from));
        assert_eq!(out, vec!["--sdf-radius", "2.0"]);
    }
}
