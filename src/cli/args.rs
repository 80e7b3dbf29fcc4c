//! Command-line argument parsing

use clap::Parser;
use std::path::PathBuf;

/// Builds a TML native package for armeabi-v7a and x86 and bundles it into a .tbp archive
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "tml-build")]
pub struct Args {
    /// Use the specific source path
    #[arg(short = 'p', long = "path", default_value = ".")]
    pub path: PathBuf,

    /// Use the specific path for the resulting package (a directory gets <id>.tbp)
    #[arg(short = 'o', long = "out", default_value = "package.tbp")]
    pub out: PathBuf,

    /// Use the specific temporary build dir path
    #[arg(short = 'b', long = "build-dir", default_value = "build/")]
    pub build_dir: PathBuf,

    /// Specify the Android NDK path
    #[arg(short = 'n', long = "ndk")]
    pub ndk: Option<PathBuf>,

    /// Use the specific CMake executable
    #[arg(long = "cmake", default_value = "cmake")]
    pub cmake: PathBuf,

    /// Use the specific TML CMake toolchain file instead of the bundled one
    #[arg(short = 't', long = "toolchain")]
    pub toolchain: Option<PathBuf>,

    /// Force enable color output
    #[arg(short = 'c', long = "color")]
    pub color: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    Args::parse()
}
