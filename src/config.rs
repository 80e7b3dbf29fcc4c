//! Configuration management for the package builder
//!
//! Resolves command line arguments into absolute paths and checks the
//! required inputs before anything is built.

use crate::{
    cli::Args,
    core::TargetArch,
    error::{BuilderError, Result},
};
use std::path::{Path, PathBuf};

/// Native build description expected at the root of the source directory
pub const NATIVE_BUILD_FILE: &str = "CMakeLists.txt";

/// Name of the TML CMake toolchain file
pub const TOOLCHAIN_FILE_NAME: &str = "tml.toolchain.cmake";

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable debug logging
    pub debug: bool,
    /// Package source directory
    pub source_dir: PathBuf,
    /// Build configuration
    pub build: BuildConfig,
    /// Packaging configuration
    pub package: PackageConfig,
}

/// Build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Build tool executable
    pub tool: String,
    /// CMake toolchain file passed to every configure step
    pub toolchain_file: PathBuf,
    /// Optional Android NDK override
    pub ndk_dir: Option<PathBuf>,
    /// Root of the per-architecture build trees
    pub build_dir: PathBuf,
    /// Architectures to build, primary first
    pub targets: Vec<TargetArch>,
}

/// Packaging configuration
#[derive(Debug, Clone)]
pub struct PackageConfig {
    /// Output archive path, or an existing directory to place `<id>.tbp` in
    pub output_path: PathBuf,
    /// Source subdirectories copied verbatim under the same name
    pub asset_dirs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            source_dir: PathBuf::from("."),
            build: BuildConfig::default(),
            package: PackageConfig::default(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tool: "cmake".to_string(),
            toolchain_file: PathBuf::from("cmake").join(TOOLCHAIN_FILE_NAME),
            ndk_dir: None,
            build_dir: PathBuf::from("build"),
            targets: TargetArch::ALL.to_vec(),
        }
    }
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("package.tbp"),
            asset_dirs: vec![
                "native".to_string(),
                "assets".to_string(),
                "resource_pack".to_string(),
            ],
        }
    }
}

impl Config {
    /// Create configuration from command line arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let defaults = Self::default();

        let toolchain_file = match &args.toolchain {
            Some(path) => absolute_path(path)?,
            None => discover_toolchain_file()?,
        };

        let config = Self {
            debug: args.debug,
            source_dir: absolute_path(&args.path)?,
            build: BuildConfig {
                tool: tool_path(&args.cmake)?,
                toolchain_file,
                ndk_dir: args.ndk.as_deref().map(absolute_path).transpose()?,
                build_dir: absolute_path(&args.build_dir)?,
                ..defaults.build
            },
            package: PackageConfig {
                output_path: absolute_path(&args.out)?,
                ..defaults.package
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let native_build_file = self.native_build_file();
        if !native_build_file.is_file() {
            return Err(BuilderError::missing_file(
                format!("{NATIVE_BUILD_FILE} not found in the source directory"),
                native_build_file,
            ));
        }

        if self.build.targets.is_empty() {
            return Err(BuilderError::config("No target architectures configured"));
        }

        Ok(())
    }

    /// Fail unless the toolchain file exists
    pub fn check_toolchain(&self) -> Result<()> {
        if self.build.toolchain_file.is_file() {
            Ok(())
        } else {
            Err(BuilderError::toolchain("TML CMake toolchain not found"))
        }
    }

    /// Path of the native build description
    pub fn native_build_file(&self) -> PathBuf {
        self.source_dir.join(NATIVE_BUILD_FILE)
    }

    /// Path of package.yaml in the source directory
    pub fn manifest_path(&self) -> PathBuf {
        self.source_dir.join(crate::core::manifest::MANIFEST_FILE)
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| {
        BuilderError::config(format!("Failed to resolve path {}: {e}", path.display()))
    })
}

/// Build tool to invoke from the per-architecture build directories.
///
/// Bare names are left for the PATH lookup; anything with a directory part
/// is made absolute since the tool runs with a different working directory.
fn tool_path(tool: &Path) -> Result<String> {
    let resolved = if tool.components().count() > 1 {
        absolute_path(tool)?
    } else {
        tool.to_path_buf()
    };
    Ok(resolved.to_string_lossy().into_owned())
}

/// Locate the toolchain shipped next to the installed tool.
///
/// The binary lives in `<root>/<bin dir>/`, the toolchain in
/// `<root>/cmake/tml.toolchain.cmake`.
fn discover_toolchain_file() -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| BuilderError::config(format!("Failed to locate the executable: {e}")))?;

    let root = exe
        .parent()
        .and_then(Path::parent)
        .ok_or_else(|| BuilderError::toolchain("TML CMake toolchain not found"))?;

    Ok(root.join("cmake").join(TOOLCHAIN_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn args_for(temp_dir: &TempDir, extra: &[&str]) -> Args {
        let source = temp_dir.path().to_string_lossy().into_owned();
        let mut argv = vec!["tml-build", "-p", source.as_str()];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.build.tool, "cmake");
        assert_eq!(config.build.targets, TargetArch::ALL.to_vec());
        assert_eq!(config.package.output_path, PathBuf::from("package.tbp"));
        assert_eq!(
            config.package.asset_dirs,
            vec!["native", "assets", "resource_pack"]
        );
    }

    #[test]
    fn test_missing_native_build_file() {
        let temp_dir = TempDir::new().unwrap();
        let args = args_for(&temp_dir, &[]);

        let err = Config::from_args(&args).unwrap_err();
        assert!(matches!(err, BuilderError::MissingFile { .. }));
        assert_eq!(err.to_string(), "CMakeLists.txt not found in the source directory");
    }

    #[test]
    fn test_from_args_resolves_paths() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(NATIVE_BUILD_FILE), "").unwrap();
        let args = args_for(
            &temp_dir,
            &["-n", "ndk", "-t", "toolchain.cmake", "--cmake", "/usr/bin/cmake", "-c"],
        );

        let config = Config::from_args(&args).unwrap();
        assert!(config.source_dir.is_absolute());
        assert!(config.build.build_dir.is_absolute());
        assert!(config.package.output_path.is_absolute());
        assert!(config.build.toolchain_file.is_absolute());
        assert!(config.build.toolchain_file.ends_with("toolchain.cmake"));
        assert!(config.build.ndk_dir.as_ref().unwrap().is_absolute());
        assert_eq!(config.build.tool, "/usr/bin/cmake");
        assert_eq!(config.manifest_path(), config.source_dir.join("package.yaml"));
    }

    #[test]
    fn test_tool_path_resolution() {
        assert_eq!(tool_path(Path::new("cmake")).unwrap(), "cmake");
        assert_eq!(tool_path(Path::new("/opt/cmake/bin/cmake")).unwrap(), "/opt/cmake/bin/cmake");

        let relative = PathBuf::from(tool_path(Path::new("./tools/cmake")).unwrap());
        assert!(relative.is_absolute());
        assert!(relative.ends_with("tools/cmake"));
    }

    #[test]
    fn test_discovered_toolchain_location() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(NATIVE_BUILD_FILE), "").unwrap();
        let args = args_for(&temp_dir, &[]);

        let config = Config::from_args(&args).unwrap();
        assert!(config.build.toolchain_file.ends_with("cmake/tml.toolchain.cmake"));
    }

    #[test]
    fn test_check_toolchain() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.build.toolchain_file = temp_dir.path().join(TOOLCHAIN_FILE_NAME);

        let err = config.check_toolchain().unwrap_err();
        assert_eq!(err.to_string(), "TML CMake toolchain not found");

        fs::write(&config.build.toolchain_file, "").unwrap();
        assert!(config.check_toolchain().is_ok());
    }
}
