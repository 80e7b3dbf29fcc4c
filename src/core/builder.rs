//! Native library building
//!
//! Drives CMake once per target architecture: an optional clean of a
//! previously configured tree, then a configure step and a build step inside
//! an isolated per-architecture directory.

use crate::{
    config::Config,
    error::{BuilderError, Result},
    utils::{fs::FileSystemUtils, process::ProcessRunner},
};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Marker left by a previous configure run
const CMAKE_CACHE_FILE: &str = "CMakeCache.txt";

/// Glob matching the shared libraries produced by a build
const SHARED_LIBRARY_PATTERN: &str = "*.so";

/// CPU architectures every package is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetArch {
    /// 32-bit ARM, the primary architecture
    ArmeabiV7a,
    X86,
}

impl TargetArch {
    /// Build order; the first entry is the primary architecture.
    pub const ALL: [Self; 2] = [Self::ArmeabiV7a, Self::X86];

    /// Android ABI identifier, also used as the archive directory name
    pub const fn abi(self) -> &'static str {
        match self {
            Self::ArmeabiV7a => "armeabi-v7a",
            Self::X86 => "x86",
        }
    }

    /// Subdirectory of the build directory holding this target's tree
    pub const fn build_subdir(self) -> &'static str {
        match self {
            Self::ArmeabiV7a => "arm",
            Self::X86 => "x86",
        }
    }

    /// Name used in user-facing messages
    pub const fn label(self) -> &'static str {
        match self {
            Self::ArmeabiV7a => "ARM",
            Self::X86 => "X86",
        }
    }
}

impl fmt::Display for TargetArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abi())
    }
}

/// Libraries produced for one architecture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub target: TargetArch,
    /// Directory the build ran in
    pub dir: PathBuf,
    /// File names of the produced shared libraries, sorted
    pub libraries: Vec<String>,
}

impl BuildOutput {
    pub fn contains(&self, library: &str) -> bool {
        self.libraries.iter().any(|lib| lib == library)
    }

    /// On-disk location of one of the produced libraries
    pub fn library_path(&self, library: &str) -> PathBuf {
        self.dir.join(library)
    }
}

/// Invokes the external build tool for each target architecture
pub struct NativeBuilder {
    config: Config,
    process_runner: ProcessRunner,
    fs_utils: FileSystemUtils,
}

impl NativeBuilder {
    /// Create a new native builder with the given configuration
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            process_runner: ProcessRunner::new(config.debug),
            fs_utils: FileSystemUtils::new(),
            config,
        }
    }

    /// Make sure the build tool can be executed and return its version line
    #[instrument(skip(self))]
    pub fn check_tool(&self) -> Result<String> {
        let tool = &self.config.build.tool;
        let result = self
            .process_runner
            .run_command_with_output(tool, &["--version"])
            .map_err(|e| match e {
                BuilderError::Process { exit_code: None, .. } => {
                    BuilderError::toolchain("CMake not found")
                }
                other => BuilderError::build("Failed to query the CMake version", other),
            })?;

        let version = result.stdout.lines().next().unwrap_or_default().trim().to_string();
        debug!("Using {}: {}", tool, version);
        Ok(version)
    }

    /// Build every target in order, stopping at the first failure
    #[instrument(skip(self))]
    pub fn build_all(&self) -> Result<Vec<BuildOutput>> {
        self.config
            .build
            .targets
            .iter()
            .map(|target| -> Result<BuildOutput> {
                info!("- Compiling for {}", target);
                let output = self.build(*target)?;
                info!("Built libraries: {:?}", output.libraries);
                Ok(output)
            })
            .collect()
    }

    /// Configure and compile one target, returning the libraries it produced
    #[instrument(skip(self))]
    pub fn build(&self, target: TargetArch) -> Result<BuildOutput> {
        let dir = self.config.build.build_dir.join(target.build_subdir());
        self.fs_utils
            .create_dir_all(&dir)
            .map_err(|e| BuilderError::file_system("create directory", &dir, e))?;

        if self.fs_utils.is_file(dir.join(CMAKE_CACHE_FILE)) {
            self.clean_stale_outputs(&dir);
        }

        let tool = self.config.build.tool.as_str();
        let configure_args = self.configure_args(target);
        let configure_args: Vec<&str> = configure_args.iter().map(String::as_str).collect();

        self.process_runner
            .run_command_in(&dir, tool, &configure_args)
            .map_err(|e| BuilderError::build("Failed to run CMake to generate build files", e))?;

        self.process_runner
            .run_command_in(&dir, tool, &["--build", "."])
            .map_err(|e| BuilderError::build("Failed to compile", e))?;

        let libraries = self
            .fs_utils
            .list_file_names(&dir, SHARED_LIBRARY_PATTERN)
            .map_err(|e| {
                BuilderError::config(format!("Failed to search {} for libraries: {e}", dir.display()))
            })?;

        Ok(BuildOutput {
            target,
            dir,
            libraries,
        })
    }

    /// Arguments of the configure step for `target`
    pub fn configure_args(&self, target: TargetArch) -> Vec<String> {
        let build = &self.config.build;
        let mut args = vec![
            format!("-DCMAKE_TOOLCHAIN_FILE={}", build.toolchain_file.display()),
            "-DCMAKE_BUILD_TYPE=Release".to_string(),
        ];
        if let Some(ndk) = &build.ndk_dir {
            args.push(format!("-DANDROID_NDK={}", ndk.display()));
        }
        args.push(format!("-DANDROID_ABI={}", target.abi()));
        args.push(self.config.source_dir.to_string_lossy().into_owned());
        args
    }

    /// Remove outputs left by a previous configuration of `dir`.
    ///
    /// Failure only warns; the following configure and build still run.
    fn clean_stale_outputs(&self, dir: &Path) {
        debug!("Cleaning previous build in {}", dir.display());
        let tool = self.config.build.tool.as_str();
        if let Err(e) =
            self.process_runner
                .run_command_in(dir, tool, &["--build", ".", "--target", "clean"])
        {
            warn!("Failed to clean stale build outputs in {}: {}", dir.display(), e);
        }
    }
}
