//! Package archive assembly
//!
//! Writes the manifest, the built libraries and the auxiliary source
//! directories into a deflate-compressed zip with the `.tbp` extension.

use crate::{
    config::Config,
    core::{
        builder::BuildOutput,
        manifest::{MANIFEST_FILE, Manifest},
    },
    error::{BuilderError, Result},
    utils::fs::{FileSystemUtils, TreeFile},
};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// File extension of package archives
pub const PACKAGE_EXTENSION: &str = "tbp";

/// Archive directory holding per-architecture libraries
const NATIVE_DIR: &str = "native";

/// What ended up in a written package
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PackageSummary {
    pub archive_path: PathBuf,
    /// Built libraries written, over all architectures
    pub libraries: usize,
    /// Built libraries replaced by a file from the native override directory
    pub overridden: usize,
    /// Files copied from the auxiliary directories
    pub extra_files: usize,
}

impl fmt::Display for PackageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packaged {}: {} libraries ({} overridden), {} extra files",
            self.archive_path.display(),
            self.libraries,
            self.overridden,
            self.extra_files
        )
    }
}

/// Builds the package archive
pub struct PackageAssembler {
    config: Config,
    fs_utils: FileSystemUtils,
}

impl PackageAssembler {
    /// Create a new package assembler
    pub fn new(config: Config) -> Self {
        Self {
            config,
            fs_utils: FileSystemUtils::new(),
        }
    }

    /// Final archive location: `<dir>/<id>.tbp` when the configured output is
    /// an existing directory, the configured path otherwise.
    pub fn resolve_output_path(&self, manifest: &Manifest) -> PathBuf {
        let output = &self.config.package.output_path;
        if self.fs_utils.is_dir(output) {
            output.join(format!("{}.{PACKAGE_EXTENSION}", manifest.id))
        } else {
            output.clone()
        }
    }

    /// Write the archive for `manifest` and the libraries in `outputs`
    #[instrument(skip_all)]
    pub fn assemble(&self, manifest: &Manifest, outputs: &[BuildOutput]) -> Result<PackageSummary> {
        let archive_path = self.resolve_output_path(manifest);
        let mut summary = PackageSummary {
            archive_path: archive_path.clone(),
            ..PackageSummary::default()
        };

        let extra_dirs = self.collect_extra_dirs()?;
        let overrides: HashSet<String> = extra_dirs
            .iter()
            .filter(|(dir, _)| dir == NATIVE_DIR)
            .flat_map(|(dir, files)| files.iter().map(move |file| archive_name(dir, &file.relative)))
            .collect();

        if let Some(parent) = archive_path.parent() {
            self.fs_utils
                .create_dir_all(parent)
                .map_err(|e| BuilderError::file_system("create directory", parent, e))?;
        }
        let file = File::create(&archive_path)
            .map_err(|e| BuilderError::file_system("create", &archive_path, e))?;
        let mut writer = ArchiveWriter::new(file, &archive_path);

        writer.write_bytes(MANIFEST_FILE, manifest.to_yaml_string()?.as_bytes())?;

        for output in outputs {
            let abi_dir = format!("{NATIVE_DIR}/{}", output.target.abi());
            for library in &output.libraries {
                let name = archive_name(&abi_dir, library);
                if overrides.contains(&name) {
                    info!("Using override for {}", name);
                    summary.overridden += 1;
                    continue;
                }
                writer.write_file(&name, &output.library_path(library))?;
                summary.libraries += 1;
            }
        }

        for (dir, files) in &extra_dirs {
            for file in files {
                writer.write_file(&archive_name(dir, &file.relative), &file.path)?;
                summary.extra_files += 1;
            }
        }

        writer.finish()?;
        Ok(summary)
    }

    /// Files of each auxiliary source directory; missing directories yield none
    fn collect_extra_dirs(&self) -> Result<Vec<(String, Vec<TreeFile>)>> {
        self.config
            .package
            .asset_dirs
            .iter()
            .map(|dir| -> Result<(String, Vec<TreeFile>)> {
                let root = self.config.source_dir.join(dir);
                let files = self
                    .fs_utils
                    .walk_files(&root)
                    .map_err(|e| BuilderError::file_system("read directory", &root, e))?;
                debug!("{} file(s) to copy from {}", files.len(), root.display());
                Ok((dir.clone(), files))
            })
            .collect()
    }
}

fn archive_name(dir: &str, relative: &str) -> String {
    format!("{dir}/{relative}")
}

/// Thin wrapper tying zip errors to the archive being written
struct ArchiveWriter<'a> {
    zip: ZipWriter<File>,
    path: &'a Path,
}

impl<'a> ArchiveWriter<'a> {
    fn new(file: File, path: &'a Path) -> Self {
        Self {
            zip: ZipWriter::new(file),
            path,
        }
    }

    fn start(&mut self, name: &str) -> Result<()> {
        debug!("Adding {}", name);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file(name, options).map_err(|e| {
            BuilderError::packaging(format!("Failed to add {name}"), self.path, e)
        })
    }

    fn write_bytes(&mut self, name: &str, contents: &[u8]) -> Result<()> {
        self.start(name)?;
        self.zip
            .write_all(contents)
            .map_err(|e| BuilderError::file_system("write", self.path, e))
    }

    fn write_file(&mut self, name: &str, source: &Path) -> Result<()> {
        let mut input =
            File::open(source).map_err(|e| BuilderError::file_system("open", source, e))?;
        self.start(name)?;
        io::copy(&mut input, &mut self.zip)
            .map_err(|e| BuilderError::file_system("copy", source, e))?;
        Ok(())
    }

    fn finish(self) -> Result<()> {
        self.zip
            .finish()
            .map_err(|e| BuilderError::packaging("Failed to finalize archive", self.path, e))?;
        Ok(())
    }
}
