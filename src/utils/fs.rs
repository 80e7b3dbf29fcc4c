//! File system utility functions
//!
//! Provides safe file operations with proper error handling.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

/// A regular file found under a directory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    /// Absolute or caller-relative path on disk
    pub path: PathBuf,
    /// Path relative to the walked root, `/`-separated
    pub relative: String,
}

/// Utility struct for file system operations
#[derive(Debug)]
pub struct FileSystemUtils;

impl FileSystemUtils {
    /// Create a new file system utilities instance
    pub fn new() -> Self {
        Self
    }

    /// Create directories recursively
    #[instrument(skip(self))]
    pub fn create_dir_all<P: AsRef<Path> + std::fmt::Debug>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        debug!("Creating directory: {}", path.display());
        fs::create_dir_all(path)
    }

    /// Check if a path exists and is a file
    pub fn is_file<P: AsRef<Path>>(&self, path: P) -> bool {
        path.as_ref().is_file()
    }

    /// Check if a path exists and is a directory
    pub fn is_dir<P: AsRef<Path>>(&self, path: P) -> bool {
        path.as_ref().is_dir()
    }

    /// Read file contents as string
    #[instrument(skip(self))]
    pub fn read_file_to_string<P: AsRef<Path> + std::fmt::Debug>(&self, path: P) -> io::Result<String> {
        let path = path.as_ref();
        debug!("Reading file: {}", path.display());
        fs::read_to_string(path)
    }

    /// List the file names directly inside `dir` matching a glob such as `*.so`.
    ///
    /// Names are returned sorted. Subdirectories are not searched.
    #[instrument(skip(self))]
    pub fn list_file_names(&self, dir: &Path, pattern: &str) -> Result<Vec<String>, glob::PatternError> {
        let escaped = glob::Pattern::escape(&dir.to_string_lossy());
        let full_pattern = format!("{escaped}/{pattern}");
        let mut names = Vec::new();

        for path_result in glob::glob(&full_pattern)? {
            match path_result {
                Ok(path) if path.is_file() => {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        debug!("Found file: {}", path.display());
                        names.push(name.to_string());
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Error reading path for pattern {}: {}", pattern, e),
            }
        }

        names.sort();
        Ok(names)
    }

    /// Recursively list every regular file under `root`.
    ///
    /// Returns an empty list when `root` does not exist. Symbolic links are
    /// followed and listed under their own name. Entries are sorted by
    /// relative path so archive contents are deterministic.
    #[instrument(skip(self))]
    pub fn walk_files(&self, root: &Path) -> io::Result<Vec<TreeFile>> {
        if !root.is_dir() {
            debug!("Directory does not exist: {}", root.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(TreeFile {
                path: entry.path().to_path_buf(),
                relative,
            });
        }

        Ok(files)
    }
}

impl Default for FileSystemUtils {
    fn default() -> Self {
        Self::new()
    }
}
