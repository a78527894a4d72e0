//! File system utility functions
//!
//! Provides safe file operations with proper error handling.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Utility struct for file system operations
#[derive(Debug)]
pub struct FileSystemUtils;

impl FileSystemUtils {
    /// Create a new file system utilities instance
    pub fn new() -> Self {
        Self
    }

    /// Copy a file from source to destination, preserving permissions
    #[instrument(skip(self))]
    pub fn copy_file<P: AsRef<Path> + std::fmt::Debug, Q: AsRef<Path> + std::fmt::Debug>(
        &self,
        src: P,
        dst: Q,
    ) -> io::Result<u64> {
        let src = src.as_ref();
        let dst = dst.as_ref();

        debug!("Copying file: {} -> {}", src.display(), dst.display());

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes_copied = fs::copy(src, dst)?;
        let metadata = fs::metadata(src)?;
        fs::set_permissions(dst, metadata.permissions())?;

        Ok(bytes_copied)
    }

    /// Create directories recursively
    #[instrument(skip(self))]
    pub fn create_dir_all<P: AsRef<Path> + std::fmt::Debug>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        debug!("Creating directory: {}", path.display());
        fs::create_dir_all(path)
    }

    /// Remove a directory and all its contents if it exists
    #[instrument(skip(self))]
    pub fn remove_dir_all_if_exists<P: AsRef<Path> + std::fmt::Debug>(
        &self,
        path: P,
    ) -> io::Result<bool> {
        let path = path.as_ref();

        match fs::remove_dir_all(path) {
            Ok(()) => {
                debug!("Removed directory: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Write content to a file, creating parent directories if needed
    #[instrument(skip(self, contents))]
    pub fn write_file<P: AsRef<Path> + std::fmt::Debug, C: AsRef<[u8]>>(
        &self,
        path: P,
        contents: C,
    ) -> io::Result<()> {
        let path = path.as_ref();
        debug!("Writing file: {}", path.display());

        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }

        fs::write(path, contents)
    }

    /// Write bundled default content unless the file already exists
    #[instrument(skip(self, contents))]
    pub fn write_if_missing<P: AsRef<Path> + std::fmt::Debug, C: AsRef<[u8]>>(
        &self,
        path: P,
        contents: C,
    ) -> io::Result<bool> {
        let path = path.as_ref();
        if path.exists() {
            return Ok(false);
        }
        self.write_file(path, contents)?;
        debug!("Bootstrapped default file: {}", path.display());
        Ok(true)
    }

    /// Read file contents as string
    #[instrument(skip(self))]
    pub fn read_file_to_string<P: AsRef<Path> + std::fmt::Debug>(
        &self,
        path: P,
    ) -> io::Result<String> {
        let path = path.as_ref();
        debug!("Reading file: {}", path.display());
        fs::read_to_string(path)
    }

    /// Files directly inside `dir` with the given extension (case-insensitive),
    /// sorted by file name. A missing directory yields an empty list.
    #[instrument(skip(self))]
    pub fn list_files_with_extension<P: AsRef<Path> + std::fmt::Debug>(
        &self,
        dir: P,
        extension: &str,
    ) -> io::Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let suffix = format!(".{}", extension.to_ascii_lowercase());
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_ascii_lowercase().ends_with(&suffix));
            if matches && path.is_file() {
                files.push(path);
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        debug!("Found {} *{} files in {}", files.len(), suffix, dir.display());
        Ok(files)
    }

    /// Every file and directory below `dir`, in sorted path order
    #[instrument(skip(self))]
    pub fn walk<P: AsRef<Path> + std::fmt::Debug>(&self, dir: P) -> io::Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let root = dir.to_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("non UTF-8 path: {}", dir.display()),
            )
        })?;
        let pattern = format!("{}/**/*", glob::Pattern::escape(root));

        let paths = glob::glob(&pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        let mut entries = Vec::new();
        for path in paths {
            entries.push(path.map_err(glob::GlobError::into_error)?);
        }

        entries.sort();
        Ok(entries)
    }
}

impl Default for FileSystemUtils {
    fn default() -> Self {
        Self::new()
    }
}
