//! Archive assembly
//!
//! Writes jar archives from directories and merges dependency jars into a
//! single bundle. Entries are written first-wins: a path that is already in
//! the archive is skipped. Every entry carries ZIP64 fields so bundles beyond
//! the classic 65 535 entry / 4 GiB limits stay readable.

use crate::{
    core::jar_manifest::{JarManifest, MANIFEST_PATH},
    error::{HubError, Result},
    utils::fs::FileSystemUtils,
};
use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter, write::SimpleFileOptions};

/// Result of writing one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Archive location
    pub path: PathBuf,
    /// Entries written, directories included
    pub entries: usize,
    /// Entries dropped because the path was already present
    pub duplicates: usize,
}

impl std::fmt::Display for ArchiveSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} entries, {} duplicates skipped)",
            self.path.display(),
            self.entries,
            self.duplicates
        )
    }
}

/// Incremental jar writer with first-wins deduplication
pub struct ArchiveWriter {
    path: PathBuf,
    writer: ZipWriter<BufWriter<File>>,
    seen: HashSet<String>,
    duplicates: usize,
    fs_utils: FileSystemUtils,
}

impl ArchiveWriter {
    /// Create the archive file, replacing any previous one
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let fs_utils = FileSystemUtils::new();
        if let Some(parent) = path.parent() {
            fs_utils
                .create_dir_all(parent)
                .map_err(|e| HubError::file_system("create", parent.to_path_buf(), e))?;
        }

        let file =
            File::create(&path).map_err(|e| HubError::file_system("create", path.clone(), e))?;
        debug!("Creating archive {}", path.display());

        Ok(Self {
            writer: ZipWriter::new(BufWriter::new(file)),
            path,
            seen: HashSet::new(),
            duplicates: 0,
            fs_utils,
        })
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Write the generated manifest
    pub fn add_manifest(&mut self, manifest: &JarManifest) -> Result<bool> {
        self.add_directory("META-INF/")?;
        self.add_bytes(MANIFEST_PATH, manifest.render().as_bytes())
    }

    /// Write a file entry unless the path is already present
    pub fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<bool> {
        validate_entry_name(name, &self.path)?;
        if !self.claim(name) {
            return Ok(false);
        }

        self.writer
            .start_file(name, entry_options())
            .map_err(|e| HubError::archive_zip(format!("Failed to start {name}"), &self.path, e))?;
        self.writer
            .write_all(data)
            .map_err(|e| HubError::file_system("write", self.path.clone(), e))?;
        Ok(true)
    }

    /// Write a directory entry (`name` ends in `/`) unless already present
    pub fn add_directory(&mut self, name: &str) -> Result<bool> {
        validate_entry_name(name, &self.path)?;
        if !self.claim(name) {
            return Ok(false);
        }

        self.writer
            .add_directory(name, entry_options())
            .map_err(|e| HubError::archive_zip(format!("Failed to add {name}"), &self.path, e))?;
        Ok(true)
    }

    /// Add every file and directory below `root`, named relative to it
    #[instrument(skip(self))]
    pub fn add_tree(&mut self, root: &Path) -> Result<usize> {
        let entries = self
            .fs_utils
            .walk(root)
            .map_err(|e| HubError::file_system("walk", root.to_path_buf(), e))?;

        let mut added = 0;
        for entry in entries {
            let name = entry_name(root, &entry)?;
            let written = if entry.is_dir() {
                self.add_directory(&format!("{name}/"))?
            } else {
                let data = std::fs::read(&entry)
                    .map_err(|e| HubError::file_system("read", entry.clone(), e))?;
                self.add_bytes(&name, &data)?
            };
            if written {
                added += 1;
            }
        }

        debug!("Added {} entries from {}", added, root.display());
        Ok(added)
    }

    /// Unpack another archive into this one
    #[instrument(skip(self))]
    pub fn merge_archive(&mut self, source: &Path) -> Result<usize> {
        let file =
            File::open(source).map_err(|e| HubError::file_system("open", source.to_path_buf(), e))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| HubError::archive_zip("Invalid archive", source, e))?;

        let mut added = 0;
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| HubError::archive_zip("Unreadable entry", source, e))?;
            let name = entry.name().to_string();

            let written = if entry.is_dir() {
                self.add_directory(&name)?
            } else if self.seen.contains(&name) {
                self.duplicates += 1;
                debug!("Skipping duplicate entry {} from {}", name, source.display());
                false
            } else {
                // the declared size is untrusted; let the buffer grow as read
                let mut data = Vec::new();
                entry
                    .read_to_end(&mut data)
                    .map_err(|e| HubError::file_system("read", source.to_path_buf(), e))?;
                self.add_bytes(&name, &data)?
            };
            if written {
                added += 1;
            }
        }

        debug!("Merged {} entries from {}", added, source.display());
        Ok(added)
    }

    /// Finalize the central directory and flush the file
    pub fn finish(self) -> Result<ArchiveSummary> {
        let entries = self.seen.len();
        let mut inner = self
            .writer
            .finish()
            .map_err(|e| HubError::archive_zip("Failed to finalize", &self.path, e))?;
        inner
            .flush()
            .map_err(|e| HubError::file_system("flush", self.path.clone(), e))?;

        let summary = ArchiveSummary {
            path: self.path,
            entries,
            duplicates: self.duplicates,
        };
        info!("Wrote {}", summary);
        Ok(summary)
    }

    fn claim(&mut self, name: &str) -> bool {
        if self.seen.insert(name.to_string()) {
            true
        } else {
            self.duplicates += 1;
            debug!("Skipping duplicate entry {}", name);
            false
        }
    }
}

/// Deflated entries with ZIP64 fields and a fixed timestamp
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .large_file(true)
}

/// Archive-relative name with `/` separators
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        HubError::archive(
            format!("{} is outside {}", path.display(), root.display()),
            root,
        )
    })?;

    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    parts
        .map(|parts| parts.join("/"))
        .ok_or_else(|| HubError::archive(format!("non UTF-8 path {}", path.display()), root))
}

/// Reject absolute names and parent-directory components
fn validate_entry_name(name: &str, archive: &Path) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name.starts_with('/')
        || name.contains('\\')
        || name.split('/').any(|part| part == "..");
    if unsafe_name {
        return Err(HubError::archive(
            format!("unsupported or malicious entry name: {name:?}"),
            archive,
        ));
    }
    Ok(())
}

/// Entry names of an existing archive, in central directory order
pub fn list_entries(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| HubError::file_system("open", path.to_path_buf(), e))?;
    let archive = ZipArchive::new(BufReader::new(file))
        .map_err(|e| HubError::archive_zip("Invalid archive", path, e))?;
    Ok(archive.file_names().map(str::to_string).collect())
}
