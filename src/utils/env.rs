//! Environment, properties and version handling utilities
//!
//! Reads `key=value` build properties, derives the implementation version from
//! the CI commit variable and writes version information for CI jobs.

use crate::{
    config::Config,
    error::{HubError, Result},
    utils::fs::FileSystemUtils,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, env, path::Path};
use tracing::{debug, info, instrument};

/// Environment variable carrying the short commit hash
pub const COMMIT_SHA_VAR: &str = "COMMIT_SHA_SHORT";

/// Implementation version: `<version>` or `<version>-<commit>`
pub fn implementation_version(version: &str, commit: Option<&str>) -> String {
    match commit.map(str::trim).filter(|c| !c.is_empty()) {
        Some(commit) => format!("{version}-{commit}"),
        None => version.to_string(),
    }
}

/// Implementation version using [`COMMIT_SHA_VAR`] from the environment
pub fn implementation_version_from_env(version: &str) -> String {
    implementation_version(version, env::var(COMMIT_SHA_VAR).ok().as_deref())
}

/// Parsed `key=value` properties file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesFile {
    entries: BTreeMap<String, String>,
}

impl PropertiesFile {
    /// Load and parse a properties file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading properties from: {}", path.display());

        let content = FileSystemUtils::new()
            .read_file_to_string(path)
            .map_err(|e| HubError::file_system("read", path.to_path_buf(), e))?;
        Ok(Self::parse(&content))
    }

    /// Parse properties content; `#` and `!` start comment lines
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"');
                if !key.is_empty() {
                    entries.insert(key.to_string(), value.to_string());
                }
            }
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn into_entries(self) -> BTreeMap<String, String> {
        self.entries
    }
}

/// Version information generator for CI jobs
#[derive(Debug)]
pub struct VersionGenerator {
    fs_utils: FileSystemUtils,
}

/// Complete version information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Project name
    pub name: String,
    /// Project version
    pub version: String,
    /// Version stamped into archive manifests
    pub implementation_version: String,
    /// Short commit hash, if the CI provided one
    pub commit: Option<String>,
    /// Build timestamp in RFC3339 format
    pub build_date: String,
}

impl VersionGenerator {
    /// Create a new version generator
    pub fn new() -> Self {
        Self {
            fs_utils: FileSystemUtils::new(),
        }
    }

    /// Generate the version file from the project configuration
    #[instrument(skip(self, config, output_file))]
    pub fn generate<P: AsRef<Path>>(&self, config: &Config, output_file: P) -> Result<VersionInfo> {
        let output_file = output_file.as_ref();
        info!(
            "Generating version information to: {}",
            output_file.display()
        );

        let version_info = self.create_version_info(config);
        let env_content = self.format_as_env_file(&version_info);

        self.fs_utils
            .write_file(output_file, env_content.as_bytes())
            .map_err(|e| HubError::file_system("write", output_file.to_path_buf(), e))?;

        debug!("Generated version info: {:?}", version_info);
        Ok(version_info)
    }

    fn create_version_info(&self, config: &Config) -> VersionInfo {
        let version = config.project.version();
        let commit = env::var(COMMIT_SHA_VAR).ok().filter(|c| !c.trim().is_empty());

        VersionInfo {
            name: config.project.name.clone(),
            implementation_version: implementation_version(&version, commit.as_deref()),
            version,
            commit,
            build_date: Utc::now().to_rfc3339(),
        }
    }

    /// Format version information as environment file (.env format)
    fn format_as_env_file(&self, info: &VersionInfo) -> String {
        format!(
            r#"PLUGIN_NAME={}
VERSION={}
IMPLEMENTATION_VERSION={}
COMMIT_SHA_SHORT={}
BUILD_DATE={}
"#,
            info.name,
            info.version,
            info.implementation_version,
            info.commit.as_deref().unwrap_or(""),
            info.build_date,
        )
    }
}

impl Default for VersionGenerator {
    fn default() -> Self {
        Self::new()
    }
}
