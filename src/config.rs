//! Configuration management for packaging and world conversion
//!
//! Centralizes configuration options and provides validation.

use crate::{
    cli::{Args, Command},
    error::{HubError, Result},
    utils::env::{PropertiesFile, implementation_version_from_env},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Default configuration file looked up in the project directory
pub const DEFAULT_CONFIG_FILE: &str = "hytaleshub.json";

/// Directory name the converter files live under
const CONVERTER_SUBDIR: &str = "HytalesHubConverter";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Enable debug logging
    #[serde(skip)]
    pub debug: bool,
    /// Project directory all relative paths are resolved against
    #[serde(skip)]
    pub work_dir: PathBuf,
    /// Project identity and resource layout
    pub project: ProjectConfig,
    /// Repositories, declared dependencies and bundle excludes
    pub dependencies: DependencyConfig,
    /// Output locations
    pub artifacts: ArtifactConfig,
    /// Region conversion settings
    pub converter: ConverterConfig,
}

/// Project identity and source layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Maven group
    pub group: String,
    /// Project name, used as implementation title and archive base name
    pub name: String,
    /// Root project name, used as specification title
    pub root_name: Option<String>,
    /// Explicit version; falls back to the `plugin_version` property
    pub version: Option<String>,
    /// `key=value` properties file
    pub properties_file: PathBuf,
    /// Build properties, merged from the properties file and `-P` flags
    pub properties: BTreeMap<String, String>,
    /// Compiled output of the main source set
    pub classes_dir: PathBuf,
    /// Resources of the main source set
    pub resources_dir: PathBuf,
    /// Sources packed into the sources archive
    pub sources_dir: PathBuf,
    /// Resource file names that get placeholder expansion
    pub templated_resources: Vec<String>,
}

/// Dependency declarations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DependencyConfig {
    /// Local Maven-layout repositories, searched in order
    pub repositories: Vec<RepositoryConfig>,
    /// Declared dependencies
    pub declared: Vec<DependencySpec>,
    /// Modules left out of the fat archive
    pub bundle_excludes: Vec<ExcludeRule>,
}

/// A local repository root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub name: String,
    pub path: PathBuf,
}

/// How a dependency participates in the build
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DependencyScope {
    /// Needed to compile only, never packaged
    CompileOnly,
    /// Compile and runtime classpath
    Implementation,
    /// Runtime classpath only
    RuntimeOnly,
}

impl DependencyScope {
    /// Whether the scope contributes to the runtime classpath
    pub fn is_runtime(self) -> bool {
        matches!(self, Self::Implementation | Self::RuntimeOnly)
    }
}

/// A declared `group:artifact:version` dependency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencySpec {
    pub coordinates: String,
    pub scope: DependencyScope,
}

/// Excludes a module (or a whole group) from the fat archive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExcludeRule {
    pub group: String,
    #[serde(default)]
    pub module: Option<String>,
}

impl ExcludeRule {
    /// Whether this rule removes the given module
    pub fn matches(&self, group: &str, module: &str) -> bool {
        self.group == group && self.module.as_deref().is_none_or(|m| m == module)
    }
}

/// Output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArtifactConfig {
    /// Build directory
    pub build_dir: PathBuf,
    /// Version file path
    pub version_file: PathBuf,
    /// Classifier of the bundled archive
    pub fat_classifier: String,
}

/// Region conversion settings, keyed like the in-game mod config
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ConverterConfig {
    /// Base directory; `HytalesHubConverter` is appended unless already present
    pub root_dir: PathBuf,
    pub mc_regions_folder: String,
    pub hytale_regions_folder: String,
    pub block_mapping_file: String,
    pub unmapped_blocks_file: String,
    pub block_overrides_file: String,
    pub block_ids_file: String,
    pub skip_air: bool,
    #[serde(rename = "ExtractYMin")]
    pub extract_y_min: i32,
    #[serde(rename = "ExtractYMax")]
    pub extract_y_max: i32,
    pub map_min_score: f32,
    #[serde(rename = "ConvertYOffset")]
    pub convert_y_offset: i32,
    pub default_unmapped_block: String,
    pub spawn_threads: usize,
    /// Accepted so older mod configs keep loading; block ids always come from the ids file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_live_block_registry: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            work_dir: PathBuf::from("."),
            project: ProjectConfig::default(),
            dependencies: DependencyConfig::default(),
            artifacts: ArtifactConfig::default(),
            converter: ConverterConfig::default(),
        }
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            group: "dev.chasem".to_string(),
            name: "HytalesHubConverter".to_string(),
            root_name: None,
            version: None,
            properties_file: PathBuf::from("gradle.properties"),
            properties: BTreeMap::new(),
            classes_dir: PathBuf::from("build/classes/java/main"),
            resources_dir: PathBuf::from("src/main/resources"),
            sources_dir: PathBuf::from("src/main/java"),
            templated_resources: vec!["manifest.json".to_string()],
        }
    }
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            declared: Vec::new(),
            // the modlist preview is a runtime extra, never shipped in the bundle
            bundle_excludes: vec![ExcludeRule {
                group: "com.buuz135".to_string(),
                module: Some("BetterModlist".to_string()),
            }],
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            version_file: PathBuf::from("version.env"),
            fat_classifier: "all".to_string(),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("config"),
            mc_regions_folder: "mc-regions".to_string(),
            hytale_regions_folder: "hytale-region-csv".to_string(),
            block_mapping_file: "block-mapping.csv".to_string(),
            unmapped_blocks_file: "unmapped-blocks.csv".to_string(),
            block_overrides_file: "block-overrides.csv".to_string(),
            block_ids_file: "block-ids.txt".to_string(),
            skip_air: true,
            extract_y_min: 0,
            extract_y_max: 319,
            map_min_score: 0.45,
            convert_y_offset: 100,
            default_unmapped_block: "Soil_Clay_Smooth_Grey".to_string(),
            spawn_threads: 100,
            use_live_block_registry: None,
        }
    }
}

impl ProjectConfig {
    /// Project version: explicit setting, then `plugin_version`, then `0.1.0`
    pub fn version(&self) -> String {
        self.version
            .clone()
            .or_else(|| self.properties.get("plugin_version").cloned())
            .unwrap_or_else(|| "0.1.0".to_string())
    }

    /// Root project name, defaulting to the project name
    pub fn root_name(&self) -> &str {
        self.root_name.as_deref().unwrap_or(&self.name)
    }

    /// Build-time property lookup
    pub fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned()
    }

    /// Values substituted into templated resources
    pub fn template_properties(&self) -> BTreeMap<String, Option<String>> {
        let mut values = BTreeMap::new();
        values.insert("plugin_group".to_string(), self.property("plugin_group"));
        values.insert("plugin_maven_group".to_string(), Some(self.group.clone()));
        values.insert("plugin_name".to_string(), Some(self.name.clone()));
        values.insert("plugin_version".to_string(), Some(self.version()));
        values.insert("server_version".to_string(), self.property("server_version"));
        values.insert(
            "plugin_description".to_string(),
            self.property("plugin_description"),
        );
        values.insert("plugin_website".to_string(), self.property("plugin_website"));
        values.insert(
            "plugin_main_entrypoint".to_string(),
            self.property("plugin_main_entrypoint"),
        );
        values.insert("plugin_author".to_string(), self.property("plugin_author"));
        values
    }
}

impl ConverterConfig {
    /// Converter working directory
    pub fn converter_dir(&self) -> PathBuf {
        if self.root_dir.file_name().and_then(|n| n.to_str()) == Some(CONVERTER_SUBDIR) {
            self.root_dir.clone()
        } else {
            self.root_dir.join(CONVERTER_SUBDIR)
        }
    }

    pub fn mc_regions_dir(&self) -> PathBuf {
        self.converter_dir().join(&self.mc_regions_folder)
    }

    pub fn hytale_regions_dir(&self) -> PathBuf {
        self.converter_dir().join(&self.hytale_regions_folder)
    }

    pub fn block_mapping_path(&self) -> PathBuf {
        self.converter_dir().join(&self.block_mapping_file)
    }

    pub fn unmapped_blocks_path(&self) -> PathBuf {
        self.converter_dir().join(&self.unmapped_blocks_file)
    }

    pub fn block_overrides_path(&self) -> PathBuf {
        self.converter_dir().join(&self.block_overrides_file)
    }

    pub fn block_ids_path(&self) -> PathBuf {
        self.converter_dir().join(&self.block_ids_file)
    }
}

impl Config {
    /// Create configuration from command line arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let config_path = match &args.config {
            Some(path) => Some(args.project_dir.join(path)),
            None => {
                let candidate = args.project_dir.join(DEFAULT_CONFIG_FILE);
                candidate.is_file().then_some(candidate)
            }
        };

        let mut config = match config_path {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.debug = args.debug;
        if let Some(live) = config.converter.use_live_block_registry {
            debug!(
                "Ignoring UseLiveBlockRegistry={}: block ids are read from {}",
                live, config.converter.block_ids_file
            );
        }
        config.work_dir = args.project_dir.clone();
        config.resolve_relative_paths();

        // Properties file first, then the command line wins
        let properties_path = config.project.properties_file.clone();
        if properties_path.is_file() {
            let file = PropertiesFile::load(&properties_path)?;
            for (key, value) in file.into_entries() {
                config.project.properties.entry(key).or_insert(value);
            }
        }
        for raw in &args.properties {
            let (key, value) = raw.split_once('=').ok_or_else(|| {
                HubError::config(format!("Invalid property '{raw}', expected key=value"))
            })?;
            config
                .project
                .properties
                .insert(key.trim().to_string(), value.trim().to_string());
        }

        // Override with command-specific options
        match &args.command {
            Command::Package {
                build_dir: Some(build_dir),
            } => {
                config.artifacts.build_dir = config.work_dir.join(build_dir);
            }
            Command::Version { output_file } => {
                config.artifacts.version_file = config.work_dir.join(output_file);
            }
            Command::Spawn {
                threads: Some(threads),
            } => {
                config.converter.spawn_threads = *threads;
            }
            _ => {}
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| HubError::file_system("read", path.to_path_buf(), e))?;
        serde_json::from_str(&content).map_err(|e| {
            HubError::config_with_source(format!("Invalid config file {}", path.display()), e)
        })
    }

    /// Anchor every relative path at the project directory
    fn resolve_relative_paths(&mut self) {
        let base = self.work_dir.clone();
        let anchor = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        anchor(&mut self.project.properties_file);
        anchor(&mut self.project.classes_dir);
        anchor(&mut self.project.resources_dir);
        anchor(&mut self.project.sources_dir);
        anchor(&mut self.artifacts.build_dir);
        anchor(&mut self.artifacts.version_file);
        anchor(&mut self.converter.root_dir);
        for repository in &mut self.dependencies.repositories {
            anchor(&mut repository.path);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.work_dir.exists() {
            return Err(HubError::validation(format!(
                "Project directory not found: {}",
                self.work_dir.display()
            )));
        }

        if self.project.name.trim().is_empty() {
            return Err(HubError::validation("Project name must not be empty"));
        }

        let converter = &self.converter;
        if converter.extract_y_min > converter.extract_y_max {
            return Err(HubError::validation(format!(
                "ExtractYMin ({}) is above ExtractYMax ({})",
                converter.extract_y_min, converter.extract_y_max
            )));
        }

        if !(0.0..=1.0).contains(&converter.map_min_score) {
            return Err(HubError::validation(format!(
                "MapMinScore must be within 0..=1, got {}",
                converter.map_min_score
            )));
        }

        if converter.spawn_threads == 0 {
            return Err(HubError::validation("SpawnThreads must be at least 1"));
        }

        Ok(())
    }

    /// Processed resources output directory
    pub fn processed_resources_dir(&self) -> PathBuf {
        self.artifacts.build_dir.join("resources").join("main")
    }

    /// Archive output directory
    pub fn libs_dir(&self) -> PathBuf {
        self.artifacts.build_dir.join("libs")
    }

    /// Archive path for an optional classifier
    pub fn archive_path(&self, classifier: Option<&str>) -> PathBuf {
        let version = self.project.version();
        let file_name = match classifier {
            Some(classifier) => format!("{}-{}-{}.jar", self.project.name, version, classifier),
            None => format!("{}-{}.jar", self.project.name, version),
        };
        self.libs_dir().join(file_name)
    }

    /// Implementation version stamped into archive manifests
    pub fn implementation_version(&self) -> String {
        implementation_version_from_env(&self.project.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn parse(dir: &Path, extra: &[&str]) -> Args {
        let mut argv = vec![
            "hytaleshub".to_string(),
            "--project-dir".to_string(),
            dir.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_match_mod_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.mc_regions_folder, "mc-regions");
        assert_eq!(config.extract_y_max, 319);
        assert_eq!(config.convert_y_offset, 100);
        assert_eq!(config.default_unmapped_block, "Soil_Clay_Smooth_Grey");
        assert!((config.map_min_score - 0.45).abs() < f32::EPSILON);
    }

    #[test]
    fn test_converter_dir_appends_subdir_once() {
        let mut config = ConverterConfig::default();
        assert_eq!(config.converter_dir(), PathBuf::from("config/HytalesHubConverter"));

        config.root_dir = PathBuf::from("data/HytalesHubConverter");
        assert_eq!(config.converter_dir(), PathBuf::from("data/HytalesHubConverter"));
    }

    #[test]
    fn test_properties_file_and_overrides() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("gradle.properties"),
            "plugin_version=1.4.0\nplugin_author=Chase\n",
        )
        .unwrap();

        let args = parse(temp_dir.path(), &["-P", "plugin_author=Someone", "template"]);
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.project.version(), "1.4.0");
        assert_eq!(
            config.project.property("plugin_author").as_deref(),
            Some("Someone")
        );
    }

    #[test]
    fn test_json_config_is_loaded() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(DEFAULT_CONFIG_FILE),
            r#"{
                "project": { "name": "Demo", "version": "2.0.0" },
                "converter": { "SkipAir": false, "ExtractYMin": -64 }
            }"#,
        )
        .unwrap();

        let args = parse(temp_dir.path(), &["extract"]);
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.project.name, "Demo");
        assert_eq!(config.project.version(), "2.0.0");
        assert!(!config.converter.skip_air);
        assert_eq!(config.converter.extract_y_min, -64);
        assert_eq!(config.converter.extract_y_max, 319);
        assert_eq!(
            config.archive_path(Some("all")),
            temp_dir.path().join("build/libs/Demo-2.0.0-all.jar")
        );
    }

    #[test]
    fn test_default_bundle_excludes_modlist() {
        let dependencies = DependencyConfig::default();
        assert!(dependencies.declared.is_empty());
        assert_eq!(dependencies.bundle_excludes.len(), 1);
        assert!(dependencies.bundle_excludes[0].matches("com.buuz135", "BetterModlist"));
    }

    #[test]
    fn test_declared_dependencies_keep_default_excludes() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(DEFAULT_CONFIG_FILE),
            r#"{
                "dependencies": {
                    "declared": [
                        { "coordinates": "com.buuz135:BetterModlist:1.0", "scope": "runtimeOnly" }
                    ]
                }
            }"#,
        )
        .unwrap();

        let args = parse(temp_dir.path(), &["package"]);
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.dependencies.declared.len(), 1);
        assert_eq!(
            config.dependencies.bundle_excludes,
            DependencyConfig::default().bundle_excludes
        );
    }

    #[test]
    fn test_live_block_registry_key_is_accepted() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(DEFAULT_CONFIG_FILE),
            r#"{ "converter": { "UseLiveBlockRegistry": true, "SpawnThreads": 4 } }"#,
        )
        .unwrap();

        let args = parse(temp_dir.path(), &["map"]);
        let config = Config::from_args(&args).unwrap();

        assert_eq!(config.converter.use_live_block_registry, Some(true));
        assert_eq!(config.converter.spawn_threads, 4);
    }

    #[test]
    fn test_invalid_y_range_rejected() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(DEFAULT_CONFIG_FILE),
            r#"{ "converter": { "ExtractYMin": 10, "ExtractYMax": 5 } }"#,
        )
        .unwrap();

        let args = parse(temp_dir.path(), &["extract"]);
        assert!(matches!(
            Config::from_args(&args),
            Err(HubError::Validation { .. })
        ));
    }

    #[test]
    fn test_template_properties_cover_all_placeholders() {
        let project = ProjectConfig::default();
        let values = project.template_properties();
        assert_eq!(values.len(), 9);
        assert_eq!(
            values["plugin_maven_group"].as_deref(),
            Some("dev.chasem")
        );
        assert_eq!(values["plugin_version"].as_deref(), Some("0.1.0"));
        assert_eq!(values["plugin_author"], None);
    }

    #[test]
    fn test_exclude_rule_matching() {
        let module_rule = ExcludeRule {
            group: "com.buuz135".to_string(),
            module: Some("BetterModlist".to_string()),
        };
        assert!(module_rule.matches("com.buuz135", "BetterModlist"));
        assert!(!module_rule.matches("com.buuz135", "Other"));

        let group_rule = ExcludeRule {
            group: "org.jspecify".to_string(),
            module: None,
        };
        assert!(group_rule.matches("org.jspecify", "jspecify"));
    }
}
