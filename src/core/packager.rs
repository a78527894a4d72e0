//! Packaging pipeline
//!
//! Runs `resolve → template → bundle` in order. Each step aborts the build on
//! failure, so a missing dependency stops before any resource is rendered and
//! an unresolved placeholder stops before any archive is written.

use crate::{
    config::Config,
    core::{
        archive::{ArchiveSummary, ArchiveWriter},
        dependencies::{DependencyResolver, ResolvedDependencies, ResolvedDependency},
        jar_manifest::JarManifest,
        template::{ProcessedResources, ResourceProcessor},
    },
    error::Result,
};
use tracing::{debug, info, instrument, warn};

/// Archives produced by a full package run
#[derive(Debug)]
pub struct PackageReport {
    pub resources: ProcessedResources,
    pub standard: ArchiveSummary,
    pub sources: ArchiveSummary,
    pub bundle: ArchiveSummary,
    /// Dependencies unpacked into the bundle
    pub bundled_dependencies: Vec<ResolvedDependency>,
}

/// Packages the project into its standard, sources and bundled archives
pub struct Packager {
    config: Config,
}

impl Packager {
    /// Create a new packager with the given configuration
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Resolve every declared dependency
    #[instrument(skip(self))]
    pub fn resolve(&self) -> Result<ResolvedDependencies> {
        DependencyResolver::from_config(&self.config)
            .resolve_all(&self.config.dependencies.declared)
    }

    /// Copy resources into the build directory, expanding templates
    #[instrument(skip(self))]
    pub fn process_resources(&self) -> Result<ProcessedResources> {
        ResourceProcessor::new(self.config.clone())?.process()
    }

    /// Run the whole pipeline
    #[instrument(skip(self))]
    pub fn package(&self) -> Result<PackageReport> {
        info!(
            "Packaging {} {}",
            self.config.project.name,
            self.config.project.version()
        );

        let resolved = self.resolve()?;
        let resources = self.process_resources()?;
        let manifest = JarManifest::for_project(&self.config);

        let standard = self.write_standard_archive(&manifest)?;
        let sources = self.write_sources_archive(&manifest)?;

        let bundled_dependencies =
            resolved.fat_archive_set(&self.config.dependencies.bundle_excludes);
        let bundle = self.write_bundle(&manifest, &bundled_dependencies)?;

        Ok(PackageReport {
            resources,
            standard,
            sources,
            bundle,
            bundled_dependencies,
        })
    }

    /// Manifest, compiled classes and processed resources
    fn write_standard_archive(&self, manifest: &JarManifest) -> Result<ArchiveSummary> {
        let mut writer = ArchiveWriter::create(self.config.archive_path(None))?;
        writer.add_manifest(manifest)?;
        self.add_primary_output(&mut writer)?;
        writer.finish()
    }

    /// Manifest plus raw sources and resources
    fn write_sources_archive(&self, manifest: &JarManifest) -> Result<ArchiveSummary> {
        let mut writer = ArchiveWriter::create(self.config.archive_path(Some("sources")))?;
        writer.add_manifest(manifest)?;
        for dir in [
            &self.config.project.sources_dir,
            &self.config.project.resources_dir,
        ] {
            if dir.is_dir() {
                writer.add_tree(dir)?;
            } else {
                debug!("Source directory {} not present", dir.display());
            }
        }
        writer.finish()
    }

    /// Primary output followed by every non-excluded runtime jar
    fn write_bundle(
        &self,
        manifest: &JarManifest,
        dependencies: &[ResolvedDependency],
    ) -> Result<ArchiveSummary> {
        let classifier = self.config.artifacts.fat_classifier.as_str();
        let mut writer = ArchiveWriter::create(self.config.archive_path(Some(classifier)))?;
        writer.add_manifest(manifest)?;
        self.add_primary_output(&mut writer)?;

        for dependency in dependencies {
            if !dependency.is_jar() {
                debug!("Skipping non-jar artifact {}", dependency.path.display());
                continue;
            }
            let added = writer.merge_archive(&dependency.path)?;
            info!("Bundled {} ({} entries)", dependency.coordinates, added);
        }

        writer.finish()
    }

    fn add_primary_output(&self, writer: &mut ArchiveWriter) -> Result<()> {
        let classes = &self.config.project.classes_dir;
        if classes.is_dir() {
            writer.add_tree(classes)?;
        } else {
            warn!(
                "Compiled classes not found at {}; packaging resources only",
                classes.display()
            );
        }
        writer.add_tree(&self.config.processed_resources_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{DependencyScope, DependencySpec, ExcludeRule, RepositoryConfig},
        core::archive::list_entries,
        error::HubError,
    };
    use std::{collections::BTreeSet, fs, fs::File, io::Write, path::Path};
    use tempfile::TempDir;
    use zip::{ZipWriter, write::SimpleFileOptions};

    fn write_jar(path: &Path, entries: &[&str]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for name in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(name.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    fn project(temp_dir: &TempDir) -> Config {
        let root = temp_dir.path();
        let mut config = Config::default();
        config.work_dir = root.to_path_buf();
        config.project.name = "Hub".to_string();
        config.project.version = Some("1.0.0".to_string());
        config.project.classes_dir = root.join("classes");
        config.project.resources_dir = root.join("resources");
        config.project.sources_dir = root.join("java");
        config.artifacts.build_dir = root.join("build");
        config.dependencies.repositories = vec![RepositoryConfig {
            name: "local".to_string(),
            path: root.join("repo"),
        }];

        fs::create_dir_all(config.project.classes_dir.join("dev")).unwrap();
        fs::write(config.project.classes_dir.join("dev").join("Main.class"), "main").unwrap();
        fs::create_dir_all(&config.project.resources_dir).unwrap();
        fs::write(
            config.project.resources_dir.join("manifest.json"),
            r#"{"Name":"${plugin_name}"}"#,
        )
        .unwrap();
        fs::create_dir_all(&config.project.sources_dir).unwrap();
        fs::write(config.project.sources_dir.join("Main.java"), "class Main {}").unwrap();

        let repo = root.join("repo");
        write_jar(
            &repo.join("com/example/lib/1.0/lib-1.0.jar"),
            &["com/example/Lib.class", "dev/Main.class", "META-INF/MANIFEST.MF"],
        );
        write_jar(
            &repo.join("com/buuz135/BetterModlist/1.0/BetterModlist-1.0.jar"),
            &["com/buuz135/Modlist.class"],
        );
        write_jar(
            &repo.join("org/jetbrains/annotations/24.0/annotations-24.0.jar"),
            &["org/jetbrains/NotNull.class"],
        );

        config.dependencies.declared = vec![
            DependencySpec {
                coordinates: "org.jetbrains:annotations:24.0".to_string(),
                scope: DependencyScope::CompileOnly,
            },
            DependencySpec {
                coordinates: "com.example:lib:1.0".to_string(),
                scope: DependencyScope::Implementation,
            },
            DependencySpec {
                coordinates: "com.buuz135:BetterModlist:1.0".to_string(),
                scope: DependencyScope::RuntimeOnly,
            },
        ];
        // bundle_excludes stays at its default
        config
    }

    #[test]
    fn test_package_writes_three_archives() {
        let temp_dir = TempDir::new().unwrap();
        let config = project(&temp_dir);

        let report = Packager::new(config.clone()).package().unwrap();

        assert_eq!(report.standard.path, config.archive_path(None));
        assert_eq!(report.sources.path, config.archive_path(Some("sources")));
        assert_eq!(report.bundle.path, config.archive_path(Some("all")));
        assert_eq!(report.bundled_dependencies.len(), 1);

        let sources = list_entries(&report.sources.path).unwrap();
        assert!(sources.contains(&"Main.java".to_string()));
        assert!(sources.contains(&"manifest.json".to_string()));
    }

    #[test]
    fn test_bundle_is_union_without_duplicates_or_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let config = project(&temp_dir);

        let report = Packager::new(config).package().unwrap();
        let standard: BTreeSet<String> = list_entries(&report.standard.path)
            .unwrap()
            .into_iter()
            .collect();
        let bundle_list = list_entries(&report.bundle.path).unwrap();
        let bundle: BTreeSet<String> = bundle_list.iter().cloned().collect();

        assert_eq!(bundle.len(), bundle_list.len());

        let mut expected = standard.clone();
        expected.insert("com/example/Lib.class".to_string());
        // dependency directories are not listed in the test jars
        assert_eq!(bundle, expected);

        assert!(!bundle.iter().any(|e| e.starts_with("com/buuz135")));
        assert!(!bundle.iter().any(|e| e.starts_with("org/jetbrains")));
        assert_eq!(report.bundle.duplicates, 2);
    }

    #[test]
    fn test_modlist_bundled_only_without_default_exclude() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = project(&temp_dir);
        config.dependencies.bundle_excludes = vec![ExcludeRule {
            group: "org.unrelated".to_string(),
            module: None,
        }];

        let report = Packager::new(config).package().unwrap();
        let bundle = list_entries(&report.bundle.path).unwrap();
        assert!(bundle.contains(&"com/buuz135/Modlist.class".to_string()));
        assert_eq!(report.bundled_dependencies.len(), 2);
    }

    #[test]
    fn test_unresolved_dependency_aborts_before_templating() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = project(&temp_dir);
        config.dependencies.declared.push(DependencySpec {
            coordinates: "com.missing:nothing:1.0".to_string(),
            scope: DependencyScope::Implementation,
        });

        let err = Packager::new(config.clone()).package().unwrap_err();
        assert!(matches!(err, HubError::Dependency { .. }));
        assert!(!config.processed_resources_dir().exists());
    }

    #[test]
    fn test_missing_placeholder_aborts_before_archives() {
        let temp_dir = TempDir::new().unwrap();
        let config = project(&temp_dir);
        fs::write(
            config.project.resources_dir.join("manifest.json"),
            r#"{"Author":"${plugin_author}"}"#,
        )
        .unwrap();

        let err = Packager::new(config.clone()).package().unwrap_err();
        assert!(matches!(err, HubError::Template { .. }));
        assert!(!config.libs_dir().exists());
    }
}
