//! Dependency resolution against local Maven-layout repositories
//!
//! Resolves `group:artifact:version` coordinates to jar files. Every
//! unresolved coordinate is collected so the build aborts with the full list.

use crate::{
    config::{Config, DependencyScope, DependencySpec, ExcludeRule, RepositoryConfig},
    error::{HubError, Result},
};
use std::{
    cmp::Ordering,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info, instrument, warn};

/// Parsed `group:artifact:version` coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinates {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Coordinates {
    /// Whether the version is a `prefix+` dynamic selector
    pub fn is_dynamic(&self) -> bool {
        self.version.ends_with('+')
    }

    /// Directory holding every version of this artifact
    fn artifact_dir(&self, repository: &Path) -> PathBuf {
        self.group
            .split('.')
            .fold(repository.to_path_buf(), |path, part| path.join(part))
            .join(&self.artifact)
    }

    /// Jar path for a concrete version
    fn jar_path(&self, repository: &Path, version: &str) -> PathBuf {
        self.artifact_dir(repository)
            .join(version)
            .join(format!("{}-{}.jar", self.artifact, version))
    }
}

impl FromStr for Coordinates {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [group, artifact, version]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(Self {
                    group: group.to_string(),
                    artifact: artifact.to_string(),
                    version: version.to_string(),
                })
            }
            _ => Err(HubError::config(format!(
                "Invalid dependency coordinates '{s}', expected group:artifact:version"
            ))),
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// A dependency located on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    /// Coordinates with the concrete version
    pub coordinates: Coordinates,
    pub scope: DependencyScope,
    /// Artifact file
    pub path: PathBuf,
    /// Repository that provided it
    pub repository: String,
}

impl ResolvedDependency {
    /// Whether the artifact is a jar that can be unpacked into the bundle
    pub fn is_jar(&self) -> bool {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".jar"))
    }
}

/// Complete resolution result
#[derive(Debug, Clone, Default)]
pub struct ResolvedDependencies {
    pub dependencies: Vec<ResolvedDependency>,
}

impl ResolvedDependencies {
    /// Runtime classpath in declaration order
    pub fn runtime_classpath(&self) -> impl Iterator<Item = &ResolvedDependency> {
        self.dependencies.iter().filter(|d| d.scope.is_runtime())
    }

    /// Runtime classpath minus the excluded modules
    pub fn fat_archive_set(&self, excludes: &[ExcludeRule]) -> Vec<ResolvedDependency> {
        self.runtime_classpath()
            .filter(|dep| {
                let excluded = excludes
                    .iter()
                    .any(|rule| rule.matches(&dep.coordinates.group, &dep.coordinates.artifact));
                if excluded {
                    debug!("Excluding {} from the bundle", dep.coordinates);
                }
                !excluded
            })
            .cloned()
            .collect()
    }
}

/// Resolves declared dependencies against the configured repositories
pub struct DependencyResolver {
    repositories: Vec<RepositoryConfig>,
}

impl DependencyResolver {
    pub fn new(repositories: Vec<RepositoryConfig>) -> Self {
        Self { repositories }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.dependencies.repositories.clone())
    }

    /// Resolve every declared dependency, failing with the full list of
    /// unresolved coordinates
    #[instrument(skip(self, declared))]
    pub fn resolve_all(&self, declared: &[DependencySpec]) -> Result<ResolvedDependencies> {
        info!(
            "Resolving {} dependencies against {} repositories",
            declared.len(),
            self.repositories.len()
        );

        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();

        for spec in declared {
            let coordinates: Coordinates = spec.coordinates.parse()?;
            match self.resolve(&coordinates) {
                Some((version, path, repository)) => {
                    debug!("Resolved {} -> {}", coordinates, path.display());
                    resolved.push(ResolvedDependency {
                        coordinates: Coordinates {
                            version,
                            ..coordinates
                        },
                        scope: spec.scope,
                        path,
                        repository,
                    });
                }
                None => {
                    warn!("Could not resolve {}", coordinates);
                    unresolved.push(coordinates.to_string());
                }
            }
        }

        if !unresolved.is_empty() {
            return Err(HubError::dependency(
                format!(
                    "Could not resolve {} dependencies: {}",
                    unresolved.len(),
                    unresolved.join(", ")
                ),
                unresolved,
            ));
        }

        info!("Resolved {} dependencies", resolved.len());
        Ok(ResolvedDependencies {
            dependencies: resolved,
        })
    }

    /// First repository holding the artifact wins
    fn resolve(&self, coordinates: &Coordinates) -> Option<(String, PathBuf, String)> {
        self.repositories.iter().find_map(|repository| {
            let version = if coordinates.is_dynamic() {
                self.pick_dynamic_version(coordinates, &repository.path)?
            } else {
                coordinates.version.clone()
            };
            let path = coordinates.jar_path(&repository.path, &version);
            path.is_file()
                .then(|| (version, path, repository.name.clone()))
        })
    }

    /// Highest available version starting with the dynamic prefix
    fn pick_dynamic_version(&self, coordinates: &Coordinates, repository: &Path) -> Option<String> {
        let prefix = coordinates.version.trim_end_matches('+');
        let entries = std::fs::read_dir(coordinates.artifact_dir(repository)).ok()?;

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|version| version.starts_with(prefix))
            .filter(|version| coordinates.jar_path(repository, version).is_file())
            .max_by(|a, b| compare_versions(a, b))
    }
}

/// Compare dotted versions numerically where both segments are numbers
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '-']);
    let mut right = b.split(['.', '-']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}
