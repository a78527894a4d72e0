//! Resource templating
//!
//! Copies the resources directory into the build directory and expands
//! `${name}` placeholders in the configured resource files.

use crate::{
    config::Config,
    error::{HubError, Result},
    utils::fs::FileSystemUtils,
};
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Placeholder values; `None` marks a property that was never supplied
pub type TemplateValues = BTreeMap<String, Option<String>>;

/// Renders `${name}` placeholders
pub struct TemplateRenderer {
    re_placeholder: Regex,
}

impl TemplateRenderer {
    /// Create a new renderer
    pub fn new() -> Result<Self> {
        Ok(Self {
            re_placeholder: Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
                .map_err(|e| HubError::config_with_source("Failed to compile regex", e))?,
        })
    }

    /// Placeholder names referenced by a template, sorted and deduplicated
    pub fn placeholders(&self, template: &str) -> BTreeSet<String> {
        self.re_placeholder
            .captures_iter(template)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }

    /// Substitute every placeholder. Fails listing all unresolved names when
    /// any referenced placeholder has no value.
    pub fn render(&self, template: &str, values: &TemplateValues, origin: &Path) -> Result<String> {
        let missing: Vec<String> = self
            .placeholders(template)
            .into_iter()
            .filter(|name| !matches!(values.get(name), Some(Some(_))))
            .collect();

        if !missing.is_empty() {
            return Err(HubError::template_missing(origin, missing));
        }

        let rendered = self.re_placeholder.replace_all(template, |caps: &regex::Captures<'_>| {
            values
                .get(&caps[1])
                .and_then(|v| v.as_deref())
                .unwrap_or_default()
                .to_string()
        });

        Ok(rendered.into_owned())
    }

    /// Render and, for `.json` resources, check the output still parses
    pub fn render_resource(
        &self,
        template: &str,
        values: &TemplateValues,
        origin: &Path,
    ) -> Result<String> {
        let rendered = self.render(template, values, origin)?;

        let is_json = origin
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str::<serde_json::Value>(&rendered).map_err(|e| {
                HubError::template("rendered resource is not valid JSON", origin, e)
            })?;
        }

        Ok(rendered)
    }
}

/// Outcome of resource processing
#[derive(Debug, Default)]
pub struct ProcessedResources {
    /// Output directory
    pub output_dir: PathBuf,
    /// Files copied verbatim
    pub copied: usize,
    /// Files rendered through the template engine
    pub templated: Vec<PathBuf>,
}

/// Copies resources and expands templated files
pub struct ResourceProcessor {
    config: Config,
    renderer: TemplateRenderer,
    fs_utils: FileSystemUtils,
}

impl ResourceProcessor {
    /// Create a new resource processor
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            renderer: TemplateRenderer::new()?,
            fs_utils: FileSystemUtils::new(),
        })
    }

    /// Process the resources directory into `build/resources/main`
    #[instrument(skip(self))]
    pub fn process(&self) -> Result<ProcessedResources> {
        let source_dir = &self.config.project.resources_dir;
        let output_dir = self.config.processed_resources_dir();
        info!(
            "Processing resources: {} -> {}",
            source_dir.display(),
            output_dir.display()
        );

        self.fs_utils
            .remove_dir_all_if_exists(&output_dir)
            .map_err(|e| HubError::file_system("clean", output_dir.clone(), e))?;
        self.fs_utils
            .create_dir_all(&output_dir)
            .map_err(|e| HubError::file_system("create", output_dir.clone(), e))?;

        let values = self.config.project.template_properties();
        let entries = self
            .fs_utils
            .walk(source_dir)
            .map_err(|e| HubError::file_system("walk", source_dir.clone(), e))?;

        let mut result = ProcessedResources {
            output_dir: output_dir.clone(),
            ..ProcessedResources::default()
        };

        for entry in entries {
            if !entry.is_file() {
                continue;
            }
            let relative = entry.strip_prefix(source_dir).map_err(|_| {
                HubError::validation(format!("{} escapes the resources dir", entry.display()))
            })?;
            let destination = output_dir.join(relative);

            if self.is_templated(&entry) {
                self.render_file(&entry, &destination, &values)?;
                result.templated.push(destination);
            } else {
                self.fs_utils
                    .copy_file(&entry, &destination)
                    .map_err(|e| HubError::file_system("copy", entry.clone(), e))?;
                result.copied += 1;
            }
        }

        info!(
            "Resources processed: {} copied, {} templated",
            result.copied,
            result.templated.len()
        );
        Ok(result)
    }

    fn is_templated(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                self.config
                    .project
                    .templated_resources
                    .iter()
                    .any(|t| t == name)
            })
    }

    fn render_file(&self, source: &Path, destination: &Path, values: &TemplateValues) -> Result<()> {
        debug!("Templating {}", source.display());
        let template = self
            .fs_utils
            .read_file_to_string(source)
            .map_err(|e| HubError::file_system("read", source.to_path_buf(), e))?;

        let rendered = self.renderer.render_resource(&template, values, source)?;

        self.fs_utils
            .write_file(destination, rendered)
            .map_err(|e| HubError::file_system("write", destination.to_path_buf(), e))
    }
}
