//! Packaging core
//!
//! Contains the logic for resolving dependencies, templating resources and
//! assembling the standard, sources and bundled archives.

pub mod archive;
pub mod dependencies;
pub mod jar_manifest;
pub mod packager;
pub mod template;

pub use archive::{ArchiveSummary, ArchiveWriter};
pub use dependencies::{Coordinates, DependencyResolver, ResolvedDependencies};
pub use jar_manifest::JarManifest;
pub use packager::{PackageReport, Packager};
pub use template::{ResourceProcessor, TemplateRenderer};
