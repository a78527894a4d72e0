//! `META-INF/MANIFEST.MF` generation

use crate::config::Config;

/// Path of the manifest inside an archive
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Maximum line length in bytes before a continuation line
const MAX_LINE_BYTES: usize = 72;

/// Ordered main attributes of a jar manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarManifest {
    attributes: Vec<(String, String)>,
}

impl JarManifest {
    /// Empty manifest carrying only `Manifest-Version`
    pub fn new() -> Self {
        Self {
            attributes: vec![("Manifest-Version".to_string(), "1.0".to_string())],
        }
    }

    /// Manifest stamped with the project's specification and implementation
    /// attributes
    pub fn for_project(config: &Config) -> Self {
        let version = config.project.version();
        let mut manifest = Self::new();
        manifest.insert("Specification-Title", config.project.root_name());
        manifest.insert("Specification-Version", &version);
        manifest.insert("Implementation-Title", &config.project.name);
        manifest.insert("Implementation-Version", config.implementation_version());
        manifest
    }

    /// Set an attribute, replacing an existing value in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize with CRLF line endings and 72-byte line wrapping
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.attributes {
            write_wrapped(&mut out, &format!("{name}: {value}"));
        }
        out.push_str("\r\n");
        out
    }
}

impl Default for JarManifest {
    fn default() -> Self {
        Self::new()
    }
}

fn write_wrapped(out: &mut String, line: &str) {
    let mut rest = line;
    let mut limit = MAX_LINE_BYTES;
    loop {
        if rest.len() <= limit {
            out.push_str(rest);
            out.push_str("\r\n");
            return;
        }
        let mut split = limit;
        while !rest.is_char_boundary(split) {
            split -= 1;
        }
        out.push_str(&rest[..split]);
        out.push_str("\r\n ");
        rest = &rest[split..];
        // continuation lines lose one byte to the leading space
        limit = MAX_LINE_BYTES - 1;
    }
}
