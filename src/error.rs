//! Error types for packaging and world conversion
//!
//! Provides structured error handling with context and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the hub tooling
#[derive(Error, Debug)]
pub enum HubError {
    /// Errors raised while rendering a templated resource
    #[error("Template error: {message}")]
    Template {
        message: String,
        path: PathBuf,
        /// Placeholders that had no value
        missing: Vec<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Errors related to dependency resolution
    #[error("Dependency error: {message}")]
    Dependency {
        message: String,
        dependencies: Vec<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Errors related to archive assembly
    #[error("Archive error: {message}")]
    Archive {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// File system operation errors
    #[error("File system error: {operation} failed on {path}")]
    FileSystem {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed NBT payloads
    #[error("NBT error: {message}")]
    Nbt { message: String },

    /// Region file level failures
    #[error("Region error: {message}")]
    Region { message: String, path: PathBuf },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl HubError {
    /// Create a new template error for placeholders without a value
    pub fn template_missing<P: Into<PathBuf>>(path: P, missing: Vec<String>) -> Self {
        Self::Template {
            message: format!("unresolved placeholders: {}", missing.join(", ")),
            path: path.into(),
            missing,
            source: None,
        }
    }

    /// Create a new template error with an underlying cause
    pub fn template<P: Into<PathBuf>>(
        message: impl Into<String>,
        path: P,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Template {
            message: message.into(),
            path: path.into(),
            missing: Vec::new(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new dependency error
    pub fn dependency(message: impl Into<String>, dependencies: Vec<String>) -> Self {
        Self::Dependency {
            message: message.into(),
            dependencies,
            source: None,
        }
    }

    /// Create a new archive error
    pub fn archive<P: Into<PathBuf>>(message: impl Into<String>, path: P) -> Self {
        Self::Archive {
            message: message.into(),
            path: path.into(),
            source: None,
        }
    }

    /// Create a new archive error from a zip failure
    pub fn archive_zip<P: Into<PathBuf>>(
        message: impl Into<String>,
        path: P,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Archive {
            message: message.into(),
            path: path.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new file system error
    pub fn file_system<P: Into<PathBuf>>(
        operation: impl Into<String>,
        path: P,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new configuration error with an underlying cause
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new NBT error
    pub fn nbt(message: impl Into<String>) -> Self {
        Self::Nbt {
            message: message.into(),
        }
    }

    /// Create a new region error
    pub fn region<P: Into<PathBuf>>(message: impl Into<String>, path: P) -> Self {
        Self::Region {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, HubError>;
