//! # HytalesHub
//!
//! Build and conversion tooling for the HytalesHub converter mod.
//!
//! ## Features
//!
//! - Manifest templating with strict placeholder checking
//! - Dependency resolution against local Maven-layout repositories
//! - Standard, sources and bundled (fat) archive assembly with ZIP64
//! - Minecraft region extraction, block mapping, conversion and spawning
//!
//! ## Example
//!
//! ```no_run
//! use hytaleshub::{config::Config, core::Packager};
//!
//! let report = Packager::new(Config::default()).package()?;
//! println!("Bundle: {}", report.bundle);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod utils;
pub mod world;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging with appropriate verbosity
pub fn setup_logging(debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
