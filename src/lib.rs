//! # TML Package Builder
//!
//! Builds the native part of a TML package with CMake for armeabi-v7a and
//! x86, then bundles the libraries, the sanitized package.yaml and the
//! package's asset directories into a single `.tbp` archive.
//!
//! ## Example
//!
//! ```no_run
//! use tml_build::core::ManifestLoader;
//!
//! let loader = ManifestLoader::new()?;
//! let loaded = loader.load("package.yaml")?;
//! println!("Package: {} {}", loaded.manifest.id, loaded.manifest.version);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod utils;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How run output is reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Include debug-level diagnostics
    pub debug: bool,
    /// Emit ANSI colors
    pub color: bool,
}

impl LogConfig {
    pub const fn new(debug: bool, color: bool) -> Self {
        Self { debug, color }
    }
}

/// Initialize logging to stdout according to `config`
pub fn setup_logging(config: LogConfig) -> Result<()> {
    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(config.color)
                .with_target(false)
                .with_level(true)
                .without_time()
                .compact(),
        )
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
