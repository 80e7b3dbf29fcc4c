//! The build pipeline behind the CLI

use crate::{
    config::Config,
    core::{ManifestLoader, NativeBuilder, PackageAssembler, PackageSummary, reconcile},
    utils::fs::FileSystemUtils,
};
use anyhow::Context;
use tracing::{info, instrument, warn};

/// Load the manifest, build every target, and write the package.
///
/// Stops at the first fatal error; recoverable problems are logged as
/// warnings and the run continues.
#[instrument(skip(config))]
pub fn execute(config: &Config) -> anyhow::Result<PackageSummary> {
    FileSystemUtils::new()
        .create_dir_all(&config.build.build_dir)
        .with_context(|| {
            format!(
                "Failed to create build directory {}",
                config.build.build_dir.display()
            )
        })?;

    let loaded = ManifestLoader::new()?.load(config.manifest_path())?;
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }
    let mut manifest = loaded.manifest;

    config.check_toolchain()?;

    let builder = NativeBuilder::new(config.clone());
    builder.check_tool()?;
    let outputs = builder.build_all()?;

    let reconciliation = reconcile(&mut manifest, &outputs);
    for missing in &reconciliation.missing {
        warn!("{}", missing);
    }

    info!("- Packaging");
    let summary = PackageAssembler::new(config.clone())
        .assemble(&manifest, &outputs)
        .context("Failed to write package")?;

    info!("{}", summary);
    Ok(summary)
}
