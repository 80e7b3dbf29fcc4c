//! Reconciling built libraries with the manifest
//!
//! A manifest without a `code` section gets one native entry per built
//! library. Declared `code` sections are left as written.

use crate::core::{
    builder::{BuildOutput, TargetArch},
    manifest::{CodeEntry, Manifest},
};
use std::fmt;
use tracing::{debug, info, instrument};

/// A library that is missing from one architecture's build output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingLibrary {
    pub library: String,
    pub target: TargetArch,
}

impl fmt::Display for MissingLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Library \"{}\" is not compiled for the {} architecture",
            self.library,
            self.target.label()
        )
    }
}

/// Outcome of reconciling build outputs with the manifest
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Entries appended to a previously absent `code` section
    pub synthesized: Vec<CodeEntry>,
    /// Libraries not built for every architecture
    pub missing: Vec<MissingLibrary>,
}

/// Strip the `lib` prefix and `.so` suffix when both are present
pub fn short_name(library: &str) -> &str {
    library
        .strip_prefix("lib")
        .and_then(|rest| rest.strip_suffix(".so"))
        .unwrap_or(library)
}

/// Every distinct library name, starting with the first non-empty output
fn distinct_libraries(outputs: &[BuildOutput]) -> Vec<&str> {
    let primary = outputs
        .iter()
        .position(|output| !output.libraries.is_empty())
        .unwrap_or(0);

    let ordered = outputs
        .get(primary)
        .into_iter()
        .chain(outputs.iter().enumerate().filter(|(i, _)| *i != primary).map(|(_, o)| o));

    let mut libraries: Vec<&str> = Vec::new();
    for output in ordered {
        for library in &output.libraries {
            if !libraries.contains(&library.as_str()) {
                libraries.push(library);
            }
        }
    }
    libraries
}

/// Fill in the manifest's `code` section from the built libraries if it has none
#[instrument(skip_all)]
pub fn reconcile(manifest: &mut Manifest, outputs: &[BuildOutput]) -> Reconciliation {
    if manifest.code.is_some() {
        // TODO: verify every declared native library was built for each target
        debug!(
            "Keeping declared code section, native libraries: {:?}",
            manifest.native_libraries()
        );
        return Reconciliation::default();
    }

    let mut reconciliation = Reconciliation::default();

    for library in distinct_libraries(outputs) {
        for output in outputs.iter().filter(|output| !output.contains(library)) {
            reconciliation.missing.push(MissingLibrary {
                library: library.to_string(),
                target: output.target,
            });
        }
        reconciliation.synthesized.push(CodeEntry::native(short_name(library)));
    }

    info!(
        "Generated code section with {} native entr{}",
        reconciliation.synthesized.len(),
        if reconciliation.synthesized.len() == 1 { "y" } else { "ies" }
    );
    manifest.code = Some(reconciliation.synthesized.clone());
    reconciliation
}
