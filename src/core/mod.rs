//! Core functionality for package building
//!
//! Contains the manifest loader, the per-architecture native builder, the
//! reconciliation of built libraries with the manifest, and the archive
//! assembler.

pub mod builder;
pub mod manifest;
pub mod package;
pub mod reconcile;

pub use builder::{BuildOutput, NativeBuilder, TargetArch};
pub use manifest::{CodeEntry, LoadedManifest, Manifest, ManifestLoader};
pub use package::{PackageAssembler, PackageSummary};
pub use reconcile::{Reconciliation, reconcile};
