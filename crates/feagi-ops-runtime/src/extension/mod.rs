// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Extension Loader
//!
//! Optional native acceleration libraries are loaded lazily per
//! `(name, platform)`, version-gated against an [`ExtensionSpec`], and their
//! exported kernels registered as custom-call targets. A handle is cached
//! only once every step succeeded; a failed attempt leaves nothing behind, so
//! the next request tries again (a library built after startup is picked up
//! without restarting).

mod loader;
mod source;

pub use loader::ExtensionLoader;
#[cfg(feature = "linked-accel")]
pub use source::accel_library;
pub use source::{DylibLoader, ExtensionSource, LinkedExtensions, LinkedLibrary, LoadFailure, LoadedLibrary};

use crate::targets::NativeHandle;
use feagi_ops_core::{ExtensionVersion, Platform, Result};

/// Library name of the bundled acceleration extension
pub const ACCEL_EXTENSION: &str = "feagi_ops_accel";

/// What the runtime accepts for one optional library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSpec {
    pub name: String,
    pub min_version: ExtensionVersion,
    pub install_hint: String,
}

impl ExtensionSpec {
    pub fn new(name: impl Into<String>, min_version: &str, install_hint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            min_version: min_version.parse()?,
            install_hint: install_hint.into(),
        })
    }

    /// Spec of the bundled acceleration library
    pub fn accel() -> Self {
        Self {
            name: ACCEL_EXTENSION.to_string(),
            min_version: ExtensionVersion::new(0, 1, 0),
            install_hint: "cargo build -p feagi-ops-accel --release".to_string(),
        }
    }
}

/// Fully loaded, version-checked and registered extension
#[derive(Debug)]
pub struct ExtensionHandle {
    name: String,
    version: ExtensionVersion,
    platform: Platform,
    symbols: Vec<(String, NativeHandle)>,
    registered: bool,
}

impl ExtensionHandle {
    pub(crate) fn new(
        name: String,
        version: ExtensionVersion,
        platform: Platform,
        mut symbols: Vec<(String, NativeHandle)>,
    ) -> Self {
        symbols.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            name,
            version,
            platform,
            symbols,
            registered: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> ExtensionVersion {
        self.version
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Sorted names of the exported targets
    pub fn symbol_names(&self) -> Vec<&str> {
        self.symbols.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn symbol(&self, name: &str) -> Option<&NativeHandle> {
        self.symbols
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| &self.symbols[i].1)
    }

    pub fn has_symbol(&self, name: &str) -> bool {
        self.symbol(name).is_some()
    }

    /// Whether the exported targets are bound in the target registry
    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

/// Outcome of capability negotiation for one extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Loaded {
        version: ExtensionVersion,
        symbols: Vec<String>,
    },
    Unavailable {
        reason: String,
    },
}

impl Capability {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Capability::Loaded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_parses_min_version() {
        let spec = ExtensionSpec::new("x", "1.2", "build it").unwrap();
        assert_eq!(spec.min_version, ExtensionVersion::new(1, 2, 0));
        assert!(ExtensionSpec::new("x", "one", "").is_err());
        assert_eq!(ExtensionSpec::accel().name, ACCEL_EXTENSION);
    }
}
