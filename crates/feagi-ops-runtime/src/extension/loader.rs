// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use super::source::{ExtensionSource, LoadFailure, LoadedLibrary};
use super::{Capability, ExtensionHandle, ExtensionSpec};
use crate::targets::TargetRegistry;
use ahash::AHashMap;
use feagi_ops_core::{CapabilityMissing, ExtensionVersion, OpsError, Platform, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

type ExtensionKey = (String, Platform);

/// Lazily loads, version-gates and registers optional native libraries.
///
/// Concurrent first requests for one key serialize on a per-key slot, so a
/// library is loaded and its targets registered at most once. Later requests
/// hit the cache under a read lock.
#[derive(Default)]
pub struct ExtensionLoader {
    sources: RwLock<Vec<Arc<dyn ExtensionSource>>>,
    specs: RwLock<AHashMap<String, ExtensionSpec>>,
    loaded: RwLock<AHashMap<ExtensionKey, Arc<ExtensionHandle>>>,
    init_slots: Mutex<AHashMap<ExtensionKey, Arc<Mutex<()>>>>,
}

impl ExtensionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources are tried in the order they were added
    pub fn add_source(&self, source: Arc<dyn ExtensionSource>) {
        debug!(target: "feagi-ops-runtime", "extension source added: {}", source.label());
        self.sources.write().push(source);
    }

    /// Add or replace the spec for `spec.name`
    pub fn register_spec(&self, spec: ExtensionSpec) {
        self.specs.write().insert(spec.name.clone(), spec);
    }

    pub fn spec(&self, name: &str) -> Option<ExtensionSpec> {
        self.specs.read().get(name).cloned()
    }

    /// Load `name` for `platform`, registering its targets on first success.
    ///
    /// # Errors
    /// - `Configuration` if no spec is known for `name`
    /// - `CapabilityMissing` if no source has the library, it cannot be
    ///   used, its version is below the minimum, or it exports nothing for
    ///   `platform`
    /// - `TargetCollision` if an exported name is already bound to another handle
    pub fn require(&self, name: &str, platform: Platform, targets: &TargetRegistry) -> Result<Arc<ExtensionHandle>> {
        let key: ExtensionKey = (name.to_string(), platform);
        if let Some(handle) = self.loaded.read().get(&key) {
            return Ok(Arc::clone(handle));
        }

        let spec = self.spec(name).ok_or_else(|| {
            OpsError::Configuration(format!("no extension spec registered for \"{}\"", name))
        })?;

        let slot = Arc::clone(self.init_slots.lock().entry(key.clone()).or_default());
        let _guard = slot.lock();

        // Another thread may have finished while we waited for the slot.
        if let Some(handle) = self.loaded.read().get(&key) {
            return Ok(Arc::clone(handle));
        }

        match self.load_and_register(&spec, platform, targets) {
            Ok(handle) => {
                let handle = Arc::new(handle);
                self.loaded.write().insert(key, Arc::clone(&handle));
                info!(
                    target: "feagi-ops-runtime",
                    "✅ extension {} {} loaded for {} ({} targets)",
                    spec.name,
                    handle.version(),
                    platform,
                    handle.symbol_names().len()
                );
                Ok(handle)
            }
            Err(e) => {
                warn!(
                    target: "feagi-ops-runtime",
                    "extension {} unavailable on {}: {}",
                    spec.name,
                    platform,
                    e
                );
                Err(e)
            }
        }
    }

    fn find_library(&self, spec: &ExtensionSpec, platform: Platform) -> Result<LoadedLibrary> {
        let sources: Vec<Arc<dyn ExtensionSource>> = self.sources.read().clone();
        let mut not_found = Vec::with_capacity(sources.len());
        for source in &sources {
            match source.load(&spec.name, platform) {
                Ok(library) => return Ok(library),
                Err(LoadFailure::NotFound(why)) => not_found.push(format!("{}: {}", source.label(), why)),
                Err(LoadFailure::Broken(why)) => {
                    return Err(capability_missing(spec, platform, None, why));
                }
            }
        }
        let reason = if not_found.is_empty() {
            "no extension sources are configured".to_string()
        } else {
            format!("library not found ({})", not_found.join("; "))
        };
        Err(capability_missing(spec, platform, None, reason))
    }

    fn load_and_register(
        &self,
        spec: &ExtensionSpec,
        platform: Platform,
        targets: &TargetRegistry,
    ) -> Result<ExtensionHandle> {
        let library = self.find_library(spec, platform)?;
        let found = Some(library.version.clone());

        let version: ExtensionVersion = library.version.parse().map_err(|_| {
            capability_missing(
                spec,
                platform,
                found.clone(),
                format!("{} reported an unparsable version", library.origin),
            )
        })?;
        if !version.satisfies(&spec.min_version) {
            return Err(capability_missing(
                spec,
                platform,
                found,
                format!("version {} is older than the minimum {}", version, spec.min_version),
            ));
        }
        if library.targets.is_empty() {
            return Err(capability_missing(
                spec,
                platform,
                found,
                format!("{} exports no targets for {}", library.origin, platform),
            ));
        }

        let added = targets.register_all(library.targets.clone(), platform)?;
        debug!(
            target: "feagi-ops-runtime",
            "{} from {}: {} new targets",
            spec.name,
            library.origin,
            added
        );
        Ok(ExtensionHandle::new(spec.name.clone(), version, platform, library.targets))
    }

    /// Negotiate without failing: loads on first call like [`Self::require`]
    pub fn probe(&self, name: &str, platform: Platform, targets: &TargetRegistry) -> Capability {
        match self.require(name, platform, targets) {
            Ok(handle) => Capability::Loaded {
                version: handle.version(),
                symbols: handle.symbol_names().into_iter().map(String::from).collect(),
            },
            Err(e) => Capability::Unavailable { reason: e.to_string() },
        }
    }

    /// Whether `name` is currently loaded for `platform` (never triggers a load)
    pub fn is_available(&self, name: &str, platform: Platform) -> bool {
        self.loaded.read().contains_key(&(name.to_string(), platform))
    }

    /// Loaded handles, sorted by name then platform
    pub fn loaded(&self) -> Vec<Arc<ExtensionHandle>> {
        let mut handles: Vec<Arc<ExtensionHandle>> = self.loaded.read().values().cloned().collect();
        handles.sort_by(|a, b| (a.name(), a.platform()).cmp(&(b.name(), b.platform())));
        handles
    }

    /// Forget loaded handles; specs and sources stay
    pub fn clear(&self) {
        self.loaded.write().clear();
        self.init_slots.lock().clear();
    }
}

fn capability_missing(
    spec: &ExtensionSpec,
    platform: Platform,
    found_version: Option<String>,
    reason: String,
) -> OpsError {
    OpsError::CapabilityMissing(CapabilityMissing {
        extension: spec.name.clone(),
        platform,
        minimum_version: spec.min_version.to_string(),
        found_version,
        reason,
        remediation: spec.install_hint.clone(),
    })
}
