// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Where extension libraries come from: shared libraries found on disk, or
//! libraries linked into the current binary. Both expose the same two
//! symbols (`<name>_version`, `<name>_registrations`) and are read the same
//! way.

use crate::targets::NativeHandle;
use feagi_ops_core::abi::{registrations_symbol, version_symbol};
use feagi_ops_core::{ExportedTarget, Platform, RegistrationsFn, VersionFn, CUSTOM_CALL_TARGET_TAG};
use libloading::Library;
use std::any::Any;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Why a source could not provide a library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// The source has no library with that name; other sources may
    NotFound(String),
    /// A library was found but could not be used
    Broken(String),
}

/// Version string and target table read from a library
pub struct LoadedLibrary {
    pub version: String,
    pub targets: Vec<(String, NativeHandle)>,
    /// Path or label the library was read from, for logs
    pub origin: String,
}

pub trait ExtensionSource: Send + Sync {
    /// Short description used in error messages
    fn label(&self) -> String;

    fn load(&self, name: &str, platform: Platform) -> Result<LoadedLibrary, LoadFailure>;
}

/// Read the version and the target table for `platform`.
///
/// # Safety
/// Both functions must follow the [`VersionFn`] / [`RegistrationsFn`]
/// contracts, and every table entry must stay valid while `owner` (or the
/// process, when `None`) is alive.
unsafe fn read_library(
    version_fn: VersionFn,
    registrations_fn: RegistrationsFn,
    platform: Platform,
    owner: Option<Arc<dyn Any + Send + Sync>>,
    origin: String,
) -> Result<LoadedLibrary, LoadFailure> {
    let version_ptr = version_fn();
    if version_ptr.is_null() {
        return Err(LoadFailure::Broken(format!("{} reported a null version", origin)));
    }
    let version = CStr::from_ptr(version_ptr)
        .to_str()
        .map_err(|e| LoadFailure::Broken(format!("{} reported a non UTF-8 version: {}", origin, e)))?
        .to_string();

    let mut count = 0usize;
    let table = registrations_fn(platform.code(), &mut count);
    let entries: &[ExportedTarget] = if table.is_null() || count == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(table, count)
    };

    let mut targets = Vec::with_capacity(entries.len());
    for entry in entries {
        let name = entry
            .name()
            .map_err(|e| LoadFailure::Broken(format!("{}: {}", origin, e)))?
            .to_string();
        let handle = NativeHandle::from_raw(entry.entry, std::ptr::null(), owner.clone(), CUSTOM_CALL_TARGET_TAG);
        targets.push((name, handle));
    }

    debug!(
        target: "feagi-ops-runtime",
        "read {} ({}): {} targets for {}",
        origin,
        version,
        targets.len(),
        platform
    );
    Ok(LoadedLibrary {
        version,
        targets,
        origin,
    })
}

/// Extension compiled into the current binary
#[derive(Clone, Copy)]
pub struct LinkedLibrary {
    name: &'static str,
    version: VersionFn,
    registrations: RegistrationsFn,
}

impl LinkedLibrary {
    /// # Safety
    /// `version` and `registrations` must follow the extension symbol
    /// contracts and return `'static` data.
    pub unsafe fn new(name: &'static str, version: VersionFn, registrations: RegistrationsFn) -> Self {
        Self {
            name,
            version,
            registrations,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// The acceleration library linked in through the `linked-accel` feature
#[cfg(feature = "linked-accel")]
pub fn accel_library() -> LinkedLibrary {
    // SAFETY: feagi-ops-accel exports both symbols with the ABI signatures and static tables.
    unsafe {
        LinkedLibrary::new(
            feagi_ops_accel::EXTENSION_NAME,
            feagi_ops_accel::feagi_ops_accel_version,
            feagi_ops_accel::feagi_ops_accel_registrations,
        )
    }
}

/// In-process libraries, looked up by name
#[derive(Clone, Default)]
pub struct LinkedExtensions {
    libraries: Vec<LinkedLibrary>,
}

impl LinkedExtensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, library: LinkedLibrary) -> Self {
        self.libraries.push(library);
        self
    }

    /// Libraries bundled by enabled cargo features
    pub fn builtin() -> Self {
        #[allow(unused_mut)]
        let mut linked = Self::new();
        #[cfg(feature = "linked-accel")]
        {
            linked = linked.with(accel_library());
        }
        linked
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

impl ExtensionSource for LinkedExtensions {
    fn label(&self) -> String {
        "linked".to_string()
    }

    fn load(&self, name: &str, platform: Platform) -> Result<LoadedLibrary, LoadFailure> {
        let library = self
            .libraries
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| LoadFailure::NotFound(format!("{} is not linked into this binary", name)))?;
        // SAFETY: guaranteed by `LinkedLibrary::new`.
        unsafe {
            read_library(
                library.version,
                library.registrations,
                platform,
                None,
                format!("linked:{}", name),
            )
        }
    }
}

/// Shared libraries searched for in a list of directories
#[derive(Debug, Clone, Default)]
pub struct DylibLoader {
    search_paths: Vec<PathBuf>,
}

impl DylibLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Platform file name of the library, e.g. `libfeagi_ops_accel.so`
    pub fn file_name(name: &str) -> PathBuf {
        PathBuf::from(libloading::library_filename(name))
    }

    fn open(path: &Path, name: &str, platform: Platform) -> Result<LoadedLibrary, LoadFailure> {
        let origin = path.display().to_string();
        // SAFETY: running the library's initializers is the point of loading it.
        let lib = unsafe { Library::new(path) }
            .map_err(|e| LoadFailure::Broken(format!("failed to open {}: {}", origin, e)))?;

        let version: VersionFn = load_symbol(&lib, &version_symbol(name), &origin)?;
        let registrations: RegistrationsFn = load_symbol(&lib, &registrations_symbol(name), &origin)?;

        let owner: Arc<dyn Any + Send + Sync> = Arc::new(lib);
        // SAFETY: symbol types are the extension ABI; the library stays mapped
        // while any handle holds `owner`.
        unsafe { read_library(version, registrations, platform, Some(owner), origin) }
    }
}

fn load_symbol<T: Copy>(lib: &Library, symbol: &str, origin: &str) -> Result<T, LoadFailure> {
    // SAFETY: the symbol type is fixed by the extension ABI.
    let loaded = unsafe { lib.get::<T>(symbol.as_bytes()) }
        .map_err(|e| LoadFailure::Broken(format!("{} does not export {}: {}", origin, symbol, e)))?;
    Ok(*loaded)
}

impl ExtensionSource for DylibLoader {
    fn label(&self) -> String {
        format!("dylib search path {:?}", self.search_paths)
    }

    fn load(&self, name: &str, platform: Platform) -> Result<LoadedLibrary, LoadFailure> {
        let file_name = Self::file_name(name);
        for dir in &self.search_paths {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                return Self::open(&candidate, name, platform);
            }
        }
        Err(LoadFailure::NotFound(format!(
            "{} not found in {} search paths",
            file_name.display(),
            self.search_paths.len()
        )))
    }
}
