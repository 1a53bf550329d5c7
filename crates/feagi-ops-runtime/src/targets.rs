// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Backend Target Registrar
//!
//! Per-platform namespace of custom-call targets. A name is bound to one
//! handle for the life of the registry: re-registering the same handle is a
//! no-op, a different handle is a [`OpsError::TargetCollision`].

use ahash::AHashMap;
use feagi_ops_core::{
    check_status, ArrayDesc, HostArray, OpsError, Platform, RawArgs, Result, TargetFn,
    CUSTOM_CALL_TARGET_TAG,
};
use parking_lot::RwLock;
use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Opaque, tagged reference to a callable target.
///
/// Holds the entry point, the context pointer passed as its first argument,
/// and an owner that keeps whatever the pointer refers to (trampoline
/// context, loaded library) alive for as long as any clone of the handle.
#[derive(Clone)]
pub struct NativeHandle {
    entry: TargetFn,
    context: usize,
    _owner: Option<Arc<dyn Any + Send + Sync>>,
    tag: Arc<str>,
}

impl NativeHandle {
    /// Wrap a raw entry point.
    ///
    /// # Safety
    /// `entry` must follow the [`TargetFn`] contract for the arrays it will be
    /// called with, and `context` must stay valid while `owner` (or, if
    /// `None`, the process) is alive.
    pub unsafe fn from_raw(
        entry: TargetFn,
        context: *const c_void,
        owner: Option<Arc<dyn Any + Send + Sync>>,
        tag: &str,
    ) -> Self {
        Self {
            entry,
            context: context as usize,
            _owner: owner,
            tag: Arc::from(tag),
        }
    }

    /// Handle carrying an `Arc` context, tagged for the custom-call loader
    pub(crate) fn with_context<C: Send + Sync + 'static>(entry: TargetFn, context: Arc<C>) -> Self {
        let ptr = Arc::as_ptr(&context) as *const c_void;
        let owner: Arc<dyn Any + Send + Sync> = context;
        // SAFETY: the context Arc is stored as the owner, so `ptr` outlives every clone.
        unsafe { Self::from_raw(entry, ptr, Some(owner), CUSTOM_CALL_TARGET_TAG) }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Same entry point and context
    pub fn same_target(&self, other: &NativeHandle) -> bool {
        self.entry as usize == other.entry as usize && self.context == other.context
    }

    /// Invoke the target on host arrays, writing `outputs` in place
    pub fn call<'a, I>(&self, target_name: &str, outputs: &mut [HostArray], inputs: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a HostArray>,
    {
        let ins = RawArgs::inputs(inputs)?;
        let outs = RawArgs::outputs(outputs)?;
        // SAFETY: descriptors borrow live, contiguous arrays for the duration of the
        // call, and the owner keeps the context alive.
        let code = unsafe {
            (self.entry)(
                self.context as *const c_void,
                outs.as_ptr(),
                outs.len(),
                ins.as_ptr(),
                ins.len(),
            )
        };
        check_status(code, target_name)
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("entry", &(self.entry as usize as *const c_void))
            .field("context", &(self.context as *const c_void))
            .field("tag", &self.tag)
            .finish()
    }
}

/// Compiled target for one (operator, platform, input signature)
#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub target_name: String,
    pub handle: NativeHandle,
    pub input_signature: Vec<ArrayDesc>,
    pub output_descs: Vec<ArrayDesc>,
}

/// Process-scoped custom-call namespaces, one per platform
#[derive(Default)]
pub struct TargetRegistry {
    namespaces: RwLock<AHashMap<Platform, AHashMap<String, NativeHandle>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_tag(handle: &NativeHandle) -> Result<()> {
        if handle.tag() != CUSTOM_CALL_TARGET_TAG {
            return Err(OpsError::InvalidTargetHandle {
                expected: CUSTOM_CALL_TARGET_TAG.to_string(),
                actual: handle.tag().to_string(),
            });
        }
        Ok(())
    }

    /// Bind `name` to `handle` in the platform's namespace
    pub fn register_target(&self, name: &str, handle: NativeHandle, platform: Platform) -> Result<()> {
        self.register_all(vec![(name.to_string(), handle)], platform)
            .map(|_| ())
    }

    /// Bind several targets at once.
    ///
    /// Either every entry is bound (or already bound to the same handle) or
    /// none is: on a collision the namespace is left untouched. Returns the
    /// number of newly bound names.
    pub fn register_all(&self, entries: Vec<(String, NativeHandle)>, platform: Platform) -> Result<usize> {
        for (_, handle) in &entries {
            Self::check_tag(handle)?;
        }

        let mut namespaces = self.namespaces.write();
        let namespace = namespaces.entry(platform).or_default();

        let mut fresh = Vec::with_capacity(entries.len());
        for (name, handle) in entries {
            let existing = namespace
                .get(&name)
                .or_else(|| fresh.iter().find(|(n, _)| *n == name).map(|(_, h)| h));
            match existing {
                Some(bound) if bound.same_target(&handle) => {
                    debug!(target: "feagi-ops-runtime", "target {} already bound on {}", name, platform);
                }
                Some(_) => return Err(OpsError::TargetCollision { name, platform }),
                None => fresh.push((name, handle)),
            }
        }

        let added = fresh.len();
        for (name, handle) in fresh {
            info!(target: "feagi-ops-runtime", "registered custom-call target {} on {}", name, platform);
            namespace.insert(name, handle);
        }
        Ok(added)
    }

    pub fn lookup(&self, name: &str, platform: Platform) -> Option<NativeHandle> {
        self.namespaces
            .read()
            .get(&platform)
            .and_then(|ns| ns.get(name))
            .cloned()
    }

    pub fn contains(&self, name: &str, platform: Platform) -> bool {
        self.lookup(name, platform).is_some()
    }

    /// Sorted target names bound on `platform`
    pub fn names(&self, platform: Platform) -> Vec<String> {
        let mut names: Vec<String> = self
            .namespaces
            .read()
            .get(&platform)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn len(&self, platform: Platform) -> usize {
        self.namespaces.read().get(&platform).map_or(0, |ns| ns.len())
    }

    pub fn clear(&self) {
        self.namespaces.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feagi_ops_core::{status, RawArray};

    unsafe extern "C" fn ok_target(
        _ctx: *const c_void,
        _outputs: *const RawArray,
        _num_outputs: usize,
        _inputs: *const RawArray,
        _num_inputs: usize,
    ) -> i32 {
        status::OK
    }

    unsafe extern "C" fn failing_target(
        _ctx: *const c_void,
        _outputs: *const RawArray,
        _num_outputs: usize,
        _inputs: *const RawArray,
        _num_inputs: usize,
    ) -> i32 {
        status::KERNEL_ERROR
    }

    fn handle(entry: TargetFn) -> NativeHandle {
        unsafe { NativeHandle::from_raw(entry, std::ptr::null(), None, CUSTOM_CALL_TARGET_TAG) }
    }

    #[test]
    fn test_same_handle_is_idempotent() {
        let registry = TargetRegistry::new();
        registry.register_target("a", handle(ok_target), Platform::Cpu).unwrap();
        registry.register_target("a", handle(ok_target), Platform::Cpu).unwrap();
        assert_eq!(registry.len(Platform::Cpu), 1);
    }

    #[test]
    fn test_different_handle_collides() {
        let registry = TargetRegistry::new();
        registry.register_target("a", handle(ok_target), Platform::Cpu).unwrap();
        let err = registry
            .register_target("a", handle(failing_target), Platform::Cpu)
            .unwrap_err();
        assert!(matches!(err, OpsError::TargetCollision { ref name, platform: Platform::Cpu } if name == "a"));
        // Namespaces are per platform.
        registry.register_target("a", handle(failing_target), Platform::Gpu).unwrap();
    }

    #[test]
    fn test_wrong_tag_is_rejected() {
        let registry = TargetRegistry::new();
        let bad = unsafe { NativeHandle::from_raw(ok_target, std::ptr::null(), None, "xla._CUSTOM_CALL_TARGET") };
        assert!(matches!(
            registry.register_target("a", bad, Platform::Cpu),
            Err(OpsError::InvalidTargetHandle { .. })
        ));
        assert_eq!(registry.len(Platform::Cpu), 0);
    }

    #[test]
    fn test_register_all_rolls_back_on_collision() {
        let registry = TargetRegistry::new();
        registry.register_target("b", handle(ok_target), Platform::Cpu).unwrap();
        let result = registry.register_all(
            vec![
                ("a".to_string(), handle(ok_target)),
                ("b".to_string(), handle(failing_target)),
            ],
            Platform::Cpu,
        );
        assert!(result.is_err());
        assert_eq!(registry.names(Platform::Cpu), vec!["b".to_string()]);
    }

    #[test]
    fn test_register_all_rejects_conflicting_duplicates_within_batch() {
        let registry = TargetRegistry::new();
        let result = registry.register_all(
            vec![
                ("a".to_string(), handle(ok_target)),
                ("a".to_string(), handle(failing_target)),
            ],
            Platform::Cpu,
        );
        assert!(matches!(result, Err(OpsError::TargetCollision { .. })));
        assert_eq!(registry.len(Platform::Cpu), 0);
    }

    #[test]
    fn test_call_maps_status_to_result() {
        let mut outs: Vec<HostArray> = vec![];
        assert!(handle(ok_target).call("ok", &mut outs, &[]).is_ok());
        let err = handle(failing_target).call("bad", &mut outs, &[]).unwrap_err();
        assert!(matches!(err, OpsError::Execution(_)));
    }
}
