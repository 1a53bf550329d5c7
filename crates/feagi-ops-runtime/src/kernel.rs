// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Native kernels: user code that writes outputs in place from input views

use feagi_ops_core::{HostView, HostViewMut, Result};
use std::fmt;
use std::sync::Arc;

/// A natively-compiled computation.
///
/// Kernels never allocate their outputs: the caller hands them zeroed,
/// correctly-shaped buffers derived from abstract evaluation, and the kernel
/// fills them. The same kernel runs on the eager path (views over owned
/// arrays) and behind a compiled trampoline (views over raw buffers).
pub trait Kernel: Send + Sync {
    /// Declared name, or `None` for anonymous kernels
    fn name(&self) -> Option<&str>;

    fn call(&self, outputs: &mut [HostViewMut<'_>], inputs: &[HostView<'_>]) -> Result<()>;
}

/// Closure-backed kernel
pub struct FnKernel<F> {
    name: Option<String>,
    func: F,
}

impl<F> Kernel for FnKernel<F>
where
    F: Fn(&mut [HostViewMut<'_>], &[HostView<'_>]) -> Result<()> + Send + Sync,
{
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn call(&self, outputs: &mut [HostViewMut<'_>], inputs: &[HostView<'_>]) -> Result<()> {
        (self.func)(outputs, inputs)
    }
}

impl<F> fmt::Debug for FnKernel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnKernel").field("name", &self.name).finish()
    }
}

/// Named kernel from a closure
pub fn kernel<F>(name: impl Into<String>, func: F) -> Arc<dyn Kernel>
where
    F: Fn(&mut [HostViewMut<'_>], &[HostView<'_>]) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnKernel {
        name: Some(name.into()),
        func,
    })
}

/// Anonymous kernel; the registry generates a unique id for it
pub fn anonymous_kernel<F>(func: F) -> Arc<dyn Kernel>
where
    F: Fn(&mut [HostViewMut<'_>], &[HostView<'_>]) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnKernel { name: None, func })
}

/// Identity of a kernel object (data pointer, ignoring the vtable)
pub(crate) fn kernel_identity(kernel: &Arc<dyn Kernel>) -> *const () {
    Arc::as_ptr(kernel) as *const ()
}
