// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kernel Trampolines
//!
//! A compiled target for a user kernel is one generic `extern "C"` entry
//! point plus a context specialized to a single input signature. The context
//! records the static input and output descriptors; at call time the
//! trampoline checks the incoming `RawArray`s against them, builds typed
//! views, and runs the kernel. Panics and kernel errors become status codes
//! and never unwind across the C boundary.
//!
//! Set `FEAGI_OPS_TRACE_KERNELS=1` to log every trampoline call.

use crate::abstract_eval::describe;
use crate::kernel::Kernel;
use crate::targets::NativeHandle;
use feagi_ops_core::abi::raw_slice;
use feagi_ops_core::{status, ArrayDesc, HostView, HostViewMut, OpsError, Platform, RawArray, Result};
use std::ffi::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use tracing::{trace, warn};

fn trace_kernels_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("FEAGI_OPS_TRACE_KERNELS")
            .ok()
            .as_deref()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

/// Signature-specialized state behind a compiled target
pub(crate) struct TrampolineContext {
    target_name: String,
    kernel: Arc<dyn Kernel>,
    inputs: Vec<ArrayDesc>,
    outputs: Vec<ArrayDesc>,
}

/// Target name for an operator specialized to an input signature
pub fn target_name(op_id: &str, inputs: &[ArrayDesc]) -> String {
    format!("{}{}", op_id, describe(inputs))
}

/// Build a callable target for `kernel` at one input signature.
///
/// # Errors
/// - `UnsupportedPlatform` for any platform other than CPU
/// - `Compilation` when the signature has no outputs or a buffer size overflows
pub fn compile(
    target_name: &str,
    kernel: Arc<dyn Kernel>,
    platform: Platform,
    inputs: &[ArrayDesc],
    outputs: &[ArrayDesc],
) -> Result<NativeHandle> {
    if platform != Platform::Cpu {
        return Err(OpsError::UnsupportedPlatform(format!(
            "kernel trampolines can only be compiled for cpu, not {}",
            platform
        )));
    }
    if outputs.is_empty() {
        return Err(OpsError::Compilation(format!(
            "{}: a target must produce at least one output",
            target_name
        )));
    }
    for desc in inputs.iter().chain(outputs.iter()) {
        desc.num_bytes()
            .map_err(|e| OpsError::Compilation(format!("{}: {}", target_name, e)))?;
    }

    let context = Arc::new(TrampolineContext {
        target_name: target_name.to_string(),
        kernel,
        inputs: inputs.to_vec(),
        outputs: outputs.to_vec(),
    });
    Ok(NativeHandle::with_context(kernel_trampoline, context))
}

fn matches_signature(raws: &[RawArray], expected: &[ArrayDesc]) -> bool {
    raws.iter().zip(expected.iter()).all(|(raw, desc)| {
        // SAFETY: descriptors come from the caller of the target, who guarantees
        // shape pointers are valid for `ndim` entries.
        matches!(unsafe { raw.describe() }, Ok(actual) if actual == *desc)
    })
}

unsafe extern "C" fn kernel_trampoline(
    context: *const c_void,
    outputs: *const RawArray,
    num_outputs: usize,
    inputs: *const RawArray,
    num_inputs: usize,
) -> i32 {
    if context.is_null() {
        return status::INVALID_ARGUMENT;
    }
    // SAFETY: handles built by `compile` pass a pointer to their own live context.
    let ctx = &*(context as *const TrampolineContext);

    if num_outputs != ctx.outputs.len() || num_inputs != ctx.inputs.len() {
        return status::ARITY_MISMATCH;
    }
    let outs = raw_slice(outputs, num_outputs);
    let ins = raw_slice(inputs, num_inputs);
    if !matches_signature(ins, &ctx.inputs) || !matches_signature(outs, &ctx.outputs) {
        return status::SIGNATURE_MISMATCH;
    }

    let in_views: Result<Vec<HostView<'_>>> = ins.iter().map(|r| r.host_view()).collect();
    let out_views: Result<Vec<HostViewMut<'_>>> = outs.iter().map(|r| r.host_view_mut()).collect();
    let (in_views, mut out_views) = match (in_views, out_views) {
        (Ok(i), Ok(o)) => (i, o),
        _ => return status::INVALID_ARGUMENT,
    };

    if trace_kernels_enabled() {
        trace!(
            target: "feagi-ops-runtime",
            "[TRAMPOLINE] {} inputs={} outputs={}",
            ctx.target_name,
            describe(&ctx.inputs),
            describe(&ctx.outputs)
        );
    }

    match catch_unwind(AssertUnwindSafe(|| ctx.kernel.call(&mut out_views, &in_views))) {
        Ok(Ok(())) => status::OK,
        Ok(Err(e)) => {
            warn!(target: "feagi-ops-runtime", "kernel behind {} failed: {}", ctx.target_name, e);
            status::KERNEL_ERROR
        }
        Err(_) => {
            warn!(target: "feagi-ops-runtime", "kernel behind {} panicked", ctx.target_name);
            status::PANIC
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::kernel;
    use feagi_ops_core::{DType, HostArray};

    fn add_one() -> Arc<dyn Kernel> {
        kernel("add_one", |outs, ins| {
            let x = ins[0].as_array::<f32>()?;
            let y = outs[0].as_array_mut::<f32>()?;
            for (o, &i) in y.iter_mut().zip(x.iter()) {
                *o = i + 1.0;
            }
            Ok(())
        })
    }

    #[test]
    fn test_compiled_target_runs_kernel() {
        let desc = ArrayDesc::new(vec![2, 2], DType::F32);
        let name = target_name("add_one", std::slice::from_ref(&desc));
        assert_eq!(name, "add_one(f32[2,2])");
        let handle = compile(&name, add_one(), Platform::Cpu, &[desc.clone()], &[desc.clone()]).unwrap();

        let inputs = vec![HostArray::from_shape_vec(&[2, 2], vec![0.0f32, 1.0, 2.0, 3.0]).unwrap()];
        let mut outputs = vec![HostArray::zeros(&desc)];
        handle.call(&name, &mut outputs, &inputs).unwrap();
        assert_eq!(outputs[0].to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_signature_is_enforced_at_call_time() {
        let desc = ArrayDesc::vector(3, DType::F32);
        let handle = compile("t", add_one(), Platform::Cpu, &[desc.clone()], &[desc.clone()]).unwrap();

        let inputs = vec![HostArray::vector(&[1.0f32, 2.0])];
        let mut outputs = vec![HostArray::zeros(&ArrayDesc::vector(2, DType::F32))];
        let err = handle.call("t", &mut outputs, &inputs).unwrap_err();
        assert!(err.to_string().contains("status 2"));

        let mut too_many = vec![HostArray::zeros(&desc), HostArray::zeros(&desc)];
        let err = handle
            .call("t", &mut too_many, &[HostArray::vector(&[1.0f32, 2.0, 3.0])])
            .unwrap_err();
        assert!(err.to_string().contains("status 1"));
    }

    #[test]
    fn test_panics_and_errors_become_status_codes() {
        let desc = ArrayDesc::scalar(DType::I32);
        let panicking = kernel("boom", |_, _| panic!("kernel bug"));
        let handle = compile("boom", panicking, Platform::Cpu, &[], &[desc.clone()]).unwrap();
        let mut outputs = vec![HostArray::zeros(&desc)];
        let err = handle.call("boom", &mut outputs, &[]).unwrap_err();
        assert!(err.to_string().contains("panicked"));

        let failing = kernel("fails", |_, _| Err(OpsError::Execution("nope".into())));
        let handle = compile("fails", failing, Platform::Cpu, &[], &[desc]).unwrap();
        let err = handle.call("fails", &mut outputs, &[]).unwrap_err();
        assert!(err.to_string().contains("kernel reported an error"));
    }

    #[test]
    fn test_compile_rejects_gpu_and_empty_outputs() {
        let desc = ArrayDesc::vector(1, DType::F64);
        assert!(matches!(
            compile("t", add_one(), Platform::Gpu, &[desc.clone()], &[desc.clone()]),
            Err(OpsError::UnsupportedPlatform(_))
        ));
        assert!(matches!(
            compile("t", add_one(), Platform::Cpu, &[desc], &[]),
            Err(OpsError::Compilation(_))
        ));
    }
}
