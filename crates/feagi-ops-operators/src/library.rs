// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared plumbing for the built-in operators: cached registration, view
//! conversion and argument dispatch.

use feagi_ops_core::{DType, Element, HostView, HostViewMut, OpsError, Result};
use feagi_ops_runtime::{Kernel, Operator, OutputSpec, RuntimeContext, Value};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// Look up a built-in operator by id, registering it on first use.
///
/// Two threads may race to build the same operator; the loser's
/// registration fails with a duplicate-id error and it picks up the winner's.
pub(crate) fn cached_operator<F>(ctx: &RuntimeContext, id: &str, make: F) -> Result<Arc<Operator>>
where
    F: FnOnce() -> (Arc<dyn Kernel>, OutputSpec),
{
    if let Some(op) = ctx.operator(id) {
        return Ok(op);
    }
    let (kernel, spec) = make();
    match ctx.register_operator(kernel, spec) {
        Ok(op) => {
            debug!(target: "feagi-ops-operators", "registered built-in {}", op.id());
            Ok(op)
        }
        Err(OpsError::Registration(reason)) => ctx.operator(id).ok_or(OpsError::Registration(reason)),
        Err(e) => Err(e),
    }
}

/// Apply `op` to `args` and return its single result
pub(crate) fn apply(op: &Arc<Operator>, args: &[Value]) -> Result<Value> {
    op.invoke(args)?.into_single()
}

/// Elements of a typed input view, borrowed when contiguous
pub(crate) fn view_as<'v, T: Element>(view: &'v HostView<'_>) -> Result<Cow<'v, [T]>> {
    let array = view.as_array::<T>()?;
    Ok(match array.as_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(array.iter().copied().collect()),
    })
}

/// Any numeric view widened to `f64` (`bool` becomes 0/1)
pub(crate) fn view_f64(view: &HostView<'_>) -> Result<Vec<f64>> {
    Ok(match view {
        HostView::Bool(a) => a.iter().map(|v| v.to_f64()).collect(),
        HostView::I32(a) => a.iter().map(|v| v.to_f64()).collect(),
        HostView::I64(a) => a.iter().map(|v| v.to_f64()).collect(),
        HostView::U32(a) => a.iter().map(|v| v.to_f64()).collect(),
        HostView::F32(a) => a.iter().map(|v| v.to_f64()).collect(),
        HostView::F64(a) => a.iter().copied().collect(),
    })
}

/// Integer view as positions; negative entries become `None`
pub(crate) fn view_indices(view: &HostView<'_>) -> Result<Vec<Option<usize>>> {
    match view {
        HostView::I32(a) => Ok(a.iter().map(|&v| usize::try_from(v).ok()).collect()),
        HostView::I64(a) => Ok(a.iter().map(|&v| usize::try_from(v).ok()).collect()),
        HostView::U32(a) => Ok(a.iter().map(|&v| Some(v as usize)).collect()),
        other => Err(OpsError::Configuration(format!(
            "index arrays must be integer typed, got {}",
            other.dtype()
        ))),
    }
}

/// Contiguous output buffer of a kernel
pub(crate) fn out_slice<'o, T: Element>(out: &'o mut HostViewMut<'_>) -> Result<&'o mut [T]> {
    out.as_array_mut::<T>()?
        .as_slice_mut()
        .ok_or_else(|| OpsError::Execution("kernel output buffer is not contiguous".to_string()))
}

/// Write `f64` results into a float output of either width
pub(crate) fn write_float(out: &mut HostViewMut<'_>, data: &[f64]) -> Result<()> {
    match out.dtype() {
        DType::F32 => {
            for (o, &v) in out_slice::<f32>(out)?.iter_mut().zip(data) {
                *o = v as f32;
            }
        }
        DType::F64 => out_slice::<f64>(out)?.copy_from_slice(data),
        other => {
            return Err(OpsError::DTypeMismatch {
                expected: DType::F32,
                actual: other,
            })
        }
    }
    Ok(())
}

/// Float dtype a numeric result is reported in: `f64` stays `f64`, everything else is `f32`
pub(crate) fn float_dtype(input: DType) -> DType {
    if input == DType::F64 {
        DType::F64
    } else {
        DType::F32
    }
}

pub(crate) fn check_index_dtype(dtype: DType, what: &str) -> Result<()> {
    if dtype.is_integer() {
        Ok(())
    } else {
        Err(OpsError::Configuration(format!("{} must be integer typed, got {}", what, dtype)))
    }
}

pub(crate) fn check_same_len(a: usize, b: usize, what: &str) -> Result<()> {
    if a == b {
        Ok(())
    } else {
        Err(OpsError::Configuration(format!("{}: expected length {}, got {}", what, a, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feagi_ops_core::HostArray;

    #[test]
    fn test_view_indices_drops_negative() {
        let ids = HostArray::vector(&[2i32, -1, 0]);
        assert_eq!(view_indices(&ids.view()).unwrap(), vec![Some(2), None, Some(0)]);
        let floats = HostArray::vector(&[1.0f32]);
        assert!(view_indices(&floats.view()).is_err());
    }

    #[test]
    fn test_float_dtype() {
        assert_eq!(float_dtype(DType::F64), DType::F64);
        assert_eq!(float_dtype(DType::Bool), DType::F32);
        assert_eq!(float_dtype(DType::I64), DType::F32);
    }
}
