// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Segment Reductions
//!
//! Grouped reductions of a flat array into `group_count` outputs through an
//! index array. Every variant is a registered operator, so the same call
//! works on concrete arrays and inside a traced graph.
//!
//! Entries whose group id is negative or `>= group_count` are dropped.

use crate::library::{
    apply, cached_operator, check_index_dtype, check_same_len, float_dtype, out_slice, view_as, view_f64,
    view_indices, write_float,
};
use crate::reduce::{segment_fold, Reduce, Scalar};
use feagi_ops_core::{ArrayDesc, DType, HostView, HostViewMut, OpsError, Result};
use feagi_ops_runtime::{kernel, Operator, OutputSpec, RuntimeContext, Value};
use std::sync::Arc;

/// Output dtype of a sum/prod/min/max scatter: `bool` is promoted to `i32`
pub fn promoted_dtype(dtype: DType) -> DType {
    if dtype == DType::Bool {
        DType::I32
    } else {
        dtype
    }
}

fn operator_id(name: &str, group_count: usize, sorted: bool) -> String {
    if sorted {
        format!("{}[{},sorted]", name, group_count)
    } else {
        format!("{}[{}]", name, group_count)
    }
}

/// Validate `(values, group_ids)` and return the values descriptor
fn check_operands(inputs: &[ArrayDesc]) -> Result<&ArrayDesc> {
    if inputs.len() != 2 {
        return Err(OpsError::Configuration(format!(
            "segment ops take (values, group_ids), got {} operands",
            inputs.len()
        )));
    }
    let (values, ids) = (&inputs[0], &inputs[1]);
    if values.ndim() != 1 || ids.ndim() != 1 {
        return Err(OpsError::Configuration(format!(
            "segment ops expect 1-D operands, got {} and {}",
            values, ids
        )));
    }
    check_index_dtype(ids.dtype(), "group_ids")?;
    check_same_len(values.shape()[0], ids.shape()[0], "group_ids")?;
    Ok(values)
}

fn fold_typed<T: Scalar>(
    reduce: Reduce,
    out: &mut HostViewMut<'_>,
    values: &[T],
    ids: &[Option<usize>],
    sorted: bool,
) -> Result<()> {
    let out = out_slice::<T>(out)?;
    out.fill(reduce.identity());
    segment_fold(reduce, out, values, ids, sorted);
    Ok(())
}

fn scatter_kernel(reduce: Reduce, sorted: bool, outs: &mut [HostViewMut<'_>], ins: &[HostView<'_>]) -> Result<()> {
    let ids = view_indices(&ins[1])?;
    let out = &mut outs[0];
    let v = &ins[0];
    match v.dtype() {
        DType::Bool => {
            let values: Vec<i32> = v.as_array::<bool>()?.iter().map(|&b| b as i32).collect();
            fold_typed(reduce, out, &values, &ids, sorted)
        }
        DType::I32 => fold_typed(reduce, out, &view_as::<i32>(v)?, &ids, sorted),
        DType::I64 => fold_typed(reduce, out, &view_as::<i64>(v)?, &ids, sorted),
        DType::U32 => fold_typed(reduce, out, &view_as::<u32>(v)?, &ids, sorted),
        DType::F32 => fold_typed(reduce, out, &view_as::<f32>(v)?, &ids, sorted),
        DType::F64 => fold_typed(reduce, out, &view_as::<f64>(v)?, &ids, sorted),
    }
}

/// Registered scatter operator for `reduce` with a fixed output length.
///
/// `indices_are_sorted` selects a run-length fold; it never changes results.
pub fn scatter_reduce_op(
    ctx: &RuntimeContext,
    reduce: Reduce,
    group_count: usize,
    indices_are_sorted: bool,
) -> Result<Arc<Operator>> {
    if reduce == Reduce::Mean {
        return scatter_mean_op(ctx, group_count);
    }
    let id = operator_id(&format!("scatter_{}", reduce), group_count, indices_are_sorted);
    cached_operator(ctx, &id, || {
        let k = kernel(id.clone(), move |outs, ins| scatter_kernel(reduce, indices_are_sorted, outs, ins));
        let spec = OutputSpec::from_fn(move |inputs| {
            let values = check_operands(inputs)?;
            Ok(ArrayDesc::vector(group_count, promoted_dtype(values.dtype())).into())
        });
        (k, spec)
    })
}

/// Combine `values[i]` into `out[group_ids[i]]` with `reduce`.
///
/// Untouched groups keep the reduction identity (0, 1, +∞ or −∞ for
/// sum, prod, min and max). `Reduce::Mean` dispatches to [`scatter_mean`].
pub fn scatter_reduce(
    ctx: &RuntimeContext,
    reduce: Reduce,
    values: impl Into<Value>,
    group_ids: impl Into<Value>,
    group_count: usize,
) -> Result<Value> {
    scatter_reduce_with(ctx, reduce, values, group_ids, group_count, false)
}

/// [`scatter_reduce`] with the sorted-indices hint
pub fn scatter_reduce_with(
    ctx: &RuntimeContext,
    reduce: Reduce,
    values: impl Into<Value>,
    group_ids: impl Into<Value>,
    group_count: usize,
    indices_are_sorted: bool,
) -> Result<Value> {
    let op = scatter_reduce_op(ctx, reduce, group_count, indices_are_sorted)?;
    apply(&op, &[values.into(), group_ids.into()])
}

fn mean_kernel(group_count: usize, outs: &mut [HostViewMut<'_>], ins: &[HostView<'_>]) -> Result<()> {
    let values = view_f64(&ins[0])?;
    let ids = view_indices(&ins[1])?;
    let mut sums = vec![0.0f64; group_count];
    let mut counts = vec![0.0f64; group_count];
    segment_fold(Reduce::Sum, &mut sums, &values, &ids, false);
    segment_fold(Reduce::Sum, &mut counts, &vec![1.0; values.len()], &ids, false);

    let means: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(&s, &c)| if c > 0.0 { s / c } else { 0.0 })
        .collect();
    write_float(&mut outs[0], &means)
}

/// Registered per-group mean operator
pub fn scatter_mean_op(ctx: &RuntimeContext, group_count: usize) -> Result<Arc<Operator>> {
    let id = operator_id("scatter_mean", group_count, false);
    cached_operator(ctx, &id, || {
        let k = kernel(id.clone(), move |outs, ins| mean_kernel(group_count, outs, ins));
        let spec = OutputSpec::from_fn(move |inputs| {
            let values = check_operands(inputs)?;
            Ok(ArrayDesc::vector(group_count, float_dtype(values.dtype())).into())
        });
        (k, spec)
    })
}

/// Per-group mean; empty groups are 0.
///
/// The result is `f64` for `f64` input and `f32` otherwise.
pub fn scatter_mean(
    ctx: &RuntimeContext,
    values: impl Into<Value>,
    group_ids: impl Into<Value>,
    group_count: usize,
) -> Result<Value> {
    let op = scatter_mean_op(ctx, group_count)?;
    apply(&op, &[values.into(), group_ids.into()])
}

fn softmax_kernel(group_count: usize, outs: &mut [HostViewMut<'_>], ins: &[HostView<'_>]) -> Result<()> {
    let values = view_f64(&ins[0])?;
    let ids = view_indices(&ins[1])?;
    let ids: Vec<Option<usize>> = ids.into_iter().map(|id| id.filter(|&g| g < group_count)).collect();

    let mut maxes = vec![f64::NEG_INFINITY; group_count];
    segment_fold(Reduce::Max, &mut maxes, &values, &ids, false);

    let exps: Vec<f64> = values
        .iter()
        .zip(&ids)
        .map(|(&v, id)| id.map_or(0.0, |g| (v - maxes[g]).exp()))
        .collect();
    let mut sums = vec![0.0f64; group_count];
    segment_fold(Reduce::Sum, &mut sums, &exps, &ids, false);

    let result: Vec<f64> = exps
        .iter()
        .zip(&ids)
        .map(|(&e, id)| {
            let v = id.map_or(0.0, |g| e / sums[g]);
            if v.is_nan() {
                0.0
            } else {
                v
            }
        })
        .collect();
    write_float(&mut outs[0], &result)
}

/// Registered per-group softmax operator
pub fn scatter_softmax_op(ctx: &RuntimeContext, group_count: usize) -> Result<Arc<Operator>> {
    let id = operator_id("scatter_softmax", group_count, false);
    cached_operator(ctx, &id, || {
        let k = kernel(id.clone(), move |outs, ins| softmax_kernel(group_count, outs, ins));
        let spec = OutputSpec::from_fn(|inputs| {
            let values = check_operands(inputs)?;
            Ok(ArrayDesc::vector(values.shape()[0], float_dtype(values.dtype())).into())
        });
        (k, spec)
    })
}

/// Softmax of every value within its group, one output per input position.
///
/// Each group's maximum is subtracted before exponentiating; NaN results
/// (and entries with out-of-range ids) are 0.
pub fn scatter_softmax(
    ctx: &RuntimeContext,
    values: impl Into<Value>,
    group_ids: impl Into<Value>,
    group_count: usize,
) -> Result<Value> {
    let op = scatter_softmax_op(ctx, group_count)?;
    apply(&op, &[values.into(), group_ids.into()])
}
