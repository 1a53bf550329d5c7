// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Directed Reductions
//!
//! Reduce per-source values onto targets along explicit edges
//! `(pre_ids[k], post_ids[k])`. Scalar sources are broadcast to every edge
//! and need no `pre_ids`.
//!
//! The output is a zero-initialized float vector of length `post_count`;
//! sum, prod, min and max all combine into those zeros.

use crate::gather::gather_broadcast;
use crate::library::{
    apply, cached_operator, check_index_dtype, check_same_len, float_dtype, view_f64, view_indices, write_float,
};
use crate::reduce::{segment_fold, Reduce};
use crate::segment::scatter_mean;
use feagi_ops_core::{ArrayDesc, HostView, HostViewMut, OpsError, Result};
use feagi_ops_runtime::{kernel, Operator, OutputSpec, RuntimeContext, Value};
use std::sync::Arc;

fn directed_shape(post_count: usize, inputs: &[ArrayDesc]) -> Result<ArrayDesc> {
    let values = match inputs {
        [values, post_ids] => {
            if !values.is_scalar() {
                return Err(OpsError::Configuration(format!(
                    "pre_ids required for heterogeneous pre_values, got {}",
                    values
                )));
            }
            check_index_dtype(post_ids.dtype(), "post_ids")?;
            values
        }
        [values, pre_ids, post_ids] => {
            if values.ndim() != 1 || pre_ids.ndim() != 1 || post_ids.ndim() != 1 {
                return Err(OpsError::Configuration(format!(
                    "directed reductions expect 1-D operands, got {}, {} and {}",
                    values, pre_ids, post_ids
                )));
            }
            check_index_dtype(pre_ids.dtype(), "pre_ids")?;
            check_index_dtype(post_ids.dtype(), "post_ids")?;
            check_same_len(pre_ids.shape()[0], post_ids.shape()[0], "post_ids")?;
            values
        }
        _ => {
            return Err(OpsError::Configuration(format!(
                "directed reductions take 2 or 3 operands, got {}",
                inputs.len()
            )))
        }
    };
    Ok(ArrayDesc::vector(post_count, float_dtype(values.dtype())))
}

fn directed_kernel(
    reduce: Reduce,
    post_count: usize,
    outs: &mut [HostViewMut<'_>],
    ins: &[HostView<'_>],
) -> Result<()> {
    let values = view_f64(&ins[0])?;
    let post = view_indices(&ins[ins.len() - 1])?;
    let mut out = vec![0.0f64; post_count];

    if ins.len() == 2 {
        let v = values.first().copied().unwrap_or(0.0);
        if reduce == Reduce::Mean {
            for slot in post.iter().filter_map(|id| id.filter(|&g| g < post_count)) {
                out[slot] = v;
            }
        } else {
            segment_fold(reduce, &mut out, &vec![v; post.len()], &post, false);
        }
    } else {
        let pre = view_indices(&ins[1])?;
        let edge_values: Vec<f64> = pre
            .iter()
            .map(|id| id.and_then(|i| values.get(i)).copied().unwrap_or(0.0))
            .collect();
        segment_fold(reduce, &mut out, &edge_values, &post, false);
    }
    write_float(&mut outs[0], &out)
}

/// Registered directed reduction for `reduce` onto `post_count` targets.
///
/// Takes `(scalar, post_ids)` or `(pre_values, pre_ids, post_ids)`.
pub fn directed_reduce_op(ctx: &RuntimeContext, reduce: Reduce, post_count: usize) -> Result<Arc<Operator>> {
    let id = format!("directed_{}[{}]", reduce, post_count);
    cached_operator(ctx, &id, || {
        let k = kernel(id.clone(), move |outs, ins| directed_kernel(reduce, post_count, outs, ins));
        let spec = OutputSpec::from_fn(move |inputs| Ok(directed_shape(post_count, inputs)?.into()));
        (k, spec)
    })
}

/// Reduce `pre_values` onto `post_count` targets along `(pre_ids, post_ids)` edges.
///
/// A scalar `pre_values` is scattered directly by `post_ids` (for
/// `Reduce::Mean` it is written into every distinct target). An array
/// `pre_values` requires `pre_ids`: it is gathered per edge and then
/// reduced, which for `Reduce::Mean` is [`scatter_mean`].
pub fn directed_reduce(
    ctx: &RuntimeContext,
    reduce: Reduce,
    pre_values: impl Into<Value>,
    pre_ids: Option<Value>,
    post_ids: impl Into<Value>,
    post_count: usize,
) -> Result<Value> {
    let pre_values = pre_values.into();
    let post_ids = post_ids.into();

    if pre_values.desc().is_scalar() {
        let op = directed_reduce_op(ctx, reduce, post_count)?;
        return apply(&op, &[pre_values, post_ids]);
    }
    let pre_ids = pre_ids.ok_or_else(|| {
        OpsError::Configuration("pre_ids required for heterogeneous pre_values".to_string())
    })?;

    if reduce == Reduce::Mean {
        let per_edge = gather_broadcast(ctx, pre_values, pre_ids)?;
        return scatter_mean(ctx, per_edge, post_ids, post_count);
    }
    let op = directed_reduce_op(ctx, reduce, post_count)?;
    apply(&op, &[pre_values, pre_ids, post_ids])
}
