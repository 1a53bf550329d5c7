// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Event-Driven Accumulation
//!
//! Only pre units whose event flag is set contribute. Their outgoing edges
//! come from a compressed adjacency `(indices, offsets)`: pre unit `i`
//! reaches `indices[offsets[i]..offsets[i + 1]]`.
//!
//! The native kernels live in the `feagi_ops_accel` extension, which is
//! required on first use. With `runtime.event_fallback = "graph"` a missing
//! extension degrades to a built-in operator instead of failing.

use crate::library::{apply, cached_operator, view_f64, view_indices, write_float};
use crate::reduce::Reduce;
use feagi_ops_config::EventFallback;
use feagi_ops_core::{ArrayDesc, DType, HostArray, HostView, HostViewMut, OpsError, Platform, Result};
use feagi_ops_runtime::{kernel, Operator, OutputSpec, RuntimeContext, Value, ACCEL_EXTENSION};
use std::sync::Arc;
use tracing::{debug, warn};

/// Custom-call target implementing `reduce` over `dtype` values in the accel extension
pub fn event_target_name(reduce: Reduce, dtype: DType) -> Result<String> {
    check_combine(reduce)?;
    if !dtype.is_float() {
        return Err(OpsError::Configuration(format!(
            "event values must be f32 or f64, got {}",
            dtype
        )));
    }
    Ok(format!("{}.event_{}_{}", ACCEL_EXTENSION, reduce, dtype.name()))
}

fn check_combine(reduce: Reduce) -> Result<()> {
    match reduce {
        Reduce::Sum | Reduce::Prod => Ok(()),
        other => Err(OpsError::Configuration(format!(
            "event accumulation supports sum and prod, got {}",
            other
        ))),
    }
}

/// Check `(events, indices, offsets, values)` and return the output descriptor
fn event_shape(post_count: usize, inputs: &[ArrayDesc]) -> Result<ArrayDesc> {
    let [events, indices, offsets, values] = inputs else {
        return Err(OpsError::Configuration(format!(
            "event ops take (events, indices, offsets, values), got {} operands",
            inputs.len()
        )));
    };
    if events.dtype() != DType::Bool || events.ndim() != 1 {
        return Err(OpsError::Configuration(format!("events must be a 1-D bool array, got {}", events)));
    }
    if indices.ndim() != 1 || offsets.ndim() != 1 || !indices.dtype().is_integer() || !offsets.dtype().is_integer() {
        return Err(OpsError::Configuration(format!(
            "adjacency must be 1-D integer arrays, got {} and {}",
            indices, offsets
        )));
    }
    if offsets.shape()[0] != events.shape()[0] + 1 {
        return Err(OpsError::Configuration(format!(
            "offsets must have {} entries for {} events, got {}",
            events.shape()[0] + 1,
            events.shape()[0],
            offsets.shape()[0]
        )));
    }
    let per_edge = !values.is_scalar() && values.shape() != [1];
    if per_edge && values.shape() != [indices.shape()[0]] {
        return Err(OpsError::Configuration(format!(
            "values must be a scalar or one per edge ({}), got {}",
            indices.shape()[0],
            values
        )));
    }
    if !values.dtype().is_float() {
        return Err(OpsError::Configuration(format!(
            "event values must be f32 or f64, got {}",
            values.dtype()
        )));
    }
    Ok(ArrayDesc::vector(post_count, values.dtype()))
}

/// Coerce a concrete argument to `dtype`; symbolic arguments must already match
fn coerce(value: Value, dtype: DType, what: &str) -> Result<Value> {
    let current = value.desc().dtype();
    if current == dtype {
        return Ok(value);
    }
    match value {
        Value::Concrete(array) => Ok(array.astype(dtype).into()),
        Value::Traced(_) => Err(OpsError::Configuration(format!(
            "traced {} must be {}, got {}",
            what, dtype, current
        ))),
    }
}

fn graph_kernel(reduce: Reduce, outs: &mut [HostViewMut<'_>], ins: &[HostView<'_>]) -> Result<()> {
    let events = ins[0].as_array::<bool>()?;
    let indices = view_indices(&ins[1])?;
    let offsets = view_indices(&ins[2])?;
    let values = view_f64(&ins[3])?;
    let scalar = values.len() == 1;

    let mut out = vec![reduce.identity::<f64>(); outs[0].shape()[0]];
    for (i, &fired) in events.iter().enumerate() {
        if !fired {
            continue;
        }
        let (Some(start), Some(end)) = (offsets[i], offsets[i + 1]) else {
            return Err(OpsError::Execution(format!("negative offset for pre unit {}", i)));
        };
        if start > end || end > indices.len() {
            return Err(OpsError::Execution(format!(
                "offsets {}..{} of pre unit {} exceed {} edges",
                start,
                end,
                i,
                indices.len()
            )));
        }
        for edge in start..end {
            let value = if scalar { values[0] } else { values[edge] };
            if let Some(slot) = indices[edge].and_then(|post| out.get_mut(post)) {
                *slot = reduce.combine(*slot, value);
            }
        }
    }
    write_float(&mut outs[0], &out)
}

/// Built-in operator computing the same result as the accel kernels without the extension
pub fn event_graph_op(ctx: &RuntimeContext, reduce: Reduce, post_count: usize) -> Result<Arc<Operator>> {
    check_combine(reduce)?;
    let id = format!("event_{}_graph[{}]", reduce, post_count);
    cached_operator(ctx, &id, || {
        let k = kernel(id.clone(), move |outs, ins| graph_kernel(reduce, outs, ins));
        let spec = OutputSpec::from_fn(move |inputs| Ok(event_shape(post_count, inputs)?.into()));
        (k, spec)
    })
}

/// Accumulate `values` into `post_count` targets along the edges of every firing pre unit.
///
/// `reduce` is `Sum` or `Prod`; the output starts at 0 or 1 accordingly.
/// `values` defaults to `1.0f32` and may be a scalar or one value per edge;
/// integer values are converted to `f32`. Indices and offsets are passed to
/// the native kernel as `i32`.
///
/// Fails with `CapabilityMissing` when the accel extension cannot be loaded,
/// unless the configured event fallback is `graph`.
pub fn event_accumulate(
    ctx: &RuntimeContext,
    reduce: Reduce,
    events: impl Into<Value>,
    indices: impl Into<Value>,
    offsets: impl Into<Value>,
    post_count: usize,
    values: Option<Value>,
) -> Result<Value> {
    check_combine(reduce)?;
    let values = values.unwrap_or_else(|| HostArray::scalar(1.0f32).into());
    let dtype = match values.desc().dtype() {
        d if d.is_float() => d,
        _ => DType::F32,
    };
    let args = vec![
        events.into(),
        coerce(indices.into(), DType::I32, "indices")?,
        coerce(offsets.into(), DType::I32, "offsets")?,
        coerce(values, dtype, "values")?,
    ];
    let descs: Vec<ArrayDesc> = args.iter().map(Value::desc).collect();
    let out_desc = event_shape(post_count, &descs)?;

    match ctx.require_extension(ACCEL_EXTENSION, Platform::Cpu) {
        Ok(_) => {
            let target = event_target_name(reduce, dtype)?;
            debug!(target: "feagi-ops-operators", "event_{} via {}", reduce, target);
            let trace = args.iter().find_map(Value::trace);
            match trace {
                Some(trace) => trace
                    .custom_call(&target, &args, vec![out_desc])?
                    .into_iter()
                    .next()
                    .ok_or_else(|| OpsError::Execution(format!("{} returned no result", target))),
                None => {
                    let inputs = args.into_iter().map(Value::into_concrete).collect::<Result<Vec<_>>>()?;
                    let mut outputs = ctx.call_target(&target, Platform::Cpu, &[out_desc], &inputs)?;
                    outputs
                        .pop()
                        .map(Value::Concrete)
                        .ok_or_else(|| OpsError::Execution(format!("{} returned no result", target)))
                }
            }
        }
        Err(OpsError::CapabilityMissing(missing)) if ctx.config().runtime.event_fallback == EventFallback::Graph => {
            warn!(
                target: "feagi-ops-operators",
                "⚠️ {} unavailable ({}); event_{} falls back to the graph operator",
                missing.extension, missing.reason, reduce
            );
            let op = event_graph_op(ctx, reduce, post_count)?;
            apply(&op, &args)
        }
        Err(e) => Err(e),
    }
}
