// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Gather with scalar broadcast

use crate::library::{apply, cached_operator, check_index_dtype, out_slice, view_as, view_indices};
use feagi_ops_core::{ArrayDesc, DType, Element, HostView, HostViewMut, OpsError, Result};
use feagi_ops_runtime::{kernel, Operator, OutputSpec, RuntimeContext, Value};
use rayon::prelude::*;
use std::sync::Arc;

/// Output elements above which rows are copied in parallel
const PARALLEL_THRESHOLD: usize = 1 << 16;

pub const GATHER_BROADCAST: &str = "gather_broadcast";

fn gather_shape(inputs: &[ArrayDesc]) -> Result<ArrayDesc> {
    if inputs.len() != 2 {
        return Err(OpsError::Configuration(format!(
            "gather_broadcast takes (values, index), got {} operands",
            inputs.len()
        )));
    }
    let (values, index) = (&inputs[0], &inputs[1]);
    if index.ndim() != 1 {
        return Err(OpsError::Configuration(format!("index must be 1-D, got {}", index)));
    }
    check_index_dtype(index.dtype(), "index")?;
    let mut shape = vec![index.shape()[0]];
    if !values.is_scalar() {
        shape.extend_from_slice(&values.shape()[1..]);
    }
    Ok(ArrayDesc::new(shape, values.dtype()))
}

fn gather_typed<T: Element>(out: &mut HostViewMut<'_>, values: &HostView<'_>, ids: &[Option<usize>]) -> Result<()> {
    let src = view_as::<T>(values)?;
    let out = out_slice::<T>(out)?;
    let shape = values.shape();
    if shape.is_empty() {
        if let Some(&v) = src.first() {
            out.fill(v);
        }
        return Ok(());
    }

    let rows = shape[0];
    let width: usize = shape[1..].iter().product();
    if width == 0 {
        return Ok(());
    }
    // Rows with an out-of-range index stay zero.
    let copy_row = |(chunk, id): (&mut [T], &Option<usize>)| {
        if let Some(r) = id.filter(|&r| r < rows) {
            chunk.copy_from_slice(&src[r * width..(r + 1) * width]);
        }
    };
    if out.len() >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(width).zip(ids.par_iter()).for_each(copy_row);
    } else {
        out.chunks_mut(width).zip(ids.iter()).for_each(copy_row);
    }
    Ok(())
}

fn gather_kernel(outs: &mut [HostViewMut<'_>], ins: &[HostView<'_>]) -> Result<()> {
    let ids = view_indices(&ins[1])?;
    let out = &mut outs[0];
    let values = &ins[0];
    match values.dtype() {
        DType::Bool => gather_typed::<bool>(out, values, &ids),
        DType::I32 => gather_typed::<i32>(out, values, &ids),
        DType::I64 => gather_typed::<i64>(out, values, &ids),
        DType::U32 => gather_typed::<u32>(out, values, &ids),
        DType::F32 => gather_typed::<f32>(out, values, &ids),
        DType::F64 => gather_typed::<f64>(out, values, &ids),
    }
}

pub fn gather_broadcast_op(ctx: &RuntimeContext) -> Result<Arc<Operator>> {
    cached_operator(ctx, GATHER_BROADCAST, || {
        let spec = OutputSpec::from_fn(|inputs| Ok(gather_shape(inputs)?.into()));
        (kernel(GATHER_BROADCAST, gather_kernel), spec)
    })
}

/// `values[index[i]]` for every `i`, or `values` repeated `len(index)` times when it is a scalar.
///
/// Multi-dimensional `values` are gathered along the first axis. Positions
/// whose index is out of range are zero.
pub fn gather_broadcast(ctx: &RuntimeContext, values: impl Into<Value>, index: impl Into<Value>) -> Result<Value> {
    let op = gather_broadcast_op(ctx)?;
    apply(&op, &[values.into(), index.into()])
}
