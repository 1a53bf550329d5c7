// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event-driven accumulation over a compressed adjacency.
//!
//! Inputs, in order:
//! 1. `events`: `bool[n_pre]`
//! 2. `indices`: `i32[n_edges]`, post-synaptic target of each edge
//! 3. `offsets`: `i32[n_pre + 1]`, edges of pre unit `i` are `offsets[i]..offsets[i+1]`
//! 4. `values`: scalar (0-d or length 1) or `T[n_edges]`
//!
//! Output: `T[post_count]`, overwritten. Sum starts at zero, product at one.
//! Edges whose target falls outside `0..post_count` are skipped.

use feagi_ops_core::abi::raw_slice;
use feagi_ops_core::{status, Element, RawArray};
use std::ffi::c_void;
use std::ops::{Add, Mul};
use std::panic::{catch_unwind, AssertUnwindSafe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    Sum,
    Prod,
}

/// Float element the event kernels accumulate into
pub trait Accumulate: Element + Copy + Add<Output = Self> + Mul<Output = Self> {
    const ZERO: Self;
    const ONE: Self;
}

impl Accumulate for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
}

impl Accumulate for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
}

impl Combine {
    #[inline]
    fn identity<T: Accumulate>(self) -> T {
        match self {
            Combine::Sum => T::ZERO,
            Combine::Prod => T::ONE,
        }
    }

    #[inline]
    fn apply<T: Accumulate>(self, acc: T, value: T) -> T {
        match self {
            Combine::Sum => acc + value,
            Combine::Prod => acc * value,
        }
    }
}

/// Accumulate active edges into `post`, which is overwritten.
///
/// Returns a status code on malformed inputs.
pub fn accumulate<T: Accumulate>(
    combine: Combine,
    post: &mut [T],
    events: &[bool],
    indices: &[i32],
    offsets: &[i32],
    values: &[T],
) -> Result<(), i32> {
    if offsets.len() != events.len() + 1 {
        return Err(status::INVALID_ARGUMENT);
    }
    let per_edge = match values.len() {
        1 if indices.len() != 1 => false,
        n if n == indices.len() => true,
        _ => return Err(status::INVALID_ARGUMENT),
    };

    post.fill(combine.identity());

    for (pre, &fired) in events.iter().enumerate() {
        if !fired {
            continue;
        }
        let (start, end) = (offsets[pre], offsets[pre + 1]);
        if start < 0 || end < start || end as usize > indices.len() {
            return Err(status::INVALID_ARGUMENT);
        }
        for edge in start as usize..end as usize {
            let Ok(target) = usize::try_from(indices[edge]) else {
                continue;
            };
            let Some(slot) = post.get_mut(target) else {
                continue;
            };
            let value = if per_edge { values[edge] } else { values[0] };
            *slot = combine.apply(*slot, value);
        }
    }
    Ok(())
}

unsafe fn accumulate_raw<T: Accumulate>(combine: Combine, out: &RawArray, ins: &[RawArray]) -> Result<(), i32> {
    let events = ins[0].view::<bool>().map_err(|_| status::UNSUPPORTED_DTYPE)?;
    let indices = ins[1].view::<i32>().map_err(|_| status::UNSUPPORTED_DTYPE)?;
    let offsets = ins[2].view::<i32>().map_err(|_| status::UNSUPPORTED_DTYPE)?;
    let values = ins[3].view::<T>().map_err(|_| status::UNSUPPORTED_DTYPE)?;
    let mut post = out.view_mut::<T>().map_err(|_| status::UNSUPPORTED_DTYPE)?;

    if events.ndim() != 1 || indices.ndim() != 1 || offsets.ndim() != 1 || post.ndim() != 1 || values.ndim() > 1 {
        return Err(status::INVALID_ARGUMENT);
    }

    let events = events.as_slice().ok_or(status::INVALID_ARGUMENT)?;
    let indices = indices.as_slice().ok_or(status::INVALID_ARGUMENT)?;
    let offsets = offsets.as_slice().ok_or(status::INVALID_ARGUMENT)?;
    let values = values.as_slice().ok_or(status::INVALID_ARGUMENT)?;
    let post = post.as_slice_mut().ok_or(status::INVALID_ARGUMENT)?;
    accumulate(combine, post, events, indices, offsets, values)
}

/// Shared body of the exported event targets
///
/// # Safety
/// Caller upholds the [`feagi_ops_core::TargetFn`] contract.
pub(crate) unsafe fn event_target<T: Accumulate>(
    combine: Combine,
    outputs: *const RawArray,
    num_outputs: usize,
    inputs: *const RawArray,
    num_inputs: usize,
) -> i32 {
    if num_outputs != 1 || num_inputs != 4 {
        return status::ARITY_MISMATCH;
    }
    let outs = raw_slice(outputs, num_outputs);
    let ins = raw_slice(inputs, num_inputs);
    match catch_unwind(AssertUnwindSafe(|| accumulate_raw::<T>(combine, &outs[0], ins))) {
        Ok(Ok(())) => status::OK,
        Ok(Err(code)) => code,
        Err(_) => status::PANIC,
    }
}

macro_rules! event_entry {
    ($name:ident, $ty:ty, $combine:expr) => {
        /// Exported event-driven target (see module docs for the argument layout)
        ///
        /// # Safety
        /// Follows the [`feagi_ops_core::TargetFn`] contract.
        pub unsafe extern "C" fn $name(
            _context: *const c_void,
            outputs: *const RawArray,
            num_outputs: usize,
            inputs: *const RawArray,
            num_inputs: usize,
        ) -> i32 {
            event_target::<$ty>($combine, outputs, num_outputs, inputs, num_inputs)
        }
    };
}

event_entry!(event_sum_f32, f32, Combine::Sum);
event_entry!(event_sum_f64, f64, Combine::Sum);
event_entry!(event_prod_f32, f32, Combine::Prod);
event_entry!(event_prod_f64, f64, Combine::Prod);
