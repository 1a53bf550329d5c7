// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synapse-oriented names for the built-in operators.
//!
//! - `syn2post_*`: reduce per-synapse values onto post units ([`scatter_reduce`](crate::segment::scatter_reduce))
//! - `pre2syn`: expand per-pre values onto synapses ([`gather_broadcast`])
//! - `pre2post_*`: reduce per-pre values onto post units ([`directed_reduce`])
//! - `pre2post_event_*`: event-driven accumulation ([`event_accumulate`])

use crate::directed::directed_reduce;
use crate::event::event_accumulate;
use crate::gather::gather_broadcast;
use crate::reduce::Reduce;
use crate::segment::{scatter_mean, scatter_reduce_with, scatter_softmax};
use feagi_ops_core::Result;
use feagi_ops_runtime::{RuntimeContext, Value};

macro_rules! syn2post_fn {
    ($name:ident, $reduce:expr, $doc:literal) => {
        #[doc = $doc]
        pub fn $name(
            ctx: &RuntimeContext,
            syn_values: impl Into<Value>,
            post_ids: impl Into<Value>,
            post_num: usize,
            indices_are_sorted: bool,
        ) -> Result<Value> {
            scatter_reduce_with(ctx, $reduce, syn_values, post_ids, post_num, indices_are_sorted)
        }
    };
}

syn2post_fn!(syn2post_sum, Reduce::Sum, "Per-post sum of synaptic values");
syn2post_fn!(syn2post_prod, Reduce::Prod, "Per-post product of synaptic values");
syn2post_fn!(syn2post_max, Reduce::Max, "Per-post maximum of synaptic values");
syn2post_fn!(syn2post_min, Reduce::Min, "Per-post minimum of synaptic values");

/// Same as [`syn2post_sum`]
pub fn syn2post(
    ctx: &RuntimeContext,
    syn_values: impl Into<Value>,
    post_ids: impl Into<Value>,
    post_num: usize,
    indices_are_sorted: bool,
) -> Result<Value> {
    syn2post_sum(ctx, syn_values, post_ids, post_num, indices_are_sorted)
}

/// Per-post mean; the sorted hint does not apply
pub fn syn2post_mean(
    ctx: &RuntimeContext,
    syn_values: impl Into<Value>,
    post_ids: impl Into<Value>,
    post_num: usize,
) -> Result<Value> {
    scatter_mean(ctx, syn_values, post_ids, post_num)
}

pub fn syn2post_softmax(
    ctx: &RuntimeContext,
    syn_values: impl Into<Value>,
    post_ids: impl Into<Value>,
    post_num: usize,
) -> Result<Value> {
    scatter_softmax(ctx, syn_values, post_ids, post_num)
}

/// Per-synapse copy of the pre values (scalars broadcast)
pub fn pre2syn(ctx: &RuntimeContext, pre_values: impl Into<Value>, pre_ids: impl Into<Value>) -> Result<Value> {
    gather_broadcast(ctx, pre_values, pre_ids)
}

macro_rules! pre2post_fn {
    ($name:ident, $reduce:expr) => {
        pub fn $name(
            ctx: &RuntimeContext,
            pre_values: impl Into<Value>,
            post_num: usize,
            post_ids: impl Into<Value>,
            pre_ids: Option<Value>,
        ) -> Result<Value> {
            directed_reduce(ctx, $reduce, pre_values, pre_ids, post_ids, post_num)
        }
    };
}

pre2post_fn!(pre2post_sum, Reduce::Sum);
pre2post_fn!(pre2post_prod, Reduce::Prod);
pre2post_fn!(pre2post_min, Reduce::Min);
pre2post_fn!(pre2post_max, Reduce::Max);
pre2post_fn!(pre2post_mean, Reduce::Mean);

/// Event-driven sum over the `(indices, offsets)` adjacency
pub fn pre2post_event_sum(
    ctx: &RuntimeContext,
    events: impl Into<Value>,
    adjacency: (impl Into<Value>, impl Into<Value>),
    post_num: usize,
    values: Option<Value>,
) -> Result<Value> {
    let (indices, offsets) = adjacency;
    event_accumulate(ctx, Reduce::Sum, events, indices, offsets, post_num, values)
}

/// Event-driven product over the `(indices, offsets)` adjacency
pub fn pre2post_event_prod(
    ctx: &RuntimeContext,
    events: impl Into<Value>,
    adjacency: (impl Into<Value>, impl Into<Value>),
    post_num: usize,
    values: Option<Value>,
) -> Result<Value> {
    let (indices, offsets) = adjacency;
    event_accumulate(ctx, Reduce::Prod, events, indices, offsets, post_num, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::scatter_reduce;
    use feagi_ops_config::OpsConfig;
    use feagi_ops_core::HostArray;

    #[test]
    fn test_aliases_match_generic_operators() {
        let ctx = RuntimeContext::with_sources(OpsConfig::default(), vec![]).unwrap();
        let values = HostArray::vector(&[1.0f32, 2.0, 4.0]);
        let ids = HostArray::vector(&[0i32, 1, 1]);

        let via_alias = syn2post(&ctx, values.clone(), ids.clone(), 2, false)
            .unwrap()
            .into_concrete()
            .unwrap();
        let direct = scatter_reduce(&ctx, Reduce::Sum, values, ids, 2)
            .unwrap()
            .into_concrete()
            .unwrap();
        assert_eq!(via_alias, direct);

        let syn = pre2syn(&ctx, HostArray::scalar(3i32), HostArray::vector(&[0i32, 0]))
            .unwrap()
            .into_concrete()
            .unwrap();
        assert_eq!(syn.to_vec::<i32>().unwrap(), vec![3, 3]);

        let post = pre2post_sum(&ctx, HostArray::scalar(1.0f32), 2, HostArray::vector(&[1i32, 1]), None)
            .unwrap()
            .into_concrete()
            .unwrap();
        assert_eq!(post.to_vec::<f32>().unwrap(), vec![0.0, 2.0]);
    }
}
