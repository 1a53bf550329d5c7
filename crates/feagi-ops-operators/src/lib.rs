// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # FEAGI Ops Operators
//!
//! Built-in scatter/gather primitives registered through
//! [`RuntimeContext::register_operator`](feagi_ops_runtime::RuntimeContext::register_operator).
//! Each function takes and returns [`Value`](feagi_ops_runtime::Value)s, so
//! it runs eagerly on concrete arrays and records a graph node when called
//! inside `RuntimeContext::jit`.
//!
//! | Operator | Result |
//! |---|---|
//! | [`scatter_reduce`] | `out[g]` combines every `values[i]` with `group_ids[i] == g` |
//! | [`scatter_mean`] | per-group mean, empty groups 0 |
//! | [`scatter_softmax`] | per-group softmax, one output per input |
//! | [`gather_broadcast`] | `values[index[i]]`, scalars broadcast |
//! | [`directed_reduce`] | per-pre values reduced along `(pre_ids, post_ids)` edges |
//! | [`event_accumulate`] | accumulation over a compressed adjacency for firing pre units |
//!
//! Operators with a static output length are registered once per length
//! (e.g. `scatter_sum[100]`) and reused afterwards.

pub mod aliases;
pub mod directed;
pub mod event;
pub mod gather;
mod library;
pub mod reduce;
pub mod segment;

pub use aliases::*;
pub use directed::{directed_reduce, directed_reduce_op};
pub use event::{event_accumulate, event_graph_op, event_target_name};
pub use gather::{gather_broadcast, gather_broadcast_op, GATHER_BROADCAST};
pub use reduce::{segment_fold, Reduce, Scalar};
pub use segment::{
    promoted_dtype, scatter_mean, scatter_mean_op, scatter_reduce, scatter_reduce_op, scatter_reduce_with,
    scatter_softmax, scatter_softmax_op,
};
