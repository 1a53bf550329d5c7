// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # FEAGI Ops - Pluggable Native-Operator Runtime
//!
//! Register natively-compiled kernels as operators, run them eagerly or
//! inside compiled graphs, and load optional acceleration libraries on
//! demand. Ships the scatter/gather and event-driven operators used for
//! synaptic propagation.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! feagi-ops = "0.1"  # Default: accel linked in-process
//! ```
//!
//! ```rust,no_run
//! use feagi_ops::prelude::*;
//!
//! let ctx = RuntimeContext::new(OpsConfig::default())?;
//!
//! // Per-post sum of synaptic values
//! let psp = scatter_reduce(
//!     &ctx,
//!     Reduce::Sum,
//!     HostArray::vector(&[0.5f32, 1.0, 0.25]),
//!     HostArray::vector(&[0i32, 2, 2]),
//!     3,
//! )?
//! .into_concrete()?;
//! # Ok::<(), OpsError>(())
//! ```
//!
//! ## Feature Flags
//! - **`accel`** (default): link `feagi-ops-accel` so event operators work
//!   without a shared library on disk
//! - **`file-logging`**: JSON log files via `feagi-ops-observability`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: feagi-ops-core                             │
//! │  (ArrayDesc, HostArray, raw-array ABI, OpsError)        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Runtime: feagi-ops-runtime                             │
//! │  (registry, trampolines, targets, extension loader)     │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Operators: feagi-ops-operators                         │
//! │  (scatter, gather, directed and event reductions)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

use std::collections::HashMap;

// Re-export foundation
pub use feagi_ops_core as types;

pub use feagi_ops_config as config;
pub use feagi_ops_observability as observability;

// Re-export runtime and operators
pub use feagi_ops_operators as operators;
pub use feagi_ops_runtime as runtime;

#[cfg(feature = "accel")]
pub use feagi_ops_accel as accel;

/// Prelude - commonly used types and functions
pub mod prelude {
    pub use crate::types::{ArrayDesc, CapabilityMissing, DType, HostArray, OpsError, Platform};
    pub use crate::operators::{
        directed_reduce, event_accumulate, gather_broadcast, scatter_mean, scatter_reduce, scatter_softmax, Reduce,
    };
    pub use crate::runtime::{kernel, Capability, Executable, Operator, OutputSpec, RuntimeContext, Value};
    pub use feagi_ops_config::OpsConfig;
}

/// Build a runtime from `feagi_ops.toml`, environment and CLI overrides.
///
/// Falls back to defaults when no config file is found; a file that exists
/// but fails to parse or validate is an error.
pub fn runtime_from_environment(
    cli_args: Option<&HashMap<String, String>>,
) -> types::Result<runtime::RuntimeContext> {
    let config = feagi_ops_config::load_config_or_default(cli_args)
        .map_err(|e| types::OpsError::Configuration(e.to_string()))?;
    tracing::info!(
        target: "feagi-ops",
        "🔧 runtime on {} (event fallback: {})",
        config.runtime.default_platform,
        config.runtime.event_fallback
    );
    runtime::RuntimeContext::new(config)
}
