// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0
/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # FEAGI Ops Runtime
//!
//! Registers native kernels as operators and runs them two ways:
//!
//! - **Eager**: abstract-evaluate the inputs, allocate zeroed outputs, call
//!   the kernel in place.
//! - **Compiled**: trace a function into a graph, lower every operator node
//!   to a custom call on a signature-specialized trampoline target, and run
//!   the result through the raw-array ABI.
//!
//! Optional native extensions are loaded lazily, version-gated and
//! registered as custom-call targets by the [`extension`] loader.
//!
//! ## Architecture
//! - [`RuntimeContext`] owns all process-scoped state (no hidden singletons)
//! - One compiled target per (operator, platform, input signature)
//! - Target names are unique per platform namespace; collisions roll back

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod abstract_eval;
pub mod context;
mod eager;
pub mod extension;
pub mod graph;
pub mod kernel;
pub mod lowering;
pub mod operator;
pub mod registry;
pub mod targets;
pub mod trampoline;

pub use abstract_eval::{AbstractEvaluator, AbstractOutput, OutputSpec, ShapeFn};
pub use context::RuntimeContext;
pub use extension::{
    Capability, DylibLoader, ExtensionHandle, ExtensionLoader, ExtensionSource, ExtensionSpec, LinkedExtensions,
    LinkedLibrary, LoadFailure, LoadedLibrary, ACCEL_EXTENSION,
};
pub use graph::{Executable, Trace, TracedValue, Value};
pub use kernel::{anonymous_kernel, kernel, FnKernel, Kernel};
pub use lowering::{CallNode, KernelTranslation, TranslationRule, TranslationTable};
pub use operator::{OpOutput, Operator};
pub use registry::{OperatorRegistry, ANONYMOUS_PREFIX};
pub use targets::{NativeHandle, TargetRecord, TargetRegistry};
