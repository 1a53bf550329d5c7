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

//! # FEAGI Ops Core
//!
//! Shared vocabulary of the native-operator runtime.
//!
//! ## Contents
//! - **`ArrayDesc` / `DType` / `Platform`**: shape + dtype descriptors and execution targets
//! - **`HostArray` / `HostView`**: concrete buffers and the views kernels receive
//! - **`abi`**: the C calling convention shared by compiled trampolines and native extensions
//! - **`OpsError`**: error taxonomy used by every other crate
//! - **`ExtensionVersion`**: numeric versions for extension gating
//!
//! This crate has no runtime state. The native acceleration library depends on
//! it alone, so it must stay small.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod abi;
pub mod array;
pub mod desc;
pub mod dtype;
pub mod error;
pub mod version;

pub use abi::{
    check_status, status, ExportedTarget, RawArgs, RawArray, RegistrationsFn, TargetFn, VersionFn,
    CUSTOM_CALL_TARGET_TAG,
};
pub use array::{HostArray, HostView, HostViewMut};
pub use desc::{ArrayDesc, Platform};
pub use dtype::{DType, Element};
pub use error::{CapabilityMissing, OpsError, Result};
pub use version::ExtensionVersion;
