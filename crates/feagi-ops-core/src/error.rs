// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for native-operator runtime operations

use crate::desc::Platform;
use crate::dtype::DType;
use std::fmt;

/// Structured description of a missing or outdated native extension.
///
/// Carried by [`OpsError::CapabilityMissing`] so callers can act on the
/// minimum version and remediation without parsing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityMissing {
    /// Extension library name (e.g. `feagi_ops_accel`)
    pub extension: String,
    /// Platform the extension was requested for
    pub platform: Platform,
    /// Minimum version the runtime accepts
    pub minimum_version: String,
    /// Version reported by the library, if it could be loaded at all
    pub found_version: Option<String>,
    /// Why the capability is unavailable
    pub reason: String,
    /// How to install or upgrade the extension
    pub remediation: String,
}

impl fmt::Display for CapabilityMissing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" (>= {}) is required on {}: {}",
            self.extension, self.minimum_version, self.platform, self.reason
        )?;
        if let Some(found) = &self.found_version {
            write!(f, " (found {})", found)?;
        }
        write!(f, ". Install it with: {}", self.remediation)
    }
}

/// Error taxonomy for registration, compilation, dispatch and extension loading
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpsError {
    /// Malformed abstract-evaluation spec or duplicate operator id
    #[error("Registration error: {0}")]
    Registration(String),

    /// Abstract evaluator produced an unusable result
    #[error("Shape inference error: {0}")]
    ShapeInference(String),

    /// Caller supplied an inconsistent combination of arguments
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Optional native extension is absent or too old
    #[error("Capability missing: {0}")]
    CapabilityMissing(CapabilityMissing),

    /// Target name already bound to a different handle on this platform
    #[error("Target collision: \"{name}\" is already registered on {platform} with a different handle")]
    TargetCollision { name: String, platform: Platform },

    /// No compilation or translation support for the platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Trampoline could not be built for a signature
    #[error("Compilation error: {0}")]
    Compilation(String),

    /// Handle passed to the target registrar carries the wrong tag
    #[error("Invalid target handle: expected tag \"{expected}\", got \"{actual}\"")]
    InvalidTargetHandle { expected: String, actual: String },

    #[error("DType mismatch: expected {expected}, got {actual}")]
    DTypeMismatch { expected: DType, actual: DType },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Raw array descriptor failed validation at the call boundary
    #[error("Invalid array: {0}")]
    InvalidArray(String),

    /// Kernel reported a failure or panicked
    #[error("Kernel execution failed: {0}")]
    Execution(String),
}

impl OpsError {
    /// Short machine-readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            OpsError::Registration(_) => "registration",
            OpsError::ShapeInference(_) => "shape_inference",
            OpsError::Configuration(_) => "configuration",
            OpsError::CapabilityMissing(_) => "capability_missing",
            OpsError::TargetCollision { .. } => "target_collision",
            OpsError::UnsupportedPlatform(_) => "unsupported_platform",
            OpsError::Compilation(_) => "compilation",
            OpsError::InvalidTargetHandle { .. } => "invalid_target_handle",
            OpsError::DTypeMismatch { .. } => "dtype_mismatch",
            OpsError::ShapeMismatch { .. } => "shape_mismatch",
            OpsError::InvalidArray(_) => "invalid_array",
            OpsError::Execution(_) => "execution",
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, OpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_missing_display_has_remediation() {
        let missing = CapabilityMissing {
            extension: "feagi_ops_accel".to_string(),
            platform: Platform::Cpu,
            minimum_version: "0.1.0".to_string(),
            found_version: Some("0.0.3".to_string()),
            reason: "version too old".to_string(),
            remediation: "cargo build -p feagi-ops-accel --release".to_string(),
        };
        let msg = OpsError::CapabilityMissing(missing).to_string();
        assert!(msg.contains("feagi_ops_accel"));
        assert!(msg.contains(">= 0.1.0"));
        assert!(msg.contains("found 0.0.3"));
        assert!(msg.contains("cargo build"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(OpsError::Configuration("x".into()).kind(), "configuration");
        assert_eq!(
            OpsError::TargetCollision {
                name: "t".into(),
                platform: Platform::Gpu
            }
            .kind(),
            "target_collision"
        );
    }
}
