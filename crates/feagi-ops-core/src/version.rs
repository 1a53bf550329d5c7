// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Numeric `major.minor.patch` versions reported by native extensions

use crate::error::OpsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Extension version, compared numerically component by component.
///
/// Pre-release and build suffixes (`-beta.3`, `+abc`) are accepted and
/// ignored, so `0.2.0-beta.1` compares equal to `0.2.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtensionVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ExtensionVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// True when `self` satisfies a `>= minimum` requirement
    pub fn satisfies(&self, minimum: &ExtensionVersion) -> bool {
        self >= minimum
    }
}

impl fmt::Display for ExtensionVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ExtensionVersion {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let core = trimmed
            .split(|c| c == '-' || c == '+')
            .next()
            .unwrap_or_default();
        let invalid = || OpsError::Configuration(format!("invalid version string \"{}\"", s));

        let mut parts = core.split('.');
        let mut next = |required: bool| -> Result<u32, OpsError> {
            match parts.next() {
                Some(p) => p.parse::<u32>().map_err(|_| invalid()),
                None if required => Err(invalid()),
                None => Ok(0),
            }
        };
        let major = next(true)?;
        let minor = next(false)?;
        let patch = next(false)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(major, minor, patch))
    }
}
