// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Operator Registry
//!
//! Assigns ids to (kernel, evaluator) pairs. Named kernels use their name;
//! anonymous kernels draw `_anonymous_kernel{n}` from a monotonic counter, so
//! two anonymous kernels never share an id (or a compiled target).

use crate::abstract_eval::{AbstractEvaluator, OutputSpec};
use crate::kernel::{kernel_identity, Kernel};
use crate::operator::Operator;
use ahash::AHashMap;
use feagi_ops_core::{OpsError, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix of generated ids for kernels without a name
pub const ANONYMOUS_PREFIX: &str = "_anonymous_kernel";

#[derive(Default)]
pub struct OperatorRegistry {
    operators: RwLock<AHashMap<String, Arc<Operator>>>,
    anonymous_counter: AtomicU64,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel with its output spec.
    ///
    /// Registering the same kernel object under the same name again returns
    /// the existing operator. A different kernel under a taken name is a
    /// `Registration` error: ids never alias two kernels.
    pub fn register(&self, kernel: Arc<dyn Kernel>, spec: OutputSpec) -> Result<Arc<Operator>> {
        let evaluator = AbstractEvaluator::new(spec)?;

        let id = match kernel.name() {
            Some(name) if name.trim().is_empty() => {
                return Err(OpsError::Registration("kernel name must not be empty".to_string()))
            }
            Some(name) if name.starts_with(ANONYMOUS_PREFIX) => {
                return Err(OpsError::Registration(format!(
                    "kernel name \"{}\" uses the reserved prefix {}",
                    name, ANONYMOUS_PREFIX
                )))
            }
            Some(name) => name.to_string(),
            None => {
                let n = self.anonymous_counter.fetch_add(1, Ordering::Relaxed);
                format!("{}{}", ANONYMOUS_PREFIX, n)
            }
        };

        let mut operators = self.operators.write();
        if let Some(existing) = operators.get(&id) {
            if kernel_identity(existing.kernel()) == kernel_identity(&kernel) {
                debug!(target: "feagi-ops-runtime", "operator {} already registered", id);
                return Ok(Arc::clone(existing));
            }
            return Err(OpsError::Registration(format!(
                "operator id \"{}\" is already bound to a different kernel",
                id
            )));
        }

        let op = Arc::new(Operator::new(id.clone(), kernel, evaluator));
        operators.insert(id.clone(), Arc::clone(&op));
        info!(target: "feagi-ops-runtime", "registered operator {}", id);
        Ok(op)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Operator>> {
        self.operators.read().get(id).cloned()
    }

    /// Sorted ids of every registered operator
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.operators.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.operators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every operator (and its cached targets).
    ///
    /// The anonymous counter keeps counting, so an operator handle that
    /// outlives the clear never shares an id with a later registration.
    pub fn clear(&self) {
        let mut operators = self.operators.write();
        for op in operators.values() {
            op.clear_targets();
        }
        operators.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{anonymous_kernel, kernel};
    use feagi_ops_core::{ArrayDesc, DType};

    fn out() -> OutputSpec {
        ArrayDesc::scalar(DType::F32).into()
    }

    #[test]
    fn test_named_kernel_uses_its_name() {
        let registry = OperatorRegistry::new();
        let op = registry.register(kernel("my_op", |_, _| Ok(())), out()).unwrap();
        assert_eq!(op.id(), "my_op");
        assert!(registry.get("my_op").is_some());
    }

    #[test]
    fn test_anonymous_kernels_get_distinct_ids() {
        let registry = OperatorRegistry::new();
        let a = registry.register(anonymous_kernel(|_, _| Ok(())), out()).unwrap();
        let b = registry.register(anonymous_kernel(|_, _| Ok(())), out()).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.id().starts_with(ANONYMOUS_PREFIX));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_anonymous_ids_not_reused_after_clear() {
        let registry = OperatorRegistry::new();
        let before = registry.register(anonymous_kernel(|_, _| Ok(())), out()).unwrap();
        registry.clear();
        let after = registry.register(anonymous_kernel(|_, _| Ok(())), out()).unwrap();
        assert_ne!(before.id(), after.id());
        assert!(registry.get(before.id()).is_none());
        assert_eq!(registry.ids(), vec![after.id().to_string()]);
    }

    #[test]
    fn test_same_kernel_twice_is_idempotent() {
        let registry = OperatorRegistry::new();
        let k = kernel("same", |_, _| Ok(()));
        let a = registry.register(Arc::clone(&k), out()).unwrap();
        let b = registry.register(k, out()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_name_collision_with_different_kernel_fails() {
        let registry = OperatorRegistry::new();
        registry.register(kernel("dup", |_, _| Ok(())), out()).unwrap();
        let err = registry.register(kernel("dup", |_, _| Ok(())), out()).unwrap_err();
        assert!(matches!(err, OpsError::Registration(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reserved_and_empty_names_rejected() {
        let registry = OperatorRegistry::new();
        assert!(registry.register(kernel("", |_, _| Ok(())), out()).is_err());
        assert!(registry
            .register(kernel("_anonymous_kernel7", |_, _| Ok(())), out())
            .is_err());
    }

    #[test]
    fn test_malformed_spec_is_rejected_before_insertion() {
        let registry = OperatorRegistry::new();
        let err = registry
            .register(kernel("bad", |_, _| Ok(())), OutputSpec::Descs(vec![]))
            .unwrap_err();
        assert!(matches!(err, OpsError::Registration(_)));
        assert!(registry.is_empty());
    }
}
