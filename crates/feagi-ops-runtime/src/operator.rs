// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Operators
//!
//! An operator pairs a kernel with its abstract evaluator under a stable id.
//! Invoking it on concrete arrays runs the eager path; invoking it on traced
//! values records a node for later lowering. Compiled targets are cached per
//! (platform, input signature) on the operator itself.

use crate::abstract_eval::AbstractEvaluator;
use crate::eager;
use crate::graph::Value;
use crate::kernel::Kernel;
use crate::targets::TargetRecord;
use ahash::AHashMap;
use feagi_ops_core::{ArrayDesc, HostArray, OpsError, Platform, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Operator results: a lone output is unwrapped
#[derive(Debug, Clone, PartialEq)]
pub enum OpOutput<T> {
    Single(T),
    Multi(Vec<T>),
}

impl<T> OpOutput<T> {
    pub(crate) fn from_vec(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            if let Some(value) = values.pop() {
                return OpOutput::Single(value);
            }
        }
        OpOutput::Multi(values)
    }

    pub fn len(&self) -> usize {
        match self {
            OpOutput::Single(_) => 1,
            OpOutput::Multi(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OpOutput::Single(value) => vec![value],
            OpOutput::Multi(values) => values,
        }
    }

    /// The single output, failing for multi-output operators
    pub fn into_single(self) -> Result<T> {
        match self {
            OpOutput::Single(value) => Ok(value),
            OpOutput::Multi(values) => Err(OpsError::Configuration(format!(
                "expected a single output, operator produced {}",
                values.len()
            ))),
        }
    }
}

type TargetKey = (Platform, Vec<ArrayDesc>);

/// A registered primitive
pub struct Operator {
    id: String,
    kernel: Arc<dyn Kernel>,
    evaluator: AbstractEvaluator,
    targets: Mutex<AHashMap<TargetKey, TargetRecord>>,
}

impl Operator {
    pub(crate) fn new(id: String, kernel: Arc<dyn Kernel>, evaluator: AbstractEvaluator) -> Self {
        Self {
            id,
            kernel,
            evaluator,
            targets: Mutex::new(AHashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    pub fn evaluator(&self) -> &AbstractEvaluator {
        &self.evaluator
    }

    /// Output descriptors for the given input descriptors
    pub fn abstract_eval(&self, inputs: &[ArrayDesc]) -> Result<Vec<ArrayDesc>> {
        self.evaluator.evaluate(inputs)
    }

    /// Eager execution on concrete arrays
    pub fn call(&self, inputs: &[HostArray]) -> Result<OpOutput<HostArray>> {
        eager::execute(&self.id, self.kernel.as_ref(), &self.evaluator, inputs).map(OpOutput::from_vec)
    }

    /// Dispatch on the argument kinds: any traced argument binds a graph
    /// node in that trace, otherwise the operator runs eagerly.
    pub fn invoke(self: &Arc<Self>, args: &[Value]) -> Result<OpOutput<Value>> {
        match args.iter().find_map(Value::trace) {
            Some(trace) => trace.bind_operator(self, args).map(OpOutput::from_vec),
            None => {
                let inputs: Vec<HostArray> = args
                    .iter()
                    .filter_map(|v| v.as_concrete().cloned())
                    .collect();
                let outputs = self.call(&inputs)?.into_vec();
                Ok(OpOutput::from_vec(outputs.into_iter().map(Value::Concrete).collect()))
            }
        }
    }

    /// Cached target for `(platform, signature)`, building it on first use.
    ///
    /// The cache lock is held while `build` runs, so concurrent first calls
    /// for the same signature build (and register) exactly once.
    pub(crate) fn target_for<F>(&self, platform: Platform, signature: &[ArrayDesc], build: F) -> Result<TargetRecord>
    where
        F: FnOnce() -> Result<TargetRecord>,
    {
        let key = (platform, signature.to_vec());
        let mut targets = self.targets.lock();
        if let Some(record) = targets.get(&key) {
            return Ok(record.clone());
        }
        let record = build()?;
        targets.insert(key, record.clone());
        Ok(record)
    }

    /// Targets compiled so far for `platform`, sorted by name
    pub fn target_records(&self, platform: Platform) -> Vec<TargetRecord> {
        let mut records: Vec<TargetRecord> = self
            .targets
            .lock()
            .iter()
            .filter(|((p, _), _)| *p == platform)
            .map(|(_, r)| r.clone())
            .collect();
        records.sort_by(|a, b| a.target_name.cmp(&b.target_name));
        records
    }

    pub(crate) fn clear_targets(&self) {
        self.targets.lock().clear();
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("id", &self.id)
            .field("evaluator", &self.evaluator)
            .finish()
    }
}
