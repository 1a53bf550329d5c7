// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Abstract Evaluation
//!
//! Output descriptors are computed from input descriptors alone. The same
//! evaluator runs on the eager path (to size output buffers), while tracing
//! (to type the graph) and again while lowering, so it must be a pure
//! function of shapes and dtypes.

use feagi_ops_core::{ArrayDesc, OpsError, Result};
use std::fmt;
use std::sync::Arc;

/// Result of a user-supplied shape function
#[derive(Debug, Clone, PartialEq)]
pub enum AbstractOutput {
    Single(ArrayDesc),
    Multi(Vec<ArrayDesc>),
}

impl From<ArrayDesc> for AbstractOutput {
    fn from(desc: ArrayDesc) -> Self {
        AbstractOutput::Single(desc)
    }
}

impl From<Vec<ArrayDesc>> for AbstractOutput {
    fn from(descs: Vec<ArrayDesc>) -> Self {
        AbstractOutput::Multi(descs)
    }
}

pub type ShapeFn = dyn Fn(&[ArrayDesc]) -> Result<AbstractOutput> + Send + Sync;

/// How an operator declares its outputs at registration
#[derive(Clone)]
pub enum OutputSpec {
    /// Computed from the input descriptors on every evaluation
    Fn(Arc<ShapeFn>),
    /// One fixed output
    Desc(ArrayDesc),
    /// Fixed outputs, in order
    Descs(Vec<ArrayDesc>),
}

impl OutputSpec {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&[ArrayDesc]) -> Result<AbstractOutput> + Send + Sync + 'static,
    {
        OutputSpec::Fn(Arc::new(f))
    }

    /// Outputs mirror the inputs one-to-one
    pub fn same_as_inputs() -> Self {
        Self::from_fn(|inputs| Ok(AbstractOutput::Multi(inputs.to_vec())))
    }
}

impl fmt::Debug for OutputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSpec::Fn(_) => f.write_str("OutputSpec::Fn(..)"),
            OutputSpec::Desc(d) => write!(f, "OutputSpec::Desc({})", d),
            OutputSpec::Descs(ds) => write!(f, "OutputSpec::Descs({:?})", ds),
        }
    }
}

impl From<ArrayDesc> for OutputSpec {
    fn from(desc: ArrayDesc) -> Self {
        OutputSpec::Desc(desc)
    }
}

impl From<Vec<ArrayDesc>> for OutputSpec {
    fn from(descs: Vec<ArrayDesc>) -> Self {
        OutputSpec::Descs(descs)
    }
}

/// Normalized evaluator: every form yields a non-empty descriptor sequence
#[derive(Debug, Clone)]
pub struct AbstractEvaluator {
    spec: OutputSpec,
}

impl AbstractEvaluator {
    /// Validate a registration-time spec.
    ///
    /// Fixed specs must describe at least one output with a representable
    /// size; shape functions are checked on each evaluation instead.
    pub fn new(spec: OutputSpec) -> Result<Self> {
        match &spec {
            OutputSpec::Fn(_) => {}
            OutputSpec::Desc(desc) => check_fixed(desc)?,
            OutputSpec::Descs(descs) => {
                if descs.is_empty() {
                    return Err(OpsError::Registration(
                        "output spec must contain at least one descriptor".to_string(),
                    ));
                }
                for desc in descs {
                    check_fixed(desc)?;
                }
            }
        }
        Ok(Self { spec })
    }

    pub fn spec(&self) -> &OutputSpec {
        &self.spec
    }

    /// Number of outputs when it does not depend on the inputs
    pub fn static_arity(&self) -> Option<usize> {
        match &self.spec {
            OutputSpec::Fn(_) => None,
            OutputSpec::Desc(_) => Some(1),
            OutputSpec::Descs(descs) => Some(descs.len()),
        }
    }

    pub fn evaluate(&self, inputs: &[ArrayDesc]) -> Result<Vec<ArrayDesc>> {
        let outputs = match &self.spec {
            OutputSpec::Desc(desc) => vec![desc.clone()],
            OutputSpec::Descs(descs) => descs.clone(),
            OutputSpec::Fn(f) => match f(inputs) {
                Ok(AbstractOutput::Single(desc)) => vec![desc],
                Ok(AbstractOutput::Multi(descs)) => descs,
                Err(e) => {
                    return Err(OpsError::ShapeInference(format!(
                        "shape function failed for inputs {}: {}",
                        describe(inputs),
                        e
                    )))
                }
            },
        };

        if outputs.is_empty() {
            return Err(OpsError::ShapeInference(format!(
                "shape function returned no outputs for inputs {}",
                describe(inputs)
            )));
        }
        for desc in &outputs {
            desc.num_bytes().map_err(|e| OpsError::ShapeInference(e.to_string()))?;
        }
        Ok(outputs)
    }
}

fn check_fixed(desc: &ArrayDesc) -> Result<()> {
    desc.num_bytes()
        .map(|_| ())
        .map_err(|e| OpsError::Registration(format!("invalid output descriptor: {}", e)))
}

/// `(f32[2], i32[3])`
pub(crate) fn describe(descs: &[ArrayDesc]) -> String {
    let keys: Vec<String> = descs.iter().map(ArrayDesc::signature_key).collect();
    format!("({})", keys.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feagi_ops_core::DType;

    #[test]
    fn test_all_forms_normalize_to_sequences() {
        let d = ArrayDesc::vector(3, DType::F32);

        let single = AbstractEvaluator::new(d.clone().into()).unwrap();
        assert_eq!(single.evaluate(&[]).unwrap(), vec![d.clone()]);

        let multi = AbstractEvaluator::new(vec![d.clone(), d.clone()].into()).unwrap();
        assert_eq!(multi.evaluate(&[]).unwrap().len(), 2);

        let f = AbstractEvaluator::new(OutputSpec::from_fn(|ins| Ok(ins[0].clone().into()))).unwrap();
        assert_eq!(f.evaluate(&[d.clone()]).unwrap(), vec![d]);
        assert_eq!(f.static_arity(), None);
    }

    #[test]
    fn test_empty_descriptor_list_is_a_registration_error() {
        assert!(matches!(
            AbstractEvaluator::new(OutputSpec::Descs(vec![])),
            Err(OpsError::Registration(_))
        ));
    }

    #[test]
    fn test_unusable_shape_function_results() {
        let empty = AbstractEvaluator::new(OutputSpec::from_fn(|_| Ok(AbstractOutput::Multi(vec![]))))
            .unwrap();
        assert!(matches!(empty.evaluate(&[]), Err(OpsError::ShapeInference(_))));

        let failing = AbstractEvaluator::new(OutputSpec::from_fn(|_| {
            Err(OpsError::Configuration("rank must be 1".into()))
        }))
        .unwrap();
        let err = failing.evaluate(&[ArrayDesc::scalar(DType::I32)]).unwrap_err();
        assert!(matches!(err, OpsError::ShapeInference(_)));
        assert!(err.to_string().contains("i32[]"));

        let huge = AbstractEvaluator::new(OutputSpec::from_fn(|_| {
            Ok(ArrayDesc::new(vec![usize::MAX, 4], DType::F64).into())
        }))
        .unwrap();
        assert!(matches!(huge.evaluate(&[]), Err(OpsError::ShapeInference(_))));
    }
}
