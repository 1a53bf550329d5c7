// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Tracing and Compiled Execution
//!
//! A [`Trace`] records operator applications over symbolic values with
//! static shapes. Lowering turns every recorded node into a custom call on a
//! registered target (compiling kernel trampolines as needed), and the
//! resulting [`Executable`] invokes those targets through the raw-array ABI.

use crate::abstract_eval::describe;
use crate::context::RuntimeContext;
use crate::lowering::CallNode;
use crate::operator::Operator;
use feagi_ops_core::{ArrayDesc, HostArray, OpsError, Platform, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Argument or result of an operator invocation
#[derive(Clone)]
pub enum Value {
    Concrete(HostArray),
    Traced(TracedValue),
}

impl Value {
    pub fn desc(&self) -> ArrayDesc {
        match self {
            Value::Concrete(array) => array.desc(),
            Value::Traced(traced) => traced.desc.clone(),
        }
    }

    pub fn as_concrete(&self) -> Option<&HostArray> {
        match self {
            Value::Concrete(array) => Some(array),
            Value::Traced(_) => None,
        }
    }

    pub fn into_concrete(self) -> Result<HostArray> {
        match self {
            Value::Concrete(array) => Ok(array),
            Value::Traced(traced) => Err(OpsError::Configuration(format!(
                "value {} is symbolic; run the compiled executable to obtain data",
                traced.desc
            ))),
        }
    }

    /// Trace this value belongs to, if symbolic
    pub fn trace(&self) -> Option<Trace> {
        match self {
            Value::Concrete(_) => None,
            Value::Traced(traced) => Some(traced.trace.clone()),
        }
    }
}

impl From<HostArray> for Value {
    fn from(array: HostArray) -> Self {
        Value::Concrete(array)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Concrete(array) => write!(f, "Concrete({})", array.desc()),
            Value::Traced(traced) => write!(f, "Traced(%{}: {})", traced.id, traced.desc),
        }
    }
}

/// Symbolic value inside a trace
#[derive(Clone)]
pub struct TracedValue {
    trace: Trace,
    id: usize,
    desc: ArrayDesc,
}

impl TracedValue {
    pub fn desc(&self) -> &ArrayDesc {
        &self.desc
    }
}

enum NodeKind {
    Constant(HostArray),
    Operator {
        op: Arc<Operator>,
        operands: Vec<usize>,
    },
    Target {
        name: String,
        operands: Vec<usize>,
    },
}

struct Node {
    kind: NodeKind,
    results: Vec<usize>,
}

#[derive(Default)]
struct TraceState {
    values: Vec<ArrayDesc>,
    parameters: Vec<usize>,
    nodes: Vec<Node>,
}

impl TraceState {
    fn new_value(&mut self, desc: ArrayDesc) -> usize {
        self.values.push(desc);
        self.values.len() - 1
    }
}

/// Recording of operator applications over symbolic values
#[derive(Clone, Default)]
pub struct Trace {
    state: Arc<Mutex<TraceState>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    fn same_trace(&self, other: &Trace) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Add a graph input
    pub fn parameter(&self, desc: ArrayDesc) -> Value {
        let mut state = self.state.lock();
        let id = state.new_value(desc.clone());
        state.parameters.push(id);
        Value::Traced(TracedValue {
            trace: self.clone(),
            id,
            desc,
        })
    }

    /// Value ids for arguments; concrete arrays become constants
    fn operand_ids(&self, state: &mut TraceState, args: &[Value]) -> Result<Vec<usize>> {
        args.iter()
            .map(|arg| match arg {
                Value::Traced(traced) => {
                    if self.same_trace(&traced.trace) {
                        Ok(traced.id)
                    } else {
                        Err(OpsError::Configuration(
                            "cannot mix values from different traces in one call".to_string(),
                        ))
                    }
                }
                Value::Concrete(array) => {
                    let id = state.new_value(array.desc());
                    state.nodes.push(Node {
                        kind: NodeKind::Constant(array.clone()),
                        results: vec![id],
                    });
                    Ok(id)
                }
            })
            .collect()
    }

    fn push_node(&self, state: &mut TraceState, kind: NodeKind, result_descs: Vec<ArrayDesc>) -> Vec<Value> {
        let results: Vec<usize> = result_descs
            .iter()
            .map(|d| state.new_value(d.clone()))
            .collect();
        let values = results
            .iter()
            .zip(result_descs)
            .map(|(&id, desc)| {
                Value::Traced(TracedValue {
                    trace: self.clone(),
                    id,
                    desc,
                })
            })
            .collect();
        state.nodes.push(Node { kind, results });
        values
    }

    /// Record an operator application, typing its results by abstract evaluation
    pub(crate) fn bind_operator(&self, op: &Arc<Operator>, args: &[Value]) -> Result<Vec<Value>> {
        let descs: Vec<ArrayDesc> = args.iter().map(Value::desc).collect();
        let result_descs = op.abstract_eval(&descs)?;
        let mut state = self.state.lock();
        let operands = self.operand_ids(&mut state, args)?;
        debug!(target: "feagi-ops-runtime", "traced {}{}", op.id(), describe(&descs));
        Ok(self.push_node(
            &mut state,
            NodeKind::Operator {
                op: Arc::clone(op),
                operands,
            },
            result_descs,
        ))
    }

    /// Record a call to an already-registered custom-call target.
    ///
    /// Used for extension kernels, which have no operator or abstract
    /// evaluator of their own: the caller states the result descriptors.
    pub fn custom_call(&self, target_name: &str, args: &[Value], result_descs: Vec<ArrayDesc>) -> Result<Vec<Value>> {
        if result_descs.is_empty() {
            return Err(OpsError::Configuration(format!(
                "custom call to {} must declare at least one result",
                target_name
            )));
        }
        let mut state = self.state.lock();
        let operands = self.operand_ids(&mut state, args)?;
        Ok(self.push_node(
            &mut state,
            NodeKind::Target {
                name: target_name.to_string(),
                operands,
            },
            result_descs,
        ))
    }

    /// Lower the recorded graph for `platform`, returning `outputs` when run.
    ///
    /// The trace is left untouched, so it can be compiled again (for another
    /// platform or another set of outputs).
    pub fn compile(&self, ctx: &RuntimeContext, platform: Platform, outputs: &[Value]) -> Result<Executable> {
        let state = self.state.lock();

        // Concrete outputs get slots past the traced values instead of new trace nodes
        let mut num_values = state.values.len();
        let mut output_constants = Vec::new();
        let output_ids = outputs
            .iter()
            .map(|out| match out {
                Value::Traced(traced) if self.same_trace(&traced.trace) => Ok(traced.id),
                Value::Traced(_) => Err(OpsError::Configuration(
                    "cannot compile outputs of a different trace".to_string(),
                )),
                Value::Concrete(array) => {
                    let id = num_values;
                    num_values += 1;
                    output_constants.push(Step::Constant {
                        id,
                        array: array.clone(),
                    });
                    Ok(id)
                }
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut steps = Vec::with_capacity(state.nodes.len());
        for node in &state.nodes {
            let step = match &node.kind {
                NodeKind::Constant(array) => Step::Constant {
                    id: node.results[0],
                    array: array.clone(),
                },
                NodeKind::Operator { op, operands } => {
                    let operand_descs: Vec<ArrayDesc> =
                        operands.iter().map(|&i| state.values[i].clone()).collect();
                    let call = ctx.lower_operator(op, &operand_descs, platform)?;
                    Step::Call {
                        call,
                        operands: operands.clone(),
                        results: node.results.clone(),
                    }
                }
                NodeKind::Target { name, operands } => {
                    let handle = ctx.targets().lookup(name, platform).ok_or_else(|| {
                        OpsError::Configuration(format!("target {} is not registered on {}", name, platform))
                    })?;
                    let operand_descs: Vec<ArrayDesc> =
                        operands.iter().map(|&i| state.values[i].clone()).collect();
                    let result_descs: Vec<ArrayDesc> =
                        node.results.iter().map(|&i| state.values[i].clone()).collect();
                    Step::Call {
                        call: CallNode::new(name.clone(), handle, operand_descs, result_descs),
                        operands: operands.clone(),
                        results: node.results.clone(),
                    }
                }
            };
            steps.push(step);
        }
        steps.extend(output_constants);

        let parameters = state
            .parameters
            .iter()
            .map(|&id| (id, state.values[id].clone()))
            .collect();
        info!(
            target: "feagi-ops-runtime",
            "compiled graph for {}: {} steps, {} parameters",
            platform,
            steps.len(),
            state.parameters.len()
        );
        Ok(Executable {
            platform,
            parameters,
            steps,
            outputs: output_ids,
            num_values,
        })
    }
}

enum Step {
    Constant {
        id: usize,
        array: HostArray,
    },
    Call {
        call: CallNode,
        operands: Vec<usize>,
        results: Vec<usize>,
    },
}

/// Lowered graph ready to run on concrete inputs
pub struct Executable {
    platform: Platform,
    parameters: Vec<(usize, ArrayDesc)>,
    steps: Vec<Step>,
    outputs: Vec<usize>,
    num_values: usize,
}

impl Executable {
    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn parameter_descs(&self) -> Vec<ArrayDesc> {
        self.parameters.iter().map(|(_, d)| d.clone()).collect()
    }

    /// Custom calls in execution order
    pub fn call_nodes(&self) -> Vec<&CallNode> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                Step::Call { call, .. } => Some(call),
                Step::Constant { .. } => None,
            })
            .collect()
    }

    /// Run every step; inputs must match the traced parameter descriptors
    pub fn run(&self, inputs: &[HostArray]) -> Result<Vec<HostArray>> {
        if inputs.len() != self.parameters.len() {
            return Err(OpsError::Configuration(format!(
                "executable takes {} inputs, got {}",
                self.parameters.len(),
                inputs.len()
            )));
        }

        let mut slots: Vec<Option<HostArray>> = vec![None; self.num_values];
        for ((id, desc), input) in self.parameters.iter().zip(inputs) {
            if input.desc() != *desc {
                return Err(OpsError::ShapeMismatch {
                    expected: desc.shape().to_vec(),
                    actual: input.shape().to_vec(),
                });
            }
            slots[*id] = Some(input.to_contiguous());
        }

        for step in &self.steps {
            match step {
                Step::Constant { id, array } => slots[*id] = Some(array.to_contiguous()),
                Step::Call {
                    call,
                    operands,
                    results,
                } => {
                    let mut outputs: Vec<HostArray> = call.result_descs.iter().map(HostArray::zeros).collect();
                    {
                        let args = operands
                            .iter()
                            .map(|&i| {
                                slots[i].as_ref().ok_or_else(|| {
                                    OpsError::Execution(format!("value %{} used before definition", i))
                                })
                            })
                            .collect::<Result<Vec<&HostArray>>>()?;
                        call.handle.call(&call.target_name, &mut outputs, args)?;
                    }
                    for (&id, array) in results.iter().zip(outputs) {
                        slots[id] = Some(array);
                    }
                }
            }
        }

        self.outputs
            .iter()
            .map(|&i| {
                slots[i]
                    .clone()
                    .ok_or_else(|| OpsError::Execution(format!("output %{} was never computed", i)))
            })
            .collect()
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("platform", &self.platform)
            .field("parameters", &self.parameter_descs())
            .field("calls", &self.call_nodes())
            .finish()
    }
}
