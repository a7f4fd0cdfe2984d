// Net — owner of every buffer and the public call surface
//
// A Net is built once from a node collection:
//
//   validate  →  instantiate operators + buffer sets  →  execution order
//
// and from then on only its buffer contents change. Every public operation
// takes the net's lock for its whole duration, so calls on one net are
// totally ordered. Different nets share nothing.
//
// DESIGNATED NODES:
//
//   "BeginNet"  Input node bound to `forward`'s input
//   "EndNet"    node whose output is `forward`'s output and whose gradient
//               buffer receives the target (`training`) or gradient
//               (`backward`)
//
// Both are optional; `training` fails without an EndNet.
//
// ERRORS:
//
// Every operation returns `Result`. On failure the error text is stored as
// the last error, logged, and passed to the status callback of the config
// before the error is returned. The net stays usable after any error.

use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use wren_core::error::{Error, Result};
use wren_core::{
    BatchNorm, OperatorParams, Shape4, Tensor, BEGIN_NODE, END_NODE, INPUT_OPERATOR,
    OUTPUT_OPERATOR,
};
use wren_ops::{CallbackRegistry, ExecParams, OperatorRegistry, UserCallback};

use crate::arena::NodeArena;
use crate::config::{LoadMode, NetConfig};
use crate::description::NetDescription;
use crate::engine::Engine;
use crate::persist::{self, WeightRecord};
use crate::validate::validate;

/// A validated, executable network.
pub struct Net {
    config: NetConfig,
    state: Mutex<NetState>,
}

struct NetState {
    name: String,
    arena: NodeArena,
    engine: Engine,
    callbacks: CallbackRegistry,
    begin: Option<usize>,
    end: Option<usize>,
    last_error: String,
}

// Construction

impl Net {
    /// Build a net with the default operator registry.
    pub fn new(description: impl Into<NetDescription>, config: NetConfig) -> Result<Self> {
        Self::with_registry(description, config, &OperatorRegistry::default())
    }

    /// Build a net from its JSON description.
    pub fn from_json(text: &str, config: NetConfig) -> Result<Self> {
        match NetDescription::from_json(text) {
            Ok(description) => Self::new(description, config),
            Err(e) => {
                config.emit_status(&e.to_string());
                Err(e)
            }
        }
    }

    /// Build a net, resolving operator types through `registry`.
    pub fn with_registry(
        description: impl Into<NetDescription>,
        config: NetConfig,
        registry: &OperatorRegistry,
    ) -> Result<Self> {
        match NetState::build(description.into(), registry) {
            Ok(state) => Ok(Net {
                config,
                state: Mutex::new(state),
            }),
            Err(e) => {
                config.emit_status(&e.to_string());
                Err(e)
            }
        }
    }
}

impl NetState {
    fn build(description: NetDescription, registry: &OperatorRegistry) -> Result<Self> {
        let NetDescription { name, nodes } = description;
        validate(&nodes)?;
        let arena = NodeArena::build(nodes, registry)?;
        let engine = Engine::new(&arena)?;
        let begin = arena.find(BEGIN_NODE);
        let end = arena.find(END_NODE);
        tracing::debug!(
            net = %name,
            nodes = arena.len(),
            has_begin = begin.is_some(),
            has_end = end.is_some(),
            "net created"
        );
        Ok(NetState {
            name,
            arena,
            engine,
            callbacks: CallbackRegistry::new(),
            begin,
            end,
            last_error: String::new(),
        })
    }
}

// Calls

impl Net {
    fn lock(&self) -> MutexGuard<'_, NetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the lock, reporting its error through the status channel.
    fn run<T>(&self, f: impl FnOnce(&mut NetState) -> Result<T>) -> Result<T> {
        let mut state = self.lock();
        let res = f(&mut *state);
        if let Err(e) = &res {
            let msg = e.to_string();
            self.config.emit_status(&msg);
            state.last_error = msg;
        }
        res
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Text of the most recent error, empty if none occurred.
    pub fn last_error(&self) -> String {
        self.lock().last_error.clone()
    }

    pub fn has_begin_node(&self) -> bool {
        self.lock().begin.is_some()
    }

    pub fn has_end_node(&self) -> bool {
        self.lock().end.is_some()
    }

    /// Node names in declaration order.
    pub fn node_names(&self) -> Vec<String> {
        self.lock().arena.nodes.iter().map(|n| n.name.clone()).collect()
    }

    /// Node names in the order the forward pass visits them.
    pub fn execution_order(&self) -> Vec<String> {
        let state = self.lock();
        state
            .engine
            .order()
            .iter()
            .map(|&i| state.arena.nodes[i].name.clone())
            .collect()
    }

    /// One training step: forward in learning mode, target into EndNet's
    /// gradient, backward with `lr`.
    ///
    /// Returns the fraction of output elements within the configured
    /// tolerance of the target.
    pub fn training(
        &self,
        lr: f32,
        input_shape: Shape4,
        input: &[f32],
        output_shape: Shape4,
        output: &mut [f32],
        target: &[f32],
    ) -> Result<f32> {
        let tolerance = self.config.tolerance;
        self.run(|s| s.training(lr, input_shape, input, output_shape, output, target, tolerance))
    }

    /// Forward pass. `input` goes to BeginNet, EndNet's output is copied to
    /// `output` after its shape is checked against `output_shape`.
    pub fn forward(
        &self,
        is_learning: bool,
        input_shape: Shape4,
        input: &[f32],
        output_shape: Shape4,
        output: &mut [f32],
    ) -> Result<()> {
        self.run(|s| s.forward(is_learning, input_shape, input, output_shape, output))
    }

    /// Backward pass seeded with `grad` at EndNet. Weights are updated with
    /// learning rate `lr`.
    pub fn backward(&self, lr: f32, grad_shape: Shape4, grad: &[f32]) -> Result<()> {
        self.run(|s| s.backward(lr, grad_shape, grad))
    }

    pub fn set_weight_node(&self, name: &str, shape: Shape4, data: &[f32]) -> Result<()> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            s.arena.buffers[i].weight.set_data(shape, data)
        })
    }

    /// Copy a node's weights into `out`, resizing it. Returns their shape.
    pub fn get_weight_node(&self, name: &str, out: &mut Vec<f32>) -> Result<Shape4> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            Ok(s.arena.buffers[i].weight.read_into(out))
        })
    }

    pub fn set_batch_norm_node(&self, name: &str, bn: BatchNorm) -> Result<()> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            s.arena.ops[i].set_batch_norm(bn)
        })
    }

    pub fn get_batch_norm_node(&self, name: &str) -> Result<BatchNorm> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            Ok(s.arena.ops[i].batch_norm())
        })
    }

    /// Feed data to an Input node other than (or in addition to) BeginNet.
    pub fn set_input_node(&self, name: &str, shape: Shape4, data: &[f32]) -> Result<()> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            match s.arena.buffers[i].input.as_mut() {
                Some(input) => input.set_data(shape, data),
                None => Err(Error::RoleMismatch {
                    node: name.to_string(),
                    required: INPUT_OPERATOR,
                }),
            }
        })
    }

    pub fn get_output_node(&self, name: &str, out: &mut Vec<f32>) -> Result<Shape4> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            Ok(s.arena.buffers[i].output.read_into(out))
        })
    }

    /// Overwrite the gradient buffer of an Output node. The shape must equal
    /// the buffer's current shape.
    pub fn set_gradient_node(&self, name: &str, shape: Shape4, data: &[f32]) -> Result<()> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            if s.arena.nodes[i].operator != OUTPUT_OPERATOR {
                return Err(Error::RoleMismatch {
                    node: name.to_string(),
                    required: OUTPUT_OPERATOR,
                });
            }
            let gradient = &mut s.arena.buffers[i].gradient;
            check_shape("setGradientNode", name, gradient.shape(), shape)?;
            gradient.set_data(shape, data)
        })
    }

    pub fn get_gradient_node(&self, name: &str, out: &mut Vec<f32>) -> Result<Shape4> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            Ok(s.arena.buffers[i].gradient.read_into(out))
        })
    }

    /// Register a callback for `UserLayer` nodes naming it in `cbackName`.
    pub fn add_user_callback(&self, name: impl Into<String>, callback: impl UserCallback + 'static) {
        let name = name.into();
        tracing::debug!(callback = %name, "user callback registered");
        self.lock().callbacks.register(name, callback);
    }

    pub fn node_params(&self, name: &str) -> Result<OperatorParams> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            Ok(s.arena.nodes[i].params.clone())
        })
    }

    /// Replace a node's operator parameters. The operator may reject them,
    /// in which case nothing changes.
    pub fn set_node_params(&self, name: &str, params: OperatorParams) -> Result<()> {
        self.run(|s| {
            let i = s.arena.slot(name)?;
            s.arena.ops[i].set_params(&params)?;
            s.arena.nodes[i].params = params;
            Ok(())
        })
    }

    /// The net description, with current parameters, as JSON.
    pub fn architecture(&self) -> Result<String> {
        self.run(|s| {
            NetDescription {
                name: s.name.clone(),
                nodes: s.arena.nodes.clone(),
            }
            .to_json()
        })
    }

    /// Write all weights and batch-norm blocks to `path`.
    ///
    /// Record depth is `ch * batch`: a weight of shape `(w, h, ch, batch)`
    /// loads back with its data intact but shaped `(w, h, ch * batch, 1)`.
    pub fn save_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        self.run(|s| persist::save_records(path, &s.records()))
    }

    /// Load weights and batch-norm blocks from `path`.
    ///
    /// The whole file is read and checked before anything is installed.
    pub fn load_weights(&self, path: impl AsRef<Path>) -> Result<()> {
        let mode = self.config.load_mode;
        self.run(|s| {
            let records = persist::load_records(path)?;
            s.install(records, mode)
        })
    }

    /// Stream form of `save_weights`, with the same depth folding.
    pub fn write_weights(&self, writer: &mut impl Write) -> Result<()> {
        self.run(|s| persist::write_weights(writer, &s.records()))
    }

    /// Stream form of `load_weights`.
    pub fn read_weights(&self, reader: &mut impl BufRead) -> Result<()> {
        let mode = self.config.load_mode;
        self.run(|s| {
            let records = persist::read_weights(reader)?;
            s.install(records, mode)
        })
    }
}

impl NetState {
    fn forward(
        &mut self,
        is_learning: bool,
        input_shape: Shape4,
        input: &[f32],
        output_shape: Shape4,
        output: &mut [f32],
    ) -> Result<()> {
        if let Some(b) = self.begin {
            let buf = self.arena.buffers[b]
                .input
                .as_mut()
                .ok_or_else(|| Error::RoleMismatch {
                    node: BEGIN_NODE.to_string(),
                    required: INPUT_OPERATOR,
                })?;
            buf.set_data(input_shape, input)?;
        }

        self.engine.forward(
            &mut self.arena,
            &ExecParams::forward(is_learning),
            &self.callbacks,
        )?;

        if let Some(e) = self.end {
            let out = &self.arena.buffers[e].output;
            check_shape("forward", END_NODE, out.shape(), output_shape)?;
            copy_out(out, output)?;
        }
        Ok(())
    }

    fn backward(&mut self, lr: f32, grad_shape: Shape4, grad: &[f32]) -> Result<()> {
        if let Some(e) = self.end {
            let slot = &mut self.arena.buffers[e];
            check_shape("backward", END_NODE, slot.output.shape(), grad_shape)?;
            slot.gradient.set_data(grad_shape, grad)?;
        }
        self.engine
            .backward(&mut self.arena, &ExecParams::backward(lr), &self.callbacks)
    }

    #[allow(clippy::too_many_arguments)]
    fn training(
        &mut self,
        lr: f32,
        input_shape: Shape4,
        input: &[f32],
        output_shape: Shape4,
        output: &mut [f32],
        target: &[f32],
        tolerance: f32,
    ) -> Result<f32> {
        let end = self.end.ok_or(Error::EndNetNotFound)?;

        self.forward(true, input_shape, input, output_shape, output)?;
        self.arena.buffers[end]
            .gradient
            .set_data(output_shape, target)?;
        self.engine
            .backward(&mut self.arena, &ExecParams::backward(lr), &self.callbacks)?;

        let n = output_shape.elem_count();
        if n == 0 {
            return Ok(0.0);
        }
        let hits = output[..n]
            .iter()
            .zip(&target[..n])
            .filter(|(o, t)| (*o - *t).abs() < tolerance)
            .count();
        Ok(hits as f32 / n as f32)
    }

    /// Records for every non-empty weight and batch-norm block, in
    /// declaration order.
    fn records(&self) -> Vec<WeightRecord> {
        let mut records = Vec::new();
        for (i, node) in self.arena.nodes.iter().enumerate() {
            let weight = &self.arena.buffers[i].weight;
            if !weight.is_empty() {
                records.push(WeightRecord::weight(&node.name, weight));
            }
            let bn = self.arena.ops[i].batch_norm();
            if !bn.is_empty() {
                records.extend(WeightRecord::batch_norm(&node.name, &bn));
            }
        }
        records
    }

    fn install(&mut self, records: Vec<WeightRecord>, mode: LoadMode) -> Result<()> {
        for rec in &records {
            self.arena.slot(&rec.node)?;
        }
        let set = persist::assemble(records, mode)?;

        // Batch-norm blocks can be refused by their operator; undo the ones
        // already installed if that happens.
        let mut installed: Vec<(usize, BatchNorm)> = Vec::new();
        for (node, bn) in set.batch_norms {
            let i = self.arena.slot(&node)?;
            let previous = self.arena.ops[i].batch_norm();
            if let Err(e) = self.arena.ops[i].set_batch_norm(bn) {
                for (j, old) in installed.into_iter().rev() {
                    if let Err(undo) = self.arena.ops[j].set_batch_norm(old) {
                        tracing::warn!(error = %undo, "failed to restore batch-norm block");
                    }
                }
                return Err(e);
            }
            installed.push((i, previous));
        }

        let weights = set.weights.len();
        for (node, tensor) in set.weights {
            let i = self.arena.slot(&node)?;
            self.arena.buffers[i].weight = tensor;
        }
        tracing::debug!(weights, batch_norms = installed.len(), "weights installed");
        Ok(())
    }
}

/// Strict four-dimension shape check. `actual` is the node's true shape.
fn check_shape(context: &'static str, node: &str, actual: Shape4, given: Shape4) -> Result<()> {
    if actual != given {
        return Err(Error::ShapeMismatch {
            context,
            node: node.to_string(),
            expected: actual,
            got: given,
        });
    }
    Ok(())
}

fn copy_out(src: &Tensor, dst: &mut [f32]) -> Result<()> {
    let n = src.elem_count();
    if dst.len() < n {
        return Err(Error::ElementCountMismatch {
            shape: src.shape(),
            expected: n,
            got: dst.len(),
        });
    }
    dst[..n].copy_from_slice(src.data());
    Ok(())
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Net")
            .field("name", &state.name)
            .field("nodes", &state.arena.len())
            .field("callbacks", &state.callbacks)
            .field("config", &self.config)
            .finish()
    }
}
