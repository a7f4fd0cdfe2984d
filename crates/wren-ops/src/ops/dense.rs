// FullyConnected — dense layer over the flattened sample
//
// PARAMETERS:
//   units       number of outputs per sample (required)
//   bias        add a learnt bias row (default: true)
//   weightInit  xavier | he | zero | <constant> (default: xavier)
//
// WEIGHT LAYOUT (net-owned weight buffer):
//
//   shape (in + bias, units, 1, 1), width fastest, so row u holds the
//   weights of output unit u followed by its bias:
//
//     out[n][u] = Σ_i W[u][i] * x[n][i]  (+ W[u][in])
//
// The weight buffer is initialized on the first forward pass if it is still
// empty. A non-empty buffer of the wrong shape is a shape-contract error.
//
// SHAPES:
//   Input:  (w, h, ch, N)  — flattened to in = w*h*ch
//   Output: (units, 1, 1, N)

use rayon::prelude::*;

use wren_core::error::{Error, Result};
use wren_core::{Node, OperatorParams, Shape4, Tensor};

use super::{param_or, param_required};
use crate::init::WeightInit;
use crate::operator::{BackwardCtx, ForwardCtx, Operator};

const KIND: &str = "FullyConnected";

/// A fully-connected layer.
#[derive(Debug, Clone)]
pub struct FullyConnected {
    units: usize,
    bias: bool,
    init: WeightInit,
}

impl FullyConnected {
    pub fn new(units: usize, bias: bool) -> Self {
        FullyConnected {
            units,
            bias,
            init: WeightInit::default(),
        }
    }

    pub fn from_node(node: &Node) -> Result<Self> {
        let mut op = FullyConnected::new(0, true);
        op.apply(&node.params)?;
        Ok(op)
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn has_bias(&self) -> bool {
        self.bias
    }

    /// Weight shape for a given flattened input size.
    pub fn weight_shape(&self, in_size: usize) -> Shape4 {
        Shape4::new(in_size + usize::from(self.bias), self.units, 1, 1)
    }

    fn apply(&mut self, params: &OperatorParams) -> Result<()> {
        let units: usize = param_required(params, KIND, "units")?;
        if units == 0 {
            return Err(Error::msg(format!("{KIND}: 'units' must be positive")));
        }
        self.units = units;
        self.bias = param_or(params, KIND, "bias", true)?;
        self.init = match params.get("weightInit") {
            Some(s) => WeightInit::parse(s)?,
            None => WeightInit::default(),
        };
        Ok(())
    }

    fn check_weight(&self, node: &str, weight: &Tensor, in_size: usize) -> Result<()> {
        let expected = self.weight_shape(in_size);
        if weight.shape() != expected {
            return Err(Error::ShapeMismatch {
                context: "weight",
                node: node.to_string(),
                expected,
                got: weight.shape(),
            });
        }
        Ok(())
    }
}

impl Operator for FullyConnected {
    fn kind(&self) -> &str {
        KIND
    }

    fn forward(&mut self, ctx: ForwardCtx<'_>) -> Result<()> {
        let x = ctx.single_input()?;
        let in_size = x.shape().sample_size();
        if in_size == 0 {
            return Err(Error::msg(format!("node '{}': empty input", ctx.node)));
        }
        if ctx.weight.is_empty() {
            let shape = self.weight_shape(in_size);
            *ctx.weight = self.init.init(shape, in_size, self.units);
            tracing::debug!(node = ctx.node, %shape, "initialized weights");
        }
        self.check_weight(ctx.node, ctx.weight, in_size)?;

        let units = self.units;
        let rows = in_size + usize::from(self.bias);
        let bias = self.bias;
        let w = ctx.weight.data();
        ctx.output.resize(Shape4::new(units, 1, 1, x.shape().batch));
        ctx.output
            .data_mut()
            .par_chunks_mut(units)
            .zip(x.data().par_chunks(in_size))
            .for_each(|(out, xi)| {
                for (u, o) in out.iter_mut().enumerate() {
                    let row = &w[u * rows..(u + 1) * rows];
                    let mut acc = if bias { row[in_size] } else { 0.0 };
                    for (wi, xv) in row[..in_size].iter().zip(xi) {
                        acc += wi * xv;
                    }
                    *o = acc;
                }
            });
        Ok(())
    }

    fn backward(&mut self, ctx: BackwardCtx<'_>) -> Result<()> {
        let x = ctx.single_input()?;
        let g = ctx.incoming_grad()?;
        let in_size = x.shape().sample_size();
        if in_size == 0 {
            return Err(Error::msg(format!("node '{}': empty input", ctx.node)));
        }
        self.check_weight(ctx.node, ctx.weight, in_size)?;

        let units = self.units;
        let rows = in_size + usize::from(self.bias);

        // Input gradient with the weights the forward pass used.
        let mut dx = Tensor::zeros(x.shape());
        {
            let w = ctx.weight.data();
            dx.data_mut()
                .par_chunks_mut(in_size)
                .zip(g.data().par_chunks(units))
                .for_each(|(dxi, gi)| {
                    for (u, gu) in gi.iter().enumerate() {
                        let row = &w[u * rows..u * rows + in_size];
                        for (d, wi) in dxi.iter_mut().zip(row) {
                            *d += gu * wi;
                        }
                    }
                });
        }

        if ctx.params.is_learning {
            let batch = x.shape().batch.max(1);
            let lr = ctx.params.learning_rate / batch as f32;
            let w = ctx.weight.data_mut();
            for (xi, gi) in x.samples().zip(g.samples()) {
                for (u, gu) in gi.iter().enumerate() {
                    let row = &mut w[u * rows..(u + 1) * rows];
                    for (wv, xv) in row[..in_size].iter_mut().zip(xi) {
                        *wv -= lr * gu * xv;
                    }
                    if self.bias {
                        row[in_size] -= lr * gu;
                    }
                }
            }
        }

        *ctx.gradient = dx;
        Ok(())
    }

    fn set_params(&mut self, params: &OperatorParams) -> Result<()> {
        self.apply(params)
    }
}
