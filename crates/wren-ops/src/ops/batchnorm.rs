// BatchNorm — per-feature normalization across the batch
//
// PARAMETERS:
//   momentum  running-statistics update rate (default: 0.1)
//   eps       variance floor (default: 1e-5)
//
// Features are the elements of one sample, (w, h, ch); statistics are taken
// over the N samples of the batch. The block lives in the operator and is
// exposed through `batch_norm` / `set_batch_norm` so it can be persisted.
//
// TRAINING (is_learning):
//   μ, σ² from the batch
//   running_μ  ← (1 - m)·running_μ  + m·μ
//   running_σ² ← (1 - m)·running_σ² + m·σ²
//
// INFERENCE:
//   μ, σ² = running statistics
//
//   x̂ = (x - μ) / sqrt(σ² + eps),   y = γ·x̂ + β
//
// BACKWARD (batch statistics):
//   dx = γ·inv_std / N · (N·g - Σg - x̂·Σ(g·x̂))
// and dx = γ·inv_std·g when the forward pass ran on running statistics.

use wren_core::error::{Error, Result};
use wren_core::{BatchNorm, Node, OperatorParams, Shape4, Tensor};

use super::param_or;
use crate::operator::{BackwardCtx, ForwardCtx, Operator};

const KIND: &str = "BatchNorm";

#[derive(Debug, Clone)]
pub struct BatchNormOp {
    momentum: f32,
    eps: f32,
    block: BatchNorm,
    // Forward cache
    xhat: Vec<f32>,
    inv_std: Vec<f32>,
    batch_stats: bool,
}

impl Default for BatchNormOp {
    fn default() -> Self {
        BatchNormOp {
            momentum: 0.1,
            eps: 1e-5,
            block: BatchNorm::default(),
            xhat: Vec::new(),
            inv_std: Vec::new(),
            batch_stats: false,
        }
    }
}

impl BatchNormOp {
    pub fn from_node(node: &Node) -> Result<Self> {
        let mut op = BatchNormOp::default();
        op.set_params(&node.params)?;
        Ok(op)
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn eps(&self) -> f32 {
        self.eps
    }

    fn ensure_block(&mut self, node: &str, x: Shape4) -> Result<()> {
        let features = x.sample_size();
        if self.block.is_empty() {
            self.block = BatchNorm::new(x.with_batch(1));
            tracing::debug!(node, shape = %self.block.shape, "initialized batch-norm block");
        } else if self.block.len() != features {
            return Err(Error::ShapeMismatch {
                context: "batch-norm",
                node: node.to_string(),
                expected: x.with_batch(1),
                got: self.block.shape,
            });
        }
        Ok(())
    }
}

impl Operator for BatchNormOp {
    fn kind(&self) -> &str {
        KIND
    }

    fn forward(&mut self, ctx: ForwardCtx<'_>) -> Result<()> {
        let x = ctx.single_input()?;
        let shape = x.shape();
        self.ensure_block(ctx.node, shape)?;

        let features = shape.sample_size();
        let n = shape.batch.max(1);
        let learning = ctx.params.is_learning;

        let (mean, var) = if learning {
            let mut mean = vec![0.0f32; features];
            for s in x.samples() {
                for (m, v) in mean.iter_mut().zip(s) {
                    *m += v;
                }
            }
            mean.iter_mut().for_each(|m| *m /= n as f32);
            let mut var = vec![0.0f32; features];
            for s in x.samples() {
                for ((acc, v), m) in var.iter_mut().zip(s).zip(&mean) {
                    *acc += (v - m) * (v - m);
                }
            }
            var.iter_mut().for_each(|v| *v /= n as f32);

            let m = self.momentum;
            for i in 0..features {
                self.block.mean[i] = (1.0 - m) * self.block.mean[i] + m * mean[i];
                self.block.variance[i] = (1.0 - m) * self.block.variance[i] + m * var[i];
            }
            (mean, var)
        } else {
            (self.block.mean.clone(), self.block.variance.clone())
        };

        self.inv_std = var.iter().map(|v| 1.0 / (v + self.eps).sqrt()).collect();
        self.xhat.clear();
        self.xhat.reserve(x.elem_count());
        for s in x.samples() {
            for i in 0..features {
                self.xhat.push((s[i] - mean[i]) * self.inv_std[i]);
            }
        }
        self.batch_stats = learning;

        ctx.output.resize(shape);
        let out = ctx.output.data_mut();
        for (k, (o, xh)) in out.iter_mut().zip(&self.xhat).enumerate() {
            let i = k % features;
            *o = self.block.scale[i] * xh + self.block.shift[i];
        }
        Ok(())
    }

    fn backward(&mut self, ctx: BackwardCtx<'_>) -> Result<()> {
        let g = ctx.incoming_grad()?;
        let shape = ctx.output.shape();
        let features = shape.sample_size();
        if self.xhat.len() != g.elem_count() || self.inv_std.len() != features {
            return Err(Error::msg(format!(
                "node '{}': backward called without a matching forward pass",
                ctx.node
            )));
        }
        let n = shape.batch.max(1);

        let mut sum_g = vec![0.0f32; features];
        let mut sum_gx = vec![0.0f32; features];
        for (k, (gv, xh)) in g.data().iter().zip(&self.xhat).enumerate() {
            let i = k % features;
            sum_g[i] += gv;
            sum_gx[i] += gv * xh;
        }

        let mut dx = Tensor::zeros(shape);
        for (k, (d, (gv, xh))) in dx
            .data_mut()
            .iter_mut()
            .zip(g.data().iter().zip(&self.xhat))
            .enumerate()
        {
            let i = k % features;
            let a = self.block.scale[i] * self.inv_std[i];
            *d = if self.batch_stats {
                a / n as f32 * (n as f32 * gv - sum_g[i] - xh * sum_gx[i])
            } else {
                a * gv
            };
        }

        if ctx.params.is_learning {
            let lr = ctx.params.learning_rate / n as f32;
            for i in 0..features {
                self.block.scale[i] -= lr * sum_gx[i];
                self.block.shift[i] -= lr * sum_g[i];
            }
        }

        *ctx.gradient = dx;
        Ok(())
    }

    fn batch_norm(&self) -> BatchNorm {
        self.block.clone()
    }

    fn set_batch_norm(&mut self, bn: BatchNorm) -> Result<()> {
        bn.validate()?;
        if !self.block.is_empty() && !bn.is_empty() && bn.len() != self.block.len() {
            return Err(Error::msg(format!(
                "batch-norm block of {} elements does not fit {} features",
                bn.len(),
                self.block.len()
            )));
        }
        self.block = bn;
        Ok(())
    }

    fn set_params(&mut self, params: &OperatorParams) -> Result<()> {
        let momentum: f32 = param_or(params, KIND, "momentum", 0.1)?;
        let eps: f32 = param_or(params, KIND, "eps", 1e-5)?;
        if !(0.0..=1.0).contains(&momentum) || eps <= 0.0 {
            return Err(Error::msg(format!(
                "{KIND}: momentum must be in [0, 1] and eps positive"
            )));
        }
        self.momentum = momentum;
        self.eps = eps;
        Ok(())
    }
}
