// init — weight initialization for operators that own weights
//
// AVAILABLE INITIALIZERS:
//
//   xavier(fan_in, fan_out)  — U(-a, a), a = sqrt(6 / (fan_in + fan_out))
//   he(fan_in)               — N(0, std), std = sqrt(2 / fan_in)
//   constant(value)          — every element = value
//
// Selected per node through the `weightInit` parameter.

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use wren_core::error::{Error, Result};
use wren_core::{Shape4, Tensor};

/// Weight initialization strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum WeightInit {
    /// Glorot uniform.
    #[default]
    Xavier,
    /// Kaiming normal, suited to ReLU layers.
    He,
    /// Every weight equal to a constant.
    Constant(f32),
}

impl WeightInit {
    /// Parse the `weightInit` parameter value.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "xavier" => Ok(WeightInit::Xavier),
            "he" => Ok(WeightInit::He),
            "zero" => Ok(WeightInit::Constant(0.0)),
            other => other
                .parse::<f32>()
                .map(WeightInit::Constant)
                .map_err(|_| Error::msg(format!("unknown weightInit '{other}'"))),
        }
    }

    /// Create a freshly initialized weight tensor.
    pub fn init(&self, shape: Shape4, fan_in: usize, fan_out: usize) -> Tensor {
        let mut t = Tensor::zeros(shape);
        let mut rng = rand::thread_rng();
        match *self {
            WeightInit::Xavier => {
                let a = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                let dist = Uniform::new_inclusive(-a, a);
                t.data_mut().iter_mut().for_each(|v| *v = dist.sample(&mut rng));
            }
            WeightInit::He => {
                let std = (2.0 / fan_in.max(1) as f32).sqrt();
                match Normal::new(0.0f32, std) {
                    Ok(dist) => t.data_mut().iter_mut().for_each(|v| *v = dist.sample(&mut rng)),
                    Err(_) => t
                        .data_mut()
                        .iter_mut()
                        .for_each(|v| *v = rng.gen_range(-std..=std)),
                }
            }
            WeightInit::Constant(c) => t.fill(c),
        }
        t
    }
}
