use serde::{Serialize, Deserialize};
use std::f64::consts::{E, PI};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivationFunction {
    Sigmoid,
    ReLU,
    Identity,
    /// Softmax is a vector-valued activation; see [`ActivationFunction::apply`].
    Softmax,
    Tanh,
    LeakyReLU { alpha: f64 },
    Elu { alpha: f64 },
    Gelu,
    Swish,
}

impl ActivationFunction {
    /// Applies the activation to a whole pre-activation vector.
    ///
    /// Softmax is shifted by the maximum before exponentiation so large logits
    /// do not overflow; the result sums to 1.
    pub fn apply(&self, z: Vec<f64>) -> Vec<f64> {
        match self {
            ActivationFunction::Softmax => {
                let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = z.iter().map(|&x| (x - max).exp()).collect();
                let sum: f64 = exps.iter().sum();
                exps.into_iter().map(|e| e / sum).collect()
            }
            _ => z.into_iter().map(|x| self.function(x)).collect(),
        }
    }

    /// Element-wise activation. `Softmax` has no element-wise form and is
    /// treated as identity here; [`apply`](Self::apply) handles it.
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + E.powf(-x)),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity | ActivationFunction::Softmax => x,
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Elu { alpha } => {
                if x > 0.0 { x } else { alpha * (E.powf(x) - 1.0) }
            }
            ActivationFunction::Gelu => {
                let c = (2.0_f64 / PI).sqrt();
                0.5 * x * (1.0 + (c * (x + 0.044715 * x.powi(3))).tanh())
            }
            ActivationFunction::Swish => x / (1.0 + E.powf(-x)),
        }
    }

    /// True when the output of this activation is a probability vector.
    pub fn yields_probabilities(&self) -> bool {
        matches!(self, ActivationFunction::Softmax | ActivationFunction::Sigmoid)
    }
}
