//! Gradient-descent optimizers for the online network.
//!
//! Parameters are handed over as a list of dynamic-dimensional views, one
//! per tensor, always in the same order (see [`crate::network::QNetwork::parameters_mut`]).
//! Stateful optimizers keep one moment slot per tensor in that order.
//! The learning rate is passed on every step, so it always comes from the
//! agent's current hyperparameters.

use ndarray::{ArrayD, ArrayViewMutD, IxDyn, Zip};
use serde::{Serialize, Deserialize};
use crate::error::{Result, ShipError};

pub trait Optimizer {
    /// Apply one update to `params` given `gradients` of the same shapes
    fn step(&mut self, params: Vec<ArrayViewMutD<f32>>, gradients: &[ArrayD<f32>], learning_rate: f32) -> Result<()>;

    /// Drop any accumulated state
    fn reset(&mut self);
}

fn check_shapes(params: &[ArrayViewMutD<f32>], gradients: &[ArrayD<f32>]) -> Result<()> {
    if params.len() != gradients.len() {
        return Err(ShipError::dimension_mismatch(
            format!("{} gradient tensors", params.len()),
            format!("{} gradient tensors", gradients.len()),
        ));
    }
    for (param, grad) in params.iter().zip(gradients) {
        if param.shape() != grad.shape() {
            return Err(ShipError::dimension_mismatch(
                format!("{:?}", param.shape()),
                format!("{:?}", grad.shape()),
            ));
        }
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum OptimizerWrapper {
    SGD(SGD),
    Adam(Adam),
}

impl OptimizerWrapper {
    /// Whether the accumulated state fits a network with these parameter shapes
    pub fn is_compatible(&self, shapes: &[Vec<usize>]) -> bool {
        match self {
            OptimizerWrapper::SGD(_) => true,
            OptimizerWrapper::Adam(optimizer) => optimizer.is_compatible(shapes),
        }
    }
}

impl Optimizer for OptimizerWrapper {
    fn step(&mut self, params: Vec<ArrayViewMutD<f32>>, gradients: &[ArrayD<f32>], learning_rate: f32) -> Result<()> {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.step(params, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.step(params, gradients, learning_rate),
        }
    }

    fn reset(&mut self) {
        match self {
            OptimizerWrapper::SGD(optimizer) => optimizer.reset(),
            OptimizerWrapper::Adam(optimizer) => optimizer.reset(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct SGD;

impl SGD {
    pub fn new() -> SGD {
        SGD
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: Vec<ArrayViewMutD<f32>>, gradients: &[ArrayD<f32>], learning_rate: f32) -> Result<()> {
        check_shapes(&params, gradients)?;
        for (param, grad) in params.into_iter().zip(gradients) {
            Zip::from(param).and(grad).for_each(|p, &g| *p -= learning_rate * g);
        }
        Ok(())
    }

    fn reset(&mut self) {}
}

/// Adam with bias-corrected first and second moments
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m: Vec<ArrayD<f32>>,
    v: Vec<ArrayD<f32>>,
    /// Number of steps taken so far
    pub t: u64,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    fn is_compatible(&self, shapes: &[Vec<usize>]) -> bool {
        self.m.is_empty()
            || (self.m.len() == shapes.len()
                && self.m.iter().zip(shapes).all(|(m, shape)| m.shape() == shape.as_slice()))
    }

    fn ensure_slots(&mut self, params: &[ArrayViewMutD<f32>]) {
        let shapes = params.iter().map(|p| p.shape().to_vec()).collect::<Vec<_>>();
        if self.m.is_empty() || !self.is_compatible(&shapes) {
            self.m = shapes.iter().map(|s| ArrayD::zeros(IxDyn(s))).collect();
            self.v = shapes.iter().map(|s| ArrayD::zeros(IxDyn(s))).collect();
            self.t = 0;
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<ArrayViewMutD<f32>>, gradients: &[ArrayD<f32>], learning_rate: f32) -> Result<()> {
        check_shapes(&params, gradients)?;
        self.ensure_slots(&params);
        self.t += 1;

        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let t = self.t.min(i32::MAX as u64) as i32;
        let bias_correction1 = 1.0 - beta1.powi(t);
        let bias_correction2 = 1.0 - beta2.powi(t);

        for ((param, grad), (m, v)) in params
            .into_iter()
            .zip(gradients)
            .zip(self.m.iter_mut().zip(self.v.iter_mut()))
        {
            Zip::from(param).and(grad).and(m).and(v).for_each(|p, &g, m, v| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bias_correction1;
                let v_hat = *v / bias_correction2;
                *p -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
            });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.m.clear();
        self.v.clear();
        self.t = 0;
    }
}
