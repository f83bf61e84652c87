use ndarray::{Array1, ArrayView1};

/// Trait defining the interface for loss functions
pub trait Loss: Send + Sync {
    /// Compute the mean loss over a batch of predictions and targets
    fn compute(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> f32;

    /// Compute the gradient of the mean loss with respect to predictions
    fn gradient(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Array1<f32>;
}

/// Huber loss (smooth L1)
///
/// Quadratic for `|x| <= delta`, linear beyond, averaged over the batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HuberLoss {
    pub delta: f32,
}

impl HuberLoss {
    pub fn new(delta: f32) -> Self {
        HuberLoss { delta }
    }

    /// Smooth L1 is Huber with `delta = 1`
    pub fn smooth_l1() -> Self {
        Self::new(1.0)
    }
}

impl Default for HuberLoss {
    fn default() -> Self {
        Self::smooth_l1()
    }
}

impl Loss for HuberLoss {
    fn compute(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> f32 {
        if prediction.is_empty() {
            return 0.0;
        }
        let diff = &prediction - &target;
        diff.mapv(|x| {
            let abs_x = x.abs();
            if abs_x <= self.delta {
                0.5 * x * x
            } else {
                self.delta * abs_x - 0.5 * self.delta * self.delta
            }
        }).sum() / prediction.len() as f32
    }

    fn gradient(&self, prediction: ArrayView1<f32>, target: ArrayView1<f32>) -> Array1<f32> {
        if prediction.is_empty() {
            return Array1::zeros(0);
        }
        let diff = &prediction - &target;
        diff.mapv(|x| {
            if x.abs() <= self.delta {
                x
            } else {
                self.delta * x.signum()
            }
        }) / prediction.len() as f32
    }
}
