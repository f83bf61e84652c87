use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};
use crate::activations::Activation;
use crate::error::{Result, ShipError};
use crate::layers::initialization::WeightInit;

/// A fully connected (dense) layer in a neural network
#[derive(Serialize, Deserialize, Clone)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    #[serde(skip)]
    pre_activation_output: Option<Array2<f32>>,
    #[serde(skip)]
    inputs: Option<Array2<f32>>,
}

/// Gradients produced by [`DenseLayer::backward_batch`]
pub struct DenseGradients {
    pub input: Array2<f32>,
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

impl DenseLayer {
    /// Create a new dense layer with the given input size, output size, and activation function.
    /// Weights are drawn from `rng` with the initializer recommended for the activation;
    /// biases start at zero.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, activation: Activation, rng: &mut R) -> Result<Self> {
        if input_size == 0 || output_size == 0 {
            return Err(ShipError::configuration(
                "layer_size".to_string(),
                format!("dense layer {} -> {} must have positive sizes", input_size, output_size),
            ));
        }
        let weights = WeightInit::for_activation(&activation)
            .initialize((input_size, output_size), input_size, output_size, rng)?;
        Ok(DenseLayer {
            weights,
            biases: Array1::zeros(output_size),
            activation,
            pre_activation_output: None,
            inputs: None,
        })
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape()[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape()[1]
    }

    /// Forward pass for a batch of input rows
    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        if inputs.ncols() != self.input_size() {
            return Err(ShipError::dimension_mismatch(
                format!("{} input features", self.input_size()),
                format!("{} input features", inputs.ncols()),
            ));
        }
        let pre_activation = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        let mut outputs = pre_activation.clone();
        self.activation.apply(&mut outputs);

        self.inputs = Some(inputs.to_owned());
        self.pre_activation_output = Some(pre_activation);
        Ok(outputs)
    }

    /// Backward pass given the gradient of the loss w.r.t. this layer's outputs
    pub fn backward_batch(&self, output_errors: ArrayView2<f32>) -> Result<DenseGradients> {
        let (pre_activation_output, inputs) = match (self.pre_activation_output.as_ref(), self.inputs.as_ref()) {
            (Some(z), Some(x)) => (z, x),
            _ => {
                return Err(ShipError::Training(
                    "forward_batch() must be called before backward_batch()".to_string(),
                ))
            }
        };
        if output_errors.dim() != pre_activation_output.dim() {
            return Err(ShipError::dimension_mismatch(
                format!("{:?}", pre_activation_output.dim()),
                format!("{:?}", output_errors.dim()),
            ));
        }

        let adjusted_error = &output_errors * &self.activation.derivative(pre_activation_output);
        Ok(DenseGradients {
            input: adjusted_error.dot(&self.weights.t()),
            weights: inputs.t().dot(&adjusted_error),
            biases: adjusted_error.sum_axis(Axis(0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_dense_forward() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = DenseLayer::new(2, 2, Activation::Linear, &mut rng).unwrap();
        layer.weights = array![[1.0, 2.0], [3.0, 4.0]];
        layer.biases = array![0.5, -0.5];
        let out = layer.forward_batch(array![[1.0, 1.0]].view()).unwrap();
        assert_eq!(out, array![[4.5, 5.5]]);
    }

    #[test]
    fn test_dense_backward_relu_masks_gradient() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = DenseLayer::new(2, 2, Activation::Relu, &mut rng).unwrap();
        layer.weights = array![[1.0, -1.0], [1.0, -1.0]];
        layer.forward_batch(array![[1.0, 2.0]].view()).unwrap();
        let grads = layer.backward_batch(array![[1.0, 1.0]].view()).unwrap();

        // second unit is inactive (pre-activation -3), so its column gets no gradient
        assert_eq!(grads.weights, array![[1.0, 0.0], [2.0, 0.0]]);
        assert_eq!(grads.biases, array![1.0, 0.0]);
        assert_eq!(grads.input, array![[1.0, 1.0]]);
    }

    #[test]
    fn test_dense_rejects_wrong_width() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layer = DenseLayer::new(3, 2, Activation::Relu, &mut rng).unwrap();
        assert!(layer.forward_batch(array![[1.0, 2.0]].view()).is_err());
    }
}
