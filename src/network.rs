//! The convolutional action-value approximator and its online/target pair.
//!
//! ```text
//! input (c, 84, 84)
//!   -> conv 8x8 /4, 32 + relu -> conv 4x4 /2, 64 + relu -> conv 3x3 /1, 64 + relu
//!   -> flatten (3136) -> dense 512 + relu -> dense action_dim
//! ```

use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayView4, ArrayViewD, ArrayViewMutD, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};
use crate::activations::Activation;
use crate::error::{Result, ShipError};
use crate::layers::{Conv2DLayer, DenseLayer};

/// Required input height and width
pub const FRAME_SIZE: usize = 84;

/// Shape of one observation: `(channels, height, width)`
pub type StateDim = (usize, usize, usize);

/// Selects which parameter set a forward pass runs through
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Model {
    Online,
    Target,
}

/// Index of the largest value, first one on ties
pub fn argmax(values: ArrayView1<f32>) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Convolutional Q-network mapping a batch of frames to one value per action
#[derive(Serialize, Deserialize, Clone)]
pub struct QNetwork {
    pub convs: Vec<Conv2DLayer>,
    pub dense: Vec<DenseLayer>,
    state_dim: StateDim,
    action_dim: usize,
}

impl QNetwork {
    /// Build the network for `state_dim` inputs and `action_dim` outputs.
    ///
    /// Fails with a configuration error unless height and width are 84.
    pub fn new<R: Rng + ?Sized>(state_dim: StateDim, action_dim: usize, rng: &mut R) -> Result<Self> {
        let (channels, height, width) = state_dim;
        if height != FRAME_SIZE {
            return Err(ShipError::configuration(
                "state_dim".to_string(),
                format!("expecting input height: {}, got: {}", FRAME_SIZE, height),
            ));
        }
        if width != FRAME_SIZE {
            return Err(ShipError::configuration(
                "state_dim".to_string(),
                format!("expecting input width: {}, got: {}", FRAME_SIZE, width),
            ));
        }
        if channels == 0 || action_dim == 0 {
            return Err(ShipError::configuration(
                "state_dim".to_string(),
                format!("channels ({}) and action_dim ({}) must be positive", channels, action_dim),
            ));
        }

        let convs = vec![
            Conv2DLayer::new(channels, 32, (8, 8), (4, 4), Activation::Relu, rng)?,
            Conv2DLayer::new(32, 64, (4, 4), (2, 2), Activation::Relu, rng)?,
            Conv2DLayer::new(64, 64, (3, 3), (1, 1), Activation::Relu, rng)?,
        ];

        let (mut h, mut w) = (height, width);
        for conv in &convs {
            let (oh, ow) = conv.output_dim(h, w).ok_or_else(|| {
                ShipError::configuration("state_dim".to_string(), format!("{}x{} frame too small", height, width))
            })?;
            h = oh;
            w = ow;
        }
        let flat = convs[convs.len() - 1].out_channels * h * w;

        let dense = vec![
            DenseLayer::new(flat, 512, Activation::Relu, rng)?,
            DenseLayer::new(512, action_dim, Activation::Linear, rng)?,
        ];

        Ok(QNetwork { convs, dense, state_dim, action_dim })
    }

    pub fn state_dim(&self) -> StateDim {
        self.state_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Forward pass for a batch `(batch, c, 84, 84)`, returning `(batch, action_dim)`
    pub fn forward_batch(&mut self, input: ArrayView4<f32>) -> Result<Array2<f32>> {
        let (_, c, h, w) = input.dim();
        if (c, h, w) != self.state_dim {
            return Err(ShipError::dimension_mismatch(
                format!("{:?}", self.state_dim),
                format!("{:?}", (c, h, w)),
            ));
        }

        let mut features = input.to_owned();
        for conv in self.convs.iter_mut() {
            features = conv.forward_batch(features.view())?;
        }

        let batch_size = features.dim().0;
        let flat_size = features.len() / batch_size.max(1);
        let mut output = features.into_shape((batch_size, flat_size))?;
        for layer in self.dense.iter_mut() {
            output = layer.forward_batch(output.view())?;
        }
        Ok(output)
    }

    /// Forward pass for a single frame stack `(c, 84, 84)`
    pub fn forward(&mut self, state: ndarray::ArrayView3<f32>) -> Result<Array1<f32>> {
        let output = self.forward_batch(state.insert_axis(Axis(0)))?;
        Ok(output.index_axis_move(Axis(0), 0))
    }

    /// Backpropagate `output_grad` (w.r.t. the outputs of the last forward pass).
    ///
    /// Returns one gradient per parameter tensor in [`QNetwork::parameters`] order.
    pub fn backward(&self, output_grad: ArrayView2<f32>) -> Result<Vec<ArrayD<f32>>> {
        let mut dense_grads = Vec::with_capacity(self.dense.len());
        let mut error = output_grad.to_owned();
        for layer in self.dense.iter().rev() {
            let grads = layer.backward_batch(error.view())?;
            error = grads.input;
            dense_grads.push((grads.weights, grads.biases));
        }
        dense_grads.reverse();

        let last_conv = &self.convs[self.convs.len() - 1];
        let batch_size = error.nrows();
        let (_, height, width) = self.state_dim;
        let (mut h, mut w) = (height, width);
        for conv in &self.convs {
            if let Some((oh, ow)) = conv.output_dim(h, w) {
                h = oh;
                w = ow;
            }
        }
        let mut map_error = error.into_shape((batch_size, last_conv.out_channels, h, w))?;

        let mut conv_grads = Vec::with_capacity(self.convs.len());
        for conv in self.convs.iter().rev() {
            let grads = conv.backward_batch(map_error.view())?;
            map_error = grads.input;
            conv_grads.push((grads.kernels, grads.biases));
        }
        conv_grads.reverse();

        let mut gradients = Vec::with_capacity(2 * (self.convs.len() + self.dense.len()));
        for (kernels, biases) in conv_grads {
            gradients.push(kernels.into_dyn());
            gradients.push(biases.into_dyn());
        }
        for (weights, biases) in dense_grads {
            gradients.push(weights.into_dyn());
            gradients.push(biases.into_dyn());
        }
        Ok(gradients)
    }

    /// Read-only views of every parameter tensor, convolutions first, each as (weights, biases)
    pub fn parameters(&self) -> Vec<ArrayViewD<f32>> {
        let mut params = Vec::with_capacity(2 * (self.convs.len() + self.dense.len()));
        for conv in &self.convs {
            params.push(conv.kernels.view().into_dyn());
            params.push(conv.biases.view().into_dyn());
        }
        for layer in &self.dense {
            params.push(layer.weights.view().into_dyn());
            params.push(layer.biases.view().into_dyn());
        }
        params
    }

    /// Mutable views of every parameter tensor, same order as [`QNetwork::parameters`]
    pub fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<f32>> {
        let mut params = Vec::with_capacity(2 * (self.convs.len() + self.dense.len()));
        for conv in self.convs.iter_mut() {
            params.push(conv.kernels.view_mut().into_dyn());
            params.push(conv.biases.view_mut().into_dyn());
        }
        for layer in self.dense.iter_mut() {
            params.push(layer.weights.view_mut().into_dyn());
            params.push(layer.biases.view_mut().into_dyn());
        }
        params
    }

    pub fn parameter_shapes(&self) -> Vec<Vec<usize>> {
        self.parameters().iter().map(|p| p.shape().to_vec()).collect()
    }

    /// Owned copies of all parameters, for checkpoints
    pub fn export_parameters(&self) -> Vec<ArrayD<f32>> {
        self.parameters().into_iter().map(|p| p.to_owned()).collect()
    }

    /// Check that `values` could replace this network's parameters
    pub fn check_parameters(&self, values: &[ArrayD<f32>]) -> Result<()> {
        let shapes = self.parameter_shapes();
        if shapes.len() != values.len() {
            return Err(ShipError::dimension_mismatch(
                format!("{} parameter tensors", shapes.len()),
                format!("{} parameter tensors", values.len()),
            ));
        }
        for (shape, value) in shapes.iter().zip(values) {
            if shape.as_slice() != value.shape() {
                return Err(ShipError::dimension_mismatch(
                    format!("{:?}", shape),
                    format!("{:?}", value.shape()),
                ));
            }
        }
        Ok(())
    }

    /// Overwrite all parameters; nothing is written unless every shape matches
    pub fn import_parameters(&mut self, values: &[ArrayD<f32>]) -> Result<()> {
        self.check_parameters(values)?;
        for (mut param, value) in self.parameters_mut().into_iter().zip(values) {
            param.assign(value);
        }
        Ok(())
    }
}

/// Online and target Q-networks of identical architecture.
///
/// Only the online network is reachable mutably; the target changes solely
/// through [`ShipNet::sync`] (or a checkpoint restore).
#[derive(Serialize, Deserialize, Clone)]
pub struct ShipNet {
    online: QNetwork,
    target: QNetwork,
}

impl ShipNet {
    pub fn new<R: Rng + ?Sized>(state_dim: StateDim, action_dim: usize, rng: &mut R) -> Result<Self> {
        let online = QNetwork::new(state_dim, action_dim, rng)?;
        let target = online.clone();
        Ok(ShipNet { online, target })
    }

    /// Run a batch through the chosen parameter set
    pub fn forward(&mut self, input: ArrayView4<f32>, model: Model) -> Result<Array2<f32>> {
        match model {
            Model::Online => self.online.forward_batch(input),
            Model::Target => self.target.forward_batch(input),
        }
    }

    pub fn online(&self) -> &QNetwork {
        &self.online
    }

    pub fn online_mut(&mut self) -> &mut QNetwork {
        &mut self.online
    }

    pub fn target(&self) -> &QNetwork {
        &self.target
    }

    /// Hard sync: copy the online parameters wholesale into the target.
    ///
    /// Only parameters move; forward caches stay with their own network.
    pub fn sync(&mut self) {
        for (mut target, online) in self.target.parameters_mut().into_iter().zip(self.online.parameters()) {
            target.assign(&online);
        }
    }

    /// Restore both parameter sets; fails without side effects on any shape mismatch
    pub fn restore(&mut self, online: &[ArrayD<f32>], target: &[ArrayD<f32>]) -> Result<()> {
        self.online.check_parameters(online)?;
        self.target.check_parameters(target)?;
        self.online.import_parameters(online)?;
        self.target.import_parameters(target)
    }
}
