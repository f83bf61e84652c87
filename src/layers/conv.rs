//! Convolutional layer for processing stacked game frames
//!
//! The convolution is computed by unrolling every receptive field into a row
//! of a patch matrix (im2col) and multiplying it with the flattened kernels.
//! Patch extraction and its inverse are parallel over the batch.

use ndarray::parallel::prelude::*;
use ndarray::{s, Array1, Array2, Array3, Array4, ArrayView4, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};
use crate::activations::Activation;
use crate::error::{Result, ShipError};
use crate::layers::initialization::WeightInit;

/// 2D Convolutional Layer without padding
#[derive(Serialize, Deserialize, Clone)]
pub struct Conv2DLayer {
    /// Convolution kernels/filters [out_channels, in_channels, kernel_height, kernel_width]
    pub kernels: Array4<f32>,

    /// Bias terms for each output channel
    pub biases: Array1<f32>,

    /// Activation function
    pub activation: Activation,

    /// Stride for convolution
    pub stride: (usize, usize),

    /// Number of input channels
    pub in_channels: usize,

    /// Number of output channels (filters)
    pub out_channels: usize,

    /// Kernel size
    pub kernel_size: (usize, usize),

    /// Patch matrix of the last forward pass
    #[serde(skip)]
    cached_patches: Option<Array2<f32>>,

    /// Input shape of the last forward pass
    #[serde(skip)]
    cached_input_dim: Option<(usize, usize, usize, usize)>,

    /// Cached pre-activation output
    #[serde(skip)]
    cached_pre_activation: Option<Array4<f32>>,
}

/// Gradients produced by [`Conv2DLayer::backward_batch`]
pub struct ConvGradients {
    pub input: Array4<f32>,
    pub kernels: Array4<f32>,
    pub biases: Array1<f32>,
}

impl Conv2DLayer {
    /// Create a new 2D convolutional layer with weights drawn from `rng`
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if in_channels == 0 || out_channels == 0 {
            return Err(ShipError::configuration(
                "channels".to_string(),
                format!("must be positive, got {} -> {}", in_channels, out_channels),
            ));
        }
        if kernel_size.0 == 0 || kernel_size.1 == 0 || stride.0 == 0 || stride.1 == 0 {
            return Err(ShipError::configuration(
                "kernel_size".to_string(),
                format!("kernel {:?} and stride {:?} must be positive", kernel_size, stride),
            ));
        }

        let weight_init = WeightInit::for_activation(&activation);
        let fan_in = in_channels * kernel_size.0 * kernel_size.1;
        let fan_out = out_channels * kernel_size.0 * kernel_size.1;
        let kernels = weight_init.initialize(
            (out_channels, in_channels, kernel_size.0, kernel_size.1),
            fan_in,
            fan_out,
            rng,
        )?;

        Ok(Conv2DLayer {
            kernels,
            biases: Array1::zeros(out_channels),
            activation,
            stride,
            in_channels,
            out_channels,
            kernel_size,
            cached_patches: None,
            cached_input_dim: None,
            cached_pre_activation: None,
        })
    }

    /// Spatial output size for an input of `(height, width)`, or `None` if the
    /// kernel does not fit.
    pub fn output_dim(&self, height: usize, width: usize) -> Option<(usize, usize)> {
        if height < self.kernel_size.0 || width < self.kernel_size.1 {
            return None;
        }
        Some((
            (height - self.kernel_size.0) / self.stride.0 + 1,
            (width - self.kernel_size.1) / self.stride.1 + 1,
        ))
    }

    fn patch_len(&self) -> usize {
        self.in_channels * self.kernel_size.0 * self.kernel_size.1
    }

    fn kernel_matrix(&self) -> Result<Array2<f32>> {
        let flat = self.kernels.iter().cloned().collect::<Vec<_>>();
        Ok(Array2::from_shape_vec((self.out_channels, self.patch_len()), flat)?)
    }

    /// Unroll receptive fields into rows: [batch * out_h * out_w, in_channels * kh * kw]
    fn im2col(&self, input: &ArrayView4<f32>, out_h: usize, out_w: usize) -> Result<Array2<f32>> {
        let batch_size = input.dim().0;
        let (kh, kw) = self.kernel_size;
        let (sh, sw) = self.stride;

        let mut patches = Array3::<f32>::zeros((batch_size, out_h * out_w, self.patch_len()));
        patches
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(input.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(mut sample_patches, image)| {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let window = image.slice(s![.., oh * sh..oh * sh + kh, ow * sw..ow * sw + kw]);
                        let mut row = sample_patches.row_mut(oh * out_w + ow);
                        row.iter_mut().zip(window.iter()).for_each(|(dst, &src)| *dst = src);
                    }
                }
            });

        Ok(patches.into_shape((batch_size * out_h * out_w, self.patch_len()))?)
    }

    /// Scatter-add patch gradients back onto the input grid (inverse of im2col)
    fn col2im(
        &self,
        patch_grads: Array2<f32>,
        input_dim: (usize, usize, usize, usize),
        out_h: usize,
        out_w: usize,
    ) -> Result<Array4<f32>> {
        let (batch_size, channels, height, width) = input_dim;
        let (kh, kw) = self.kernel_size;
        let (sh, sw) = self.stride;
        let patch_len = self.patch_len();

        let patch_grads = patch_grads.into_shape((batch_size, out_h * out_w, patch_len))?;
        let mut input_grads = Array4::<f32>::zeros((batch_size, channels, height, width));
        input_grads
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(patch_grads.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(mut image_grad, sample_grads)| {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let mut window =
                            image_grad.slice_mut(s![.., oh * sh..oh * sh + kh, ow * sw..ow * sw + kw]);
                        let row = sample_grads.row(oh * out_w + ow);
                        window.iter_mut().zip(row.iter()).for_each(|(dst, &g)| *dst += g);
                    }
                }
            });

        Ok(input_grads)
    }

    /// Forward pass for batch of images [batch, channels, height, width]
    pub fn forward_batch(&mut self, input: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch_size, channels, height, width) = input.dim();
        if channels != self.in_channels {
            return Err(ShipError::dimension_mismatch(
                format!("{} input channels", self.in_channels),
                format!("{} input channels", channels),
            ));
        }
        let (out_h, out_w) = self.output_dim(height, width).ok_or_else(|| {
            ShipError::dimension_mismatch(
                format!("input of at least {:?}", self.kernel_size),
                format!("{}x{}", height, width),
            )
        })?;

        let patches = self.im2col(&input, out_h, out_w)?;
        let kernel_matrix = self.kernel_matrix()?;

        // [batch * out_h * out_w, out_channels]
        let conv = patches.dot(&kernel_matrix.t()) + &self.biases.view().insert_axis(Axis(0));
        let pre_activation = conv
            .into_shape((batch_size, out_h, out_w, self.out_channels))?
            .permuted_axes([0, 3, 1, 2])
            .as_standard_layout()
            .into_owned();

        let mut output = pre_activation.clone();
        self.activation.apply(&mut output);

        self.cached_patches = Some(patches);
        self.cached_input_dim = Some((batch_size, channels, height, width));
        self.cached_pre_activation = Some(pre_activation);

        Ok(output)
    }

    /// Backward pass given the gradient of the loss w.r.t. this layer's output
    pub fn backward_batch(&self, output_gradient: ArrayView4<f32>) -> Result<ConvGradients> {
        let (patches, input_dim, pre_activation) = match (
            self.cached_patches.as_ref(),
            self.cached_input_dim,
            self.cached_pre_activation.as_ref(),
        ) {
            (Some(p), Some(d), Some(z)) => (p, d, z),
            _ => {
                return Err(ShipError::Training(
                    "forward_batch() must be called before backward_batch()".to_string(),
                ))
            }
        };
        if output_gradient.dim() != pre_activation.dim() {
            return Err(ShipError::dimension_mismatch(
                format!("{:?}", pre_activation.dim()),
                format!("{:?}", output_gradient.dim()),
            ));
        }
        let (batch_size, _, out_h, out_w) = pre_activation.dim();

        let delta = &output_gradient * &self.activation.derivative(pre_activation);
        let delta = delta
            .permuted_axes([0, 2, 3, 1])
            .as_standard_layout()
            .into_owned()
            .into_shape((batch_size * out_h * out_w, self.out_channels))?;

        let kernel_gradients = delta
            .t()
            .dot(patches)
            .into_shape((self.out_channels, self.in_channels, self.kernel_size.0, self.kernel_size.1))?;
        let bias_gradients = delta.sum_axis(Axis(0));
        let patch_gradients = delta.dot(&self.kernel_matrix()?);
        let input_gradients = self.col2im(patch_gradients, input_dim, out_h, out_w)?;

        Ok(ConvGradients {
            input: input_gradients,
            kernels: kernel_gradients,
            biases: bias_gradients,
        })
    }
}
