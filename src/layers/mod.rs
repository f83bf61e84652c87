//! Trainable layers of the Q-network.
//!
//! - [`Conv2DLayer`] - strided 2D convolution over `(batch, channels, h, w)`
//! - [`DenseLayer`] - fully connected layer over `(batch, features)`
//! - [`WeightInit`] - initializers drawing from a caller-supplied RNG
//!
//! Every layer caches what its backward pass needs during `forward_batch`,
//! so a backward call always refers to the most recent forward call.

pub mod conv;
pub mod dense;
pub mod initialization;

pub use conv::{Conv2DLayer, ConvGradients};
pub use dense::{DenseGradients, DenseLayer};
pub use initialization::WeightInit;
