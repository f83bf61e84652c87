//! # Activation Functions Module
//!
//! Element-wise non-linearities used between the layers of the Q-network.
//!
//! ## Available Activations
//!
//! - **ReLU** (Rectified Linear Unit): `max(0, x)` - used after every hidden stage
//! - **Linear**: Identity function - used on the action-value head
//!
//! Both operate on arrays of any dimensionality, so the same activation is
//! applied to convolutional feature maps `(batch, channels, h, w)` and to
//! dense activations `(batch, features)`.
//!
//! ```rust
//! use ship_dqn::activations::Activation;
//! use ndarray::array;
//!
//! let mut data = array![1.0, -0.5, 0.0, 2.0];
//! Activation::Relu.apply(&mut data);
//! assert_eq!(data, array![1.0, 0.0, 0.0, 2.0]);
//! ```

pub mod functions;

pub use functions::Activation;
