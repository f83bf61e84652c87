//! # ship_dqn - Double-DQN agent for pixel observations
//!
//! A self-contained Double Deep Q-Network learner for environments that emit
//! stacked 84x84 frames and accept one of a fixed number of discrete actions.
//!
//! ## Key Features
//!
//! - **Q-network**: three convolutions and two dense layers, with an online
//!   copy that learns and a target copy that is hard-synced periodically
//! - **Experience replay**: bounded FIFO memory with uniform sampling
//! - **Epsilon-greedy exploration** with multiplicative decay to a floor
//! - **Double-DQN updates** with smooth-L1 loss and Adam
//! - **Checkpoints**: complete agent state, written atomically with bincode
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ship_dqn::agent::{AgentConfig, Ship};
//! use ndarray::Array3;
//!
//! let config = AgentConfig::builder()
//!     .state_dim((4, 84, 84))
//!     .action_dim(6)
//!     .save_dir("checkpoints")
//!     .seed(7)
//!     .build()
//!     .unwrap();
//! let mut ship = Ship::new(config).unwrap();
//!
//! let state = Array3::<f32>::zeros((4, 84, 84));
//! let (action, _) = ship.act(state.view()).unwrap();
//! ship.cache(state.clone(), state, action, 0.0, false).unwrap();
//! let _stats = ship.learn().unwrap();
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - ReLU and identity activations
//! - [`agent`] - The [`agent::Ship`] agent, its configuration, exploration and learning schedule
//! - [`checkpoint`] - Saving and loading agent state
//! - [`environment`] - Environment trait and an episode driver
//! - [`error`] - Error types and result handling
//! - [`layers`] - Convolution and dense layers with weight initialization
//! - [`loss`] - Smooth-L1 (Huber) loss
//! - [`network`] - The Q-network and its online/target pair
//! - [`optimizer`] - SGD and Adam
//! - [`replay_buffer`] - Experience replay memory

pub mod activations;
pub mod agent;
pub mod checkpoint;
pub mod environment;
pub mod error;
pub mod layers;
pub mod loss;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;

#[cfg(test)]
mod tests;
