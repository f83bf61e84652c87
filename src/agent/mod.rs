//! # Double-DQN Agent Module
//!
//! [`Ship`] is a Double-DQN agent for stacked-frame observations. One agent
//! owns its networks, optimizer, replay memory, exploration schedule and
//! random number generator.
//!
//! ## Core Concepts
//!
//! - **Epsilon-greedy**: act randomly with probability epsilon, otherwise take the
//!   online network's argmax; epsilon decays multiplicatively on every action
//! - **Experience Replay**: transitions are cached in a bounded FIFO memory and
//!   sampled uniformly for learning
//! - **Double DQN**: the online network chooses the next action, the target
//!   network values it
//! - **Hard sync**: the target network is a periodic copy of the online network
//!
//! ## Step schedule
//!
//! The step counter advances once per [`Ship::act`]. [`Ship::learn`] syncs the
//! target on multiples of `sync_every`, does nothing before `burn_in`, and
//! updates the online network on multiples of `learn_every` afterwards.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ship_dqn::agent::{AgentConfig, Ship};
//! use ndarray::Array3;
//!
//! let config = AgentConfig::new((4, 84, 84), 6, "checkpoints");
//! let mut ship = Ship::new(config).unwrap();
//!
//! let state = Array3::<f32>::zeros((4, 84, 84));
//! let (action, values) = ship.act(state.view()).unwrap();
//! assert!(action < 6);
//! if let Some(q) = values.as_array() {
//!     println!("Q-values: {}", q);
//! }
//! ```

pub mod config;
pub mod exploration;
pub mod learner;
pub mod ship;

pub use config::{AgentConfig, AgentConfigBuilder};
pub use exploration::{ActionValues, EpsilonGreedy};
pub use learner::{LearnPhase, LearnStats, StepGate};
pub use ship::Ship;
