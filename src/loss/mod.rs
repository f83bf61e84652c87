//! Regression losses between TD estimates and TD targets.

pub mod functions;

pub use functions::{HuberLoss, Loss};
