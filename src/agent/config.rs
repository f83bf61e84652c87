use serde::{Serialize, Deserialize};
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::{Result, ShipError};
use crate::network::{StateDim, FRAME_SIZE};

/// Construction parameters and hyperparameters of a [`crate::agent::Ship`].
///
/// Missing fields in a JSON config fall back to the defaults below.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// `(channels, height, width)`; height and width must be 84
    pub state_dim: StateDim,
    pub action_dim: usize,
    /// Directory checkpoints are written to
    pub save_dir: PathBuf,
    /// Initial epsilon
    pub exploration_rate: f64,
    /// Multiplied into epsilon after every action
    pub exploration_rate_decay: f64,
    /// Floor for epsilon
    pub exploration_rate_min: f64,
    pub save_every: u64,
    pub batch_size: usize,
    /// Discount factor
    pub gamma: f32,
    pub learning_rate: f32,
    /// Steps of pure experience collection before the first update
    pub burn_in: u64,
    /// Steps between updates of the online network
    pub learn_every: u64,
    /// Steps between hard syncs of the target network
    pub sync_every: u64,
    pub memory_capacity: usize,
    /// Seed for weight init, exploration and sampling; `None` draws one from entropy
    pub seed: Option<u64>,
    pub checkpoint_prefix: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            state_dim: (1, FRAME_SIZE, FRAME_SIZE),
            action_dim: 6,
            save_dir: PathBuf::from("checkpoints"),
            exploration_rate: 1.0,
            exploration_rate_decay: 0.99999975,
            exploration_rate_min: 0.1,
            save_every: 500_000,
            batch_size: 32,
            gamma: 0.9,
            learning_rate: 0.00025,
            burn_in: 10_000,
            learn_every: 3,
            sync_every: 10_000,
            memory_capacity: 1000,
            seed: None,
            checkpoint_prefix: "ship_net".to_string(),
        }
    }
}

fn invalid(name: &str, reason: String) -> ShipError {
    ShipError::configuration(name.to_string(), reason)
}

impl AgentConfig {
    pub fn new(state_dim: StateDim, action_dim: usize, save_dir: impl Into<PathBuf>) -> Self {
        AgentConfig {
            state_dim,
            action_dim,
            save_dir: save_dir.into(),
            ..Default::default()
        }
    }

    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::new()
    }

    /// Check every hyperparameter range. Frame size is checked by the network itself.
    pub fn validate(&self) -> Result<()> {
        if self.state_dim.0 == 0 {
            return Err(invalid("state_dim", "channel count must be positive".to_string()));
        }
        if self.action_dim == 0 {
            return Err(invalid("action_dim", "must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.exploration_rate) {
            return Err(invalid("exploration_rate", format!("must lie in [0, 1], got {}", self.exploration_rate)));
        }
        if !(self.exploration_rate_decay > 0.0 && self.exploration_rate_decay <= 1.0) {
            return Err(invalid(
                "exploration_rate_decay",
                format!("must lie in (0, 1], got {}", self.exploration_rate_decay),
            ));
        }
        if !(0.0..=1.0).contains(&self.exploration_rate_min) {
            return Err(invalid(
                "exploration_rate_min",
                format!("must lie in [0, 1], got {}", self.exploration_rate_min),
            ));
        }
        if self.exploration_rate < self.exploration_rate_min {
            return Err(invalid(
                "exploration_rate",
                format!(
                    "{} is below exploration_rate_min {}",
                    self.exploration_rate, self.exploration_rate_min
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(invalid("gamma", format!("must lie in [0, 1], got {}", self.gamma)));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate", format!("must be positive, got {}", self.learning_rate)));
        }
        for (name, value) in [
            ("save_every", self.save_every),
            ("learn_every", self.learn_every),
            ("sync_every", self.sync_every),
        ] {
            if value == 0 {
                return Err(invalid(name, "must be greater than 0".to_string()));
            }
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be greater than 0".to_string()));
        }
        if self.memory_capacity < self.batch_size {
            return Err(invalid(
                "memory_capacity",
                format!("{} cannot hold a batch of {}", self.memory_capacity, self.batch_size),
            ));
        }
        if self.checkpoint_prefix.is_empty() || self.checkpoint_prefix.contains(['/', '\\']) {
            return Err(invalid(
                "checkpoint_prefix",
                format!("'{}' is not a plain file-name prefix", self.checkpoint_prefix),
            ));
        }
        Ok(())
    }

    /// Read a JSON config file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write this config as pretty-printed JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Builder pattern for AgentConfig
#[derive(Default)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn new() -> Self {
        AgentConfigBuilder { config: AgentConfig::default() }
    }

    pub fn state_dim(mut self, state_dim: StateDim) -> Self {
        self.config.state_dim = state_dim;
        self
    }

    pub fn action_dim(mut self, action_dim: usize) -> Self {
        self.config.action_dim = action_dim;
        self
    }

    pub fn save_dir(mut self, save_dir: impl Into<PathBuf>) -> Self {
        self.config.save_dir = save_dir.into();
        self
    }

    pub fn exploration(mut self, rate: f64, decay: f64, min: f64) -> Self {
        self.config.exploration_rate = rate;
        self.config.exploration_rate_decay = decay;
        self.config.exploration_rate_min = min;
        self
    }

    pub fn save_every(mut self, steps: u64) -> Self {
        self.config.save_every = steps;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.config.gamma = gamma;
        self
    }

    pub fn learning_rate(mut self, learning_rate: f32) -> Self {
        self.config.learning_rate = learning_rate;
        self
    }

    pub fn burn_in(mut self, steps: u64) -> Self {
        self.config.burn_in = steps;
        self
    }

    pub fn learn_every(mut self, steps: u64) -> Self {
        self.config.learn_every = steps;
        self
    }

    pub fn sync_every(mut self, steps: u64) -> Self {
        self.config.sync_every = steps;
        self
    }

    pub fn memory_capacity(mut self, capacity: usize) -> Self {
        self.config.memory_capacity = capacity;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn checkpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.checkpoint_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<AgentConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
