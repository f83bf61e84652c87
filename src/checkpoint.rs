//! Saving and restoring the complete agent state.
//!
//! A checkpoint is a single bincode-encoded [`Checkpoint`] written to
//! `save_dir/{prefix}_{curr_step}.chkpt`. The file is first written under a
//! temporary name in the same directory and then renamed into place, so a
//! reader never observes a partially written checkpoint.

use log::{info, warn};
use ndarray::{ArrayD, ArrayViewD};
use serde::{Serialize, Deserialize, Serializer};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use crate::agent::{AgentConfig, EpsilonGreedy, Ship};
use crate::error::{Result, ShipError};
use crate::network::StateDim;
use crate::optimizer::{Optimizer, OptimizerWrapper};
use crate::replay_buffer::{ReplayBuffer, Transition};

/// Bumped whenever the layout of [`Checkpoint`] changes
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

pub const CHECKPOINT_EXTENSION: &str = "chkpt";

/// Everything needed to resume training where it stopped
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub format_version: u32,
    pub state_dim: StateDim,
    pub action_dim: usize,
    pub parameters_online: Vec<ArrayD<f32>>,
    pub parameters_target: Vec<ArrayD<f32>>,
    pub exploration_rate: f64,
    pub exploration_rate_decay: f64,
    pub exploration_rate_min: f64,
    pub save_every: u64,
    pub batch_size: usize,
    pub gamma: f32,
    pub learning_rate: f32,
    pub burn_in: u64,
    pub learn_every: u64,
    pub sync_every: u64,
    pub curr_step: u64,
    pub memory_capacity: usize,
    /// Oldest first
    pub replay_buffer_contents: Vec<Transition>,
    pub optimizer: OptimizerWrapper,
}

/// Borrowed view of an agent laid out exactly like [`Checkpoint`], so saving
/// encodes straight from the live networks and replay memory
#[derive(Serialize)]
struct CheckpointView<'a> {
    format_version: u32,
    state_dim: StateDim,
    action_dim: usize,
    parameters_online: Vec<ArrayViewD<'a, f32>>,
    parameters_target: Vec<ArrayViewD<'a, f32>>,
    exploration_rate: f64,
    exploration_rate_decay: f64,
    exploration_rate_min: f64,
    save_every: u64,
    batch_size: usize,
    gamma: f32,
    learning_rate: f32,
    burn_in: u64,
    learn_every: u64,
    sync_every: u64,
    curr_step: u64,
    memory_capacity: usize,
    replay_buffer_contents: TransitionsView<'a>,
    optimizer: &'a OptimizerWrapper,
}

/// Serializes replay memory as a sequence, oldest first
struct TransitionsView<'a>(&'a ReplayBuffer);

impl Serialize for TransitionsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'a> CheckpointView<'a> {
    fn of(ship: &'a Ship) -> Self {
        let config = ship.config();
        let policy = ship.policy();
        CheckpointView {
            format_version: CHECKPOINT_FORMAT_VERSION,
            state_dim: config.state_dim,
            action_dim: config.action_dim,
            parameters_online: ship.net().online().parameters(),
            parameters_target: ship.net().target().parameters(),
            exploration_rate: policy.rate(),
            exploration_rate_decay: policy.decay_factor(),
            exploration_rate_min: policy.min(),
            save_every: config.save_every,
            batch_size: config.batch_size,
            gamma: config.gamma,
            learning_rate: config.learning_rate,
            burn_in: config.burn_in,
            learn_every: config.learn_every,
            sync_every: config.sync_every,
            curr_step: ship.curr_step(),
            memory_capacity: ship.memory().capacity(),
            replay_buffer_contents: TransitionsView(ship.memory()),
            optimizer: ship.optimizer(),
        }
    }
}

/// Encode `value` into `path` atomically, creating the parent directory if needed
fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| ShipError::checkpoint(format!("{} is not a file path", path.display())))?;
    let tmp_path = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));

    let written = (|| -> Result<()> {
        let file = fs::File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, value)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

impl Checkpoint {
    /// Read and decode a checkpoint file
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ShipError::checkpoint(format!("{} not found", path.display())),
            _ => ShipError::checkpoint(format!("cannot read {}: {}", path.display(), err)),
        })?;
        let checkpoint: Checkpoint = bincode::deserialize(&bytes)
            .map_err(|err| ShipError::checkpoint(format!("cannot decode {}: {}", path.display(), err)))?;

        if checkpoint.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(ShipError::checkpoint(format!(
                "{} has format version {}, expected {}",
                path.display(),
                checkpoint.format_version,
                CHECKPOINT_FORMAT_VERSION
            )));
        }
        Ok(checkpoint)
    }

    /// Agent configuration carried by this checkpoint, on top of `base` for
    /// the fields a checkpoint does not record
    fn config_over(&self, base: &AgentConfig) -> AgentConfig {
        AgentConfig {
            state_dim: self.state_dim,
            action_dim: self.action_dim,
            exploration_rate: self.exploration_rate,
            exploration_rate_decay: self.exploration_rate_decay,
            exploration_rate_min: self.exploration_rate_min,
            save_every: self.save_every,
            batch_size: self.batch_size,
            gamma: self.gamma,
            learning_rate: self.learning_rate,
            burn_in: self.burn_in,
            learn_every: self.learn_every,
            sync_every: self.sync_every,
            memory_capacity: self.memory_capacity,
            ..base.clone()
        }
    }
}

impl Ship {
    /// Where [`Ship::save`] writes at the current step
    pub fn checkpoint_path(&self) -> PathBuf {
        self.config.save_dir.join(format!(
            "{}_{}.{}",
            self.config.checkpoint_prefix, self.curr_step, CHECKPOINT_EXTENSION
        ))
    }

    /// Persist the full agent state, returning the checkpoint path
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.checkpoint_path();
        write_atomic(&path, &CheckpointView::of(self))?;
        info!("Agent saved to {} at step {}", path.display(), self.curr_step);
        Ok(path)
    }

    /// Save when the step counter is a positive multiple of `save_every`
    pub fn save_if_due(&self) -> Result<Option<PathBuf>> {
        if self.curr_step > 0 && self.curr_step % self.config.save_every == 0 {
            self.save().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Restore the state saved by [`Ship::save`].
    ///
    /// The checkpoint must come from an agent with the same state and action
    /// dimensions. Nothing is changed unless the whole checkpoint is usable.
    /// `save_dir`, `checkpoint_prefix` and `seed` keep their current values.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let checkpoint = Checkpoint::read_from(path)?;

        if checkpoint.state_dim != self.config.state_dim || checkpoint.action_dim != self.config.action_dim {
            return Err(ShipError::checkpoint(format!(
                "{} holds an agent for state_dim {:?} with {} actions, this agent has {:?} with {}",
                path.display(),
                checkpoint.state_dim,
                checkpoint.action_dim,
                self.config.state_dim,
                self.config.action_dim
            )));
        }

        let config = checkpoint.config_over(&self.config);
        config
            .validate()
            .map_err(|err| ShipError::checkpoint(format!("{}: {}", path.display(), err)))?;

        for transition in &checkpoint.replay_buffer_contents {
            let shapes_ok = transition.state.dim() == config.state_dim && transition.next_state.dim() == config.state_dim;
            if !shapes_ok || transition.action >= config.action_dim {
                return Err(ShipError::checkpoint(format!(
                    "{} holds a replay transition that does not fit this agent",
                    path.display()
                )));
            }
        }

        // Restoring checks every shape before writing, so it is the last fallible step
        self.net
            .restore(&checkpoint.parameters_online, &checkpoint.parameters_target)
            .map_err(|err| ShipError::checkpoint(format!("{}: {}", path.display(), err)))?;

        let mut optimizer = checkpoint.optimizer;
        if !optimizer.is_compatible(&self.net.online().parameter_shapes()) {
            warn!("Optimizer state in {} does not match the network, resetting it", path.display());
            optimizer.reset();
        }

        self.memory = ReplayBuffer::from_transitions(config.memory_capacity, checkpoint.replay_buffer_contents);
        self.policy = EpsilonGreedy::new(
            config.exploration_rate,
            config.exploration_rate_decay,
            config.exploration_rate_min,
        );
        self.optimizer = optimizer;
        self.curr_step = checkpoint.curr_step;
        self.config = config;

        info!("Agent loaded from {} at step {}", path.display(), self.curr_step);
        Ok(())
    }
}
