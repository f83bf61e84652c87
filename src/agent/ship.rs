use log::{info, trace};
use ndarray::{Array3, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::agent::config::AgentConfig;
use crate::agent::exploration::{ActionValues, EpsilonGreedy};
use crate::error::{Result, ShipError};
use crate::loss::HuberLoss;
use crate::network::{argmax, Model, ShipNet};
use crate::optimizer::{Adam, OptimizerWrapper};
use crate::replay_buffer::{ReplayBuffer, Transition};

/// Double-DQN agent for pixel observations.
///
/// Owns every piece of mutable learning state: the online/target networks,
/// their optimizer, the replay memory, the exploration schedule, the step
/// counter and the random number generator. Nothing is shared between agents.
///
/// # Example
///
/// ```rust,no_run
/// use ship_dqn::agent::{AgentConfig, Ship};
/// use ndarray::Array3;
///
/// let config = AgentConfig::builder()
///     .state_dim((4, 84, 84))
///     .action_dim(6)
///     .save_dir("checkpoints")
///     .build()
///     .unwrap();
/// let mut ship = Ship::new(config).unwrap();
///
/// let state = Array3::<f32>::zeros((4, 84, 84));
/// let (action, _values) = ship.act(state.view()).unwrap();
///
/// // After the environment step...
/// let next_state = Array3::<f32>::zeros((4, 84, 84));
/// ship.cache(state, next_state, action, 1.0, false).unwrap();
/// if let Some(stats) = ship.learn().unwrap() {
///     println!("mean Q {:.3}, loss {:.4}", stats.mean_q, stats.loss);
/// }
/// ```
pub struct Ship {
    pub(crate) config: AgentConfig,
    pub(crate) net: ShipNet,
    pub(crate) optimizer: OptimizerWrapper,
    pub(crate) loss_fn: HuberLoss,
    pub(crate) memory: ReplayBuffer,
    pub(crate) policy: EpsilonGreedy,
    pub(crate) curr_step: u64,
    pub(crate) rng: StdRng,
}

impl Ship {
    /// Create an agent from a validated configuration
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let net = ShipNet::new(config.state_dim, config.action_dim, &mut rng)?;
        let policy = EpsilonGreedy::new(
            config.exploration_rate,
            config.exploration_rate_decay,
            config.exploration_rate_min,
        );

        info!(
            "Created agent: state_dim {:?}, {} actions, replay capacity {}",
            config.state_dim, config.action_dim, config.memory_capacity
        );

        Ok(Ship {
            memory: ReplayBuffer::new(config.memory_capacity),
            optimizer: OptimizerWrapper::Adam(Adam::default()),
            loss_fn: HuberLoss::smooth_l1(),
            net,
            policy,
            curr_step: 0,
            rng,
            config,
        })
    }

    pub(crate) fn check_state(&self, name: &str, dim: (usize, usize, usize)) -> Result<()> {
        if dim != self.config.state_dim {
            return Err(ShipError::dimension_mismatch(
                format!("{} of shape {:?}", name, self.config.state_dim),
                format!("{:?}", dim),
            ));
        }
        Ok(())
    }

    /// Choose an epsilon-greedy action for `state` and advance the step counter.
    ///
    /// Exploring picks a uniformly random action and reports
    /// [`ActionValues::NotComputed`]; exploiting returns the online network's
    /// argmax together with its action values. Epsilon decays on every call.
    pub fn act(&mut self, state: ArrayView3<f32>) -> Result<(usize, ActionValues)> {
        self.check_state("state", state.dim())?;

        let (action, values) = if self.policy.should_explore(&mut self.rng) {
            let action = self.rng.gen_range(0..self.config.action_dim);
            trace!("step {}: explore -> action {}", self.curr_step, action);
            (action, ActionValues::NotComputed)
        } else {
            let q_values = self
                .net
                .forward(state.insert_axis(Axis(0)), Model::Online)?
                .index_axis_move(Axis(0), 0);
            let action = argmax(q_values.view());
            trace!("step {}: exploit -> action {}", self.curr_step, action);
            (action, ActionValues::Computed(q_values))
        };

        self.policy.decay();
        self.curr_step += 1;
        Ok((action, values))
    }

    /// Store one transition in replay memory
    pub fn cache(
        &mut self,
        state: Array3<f32>,
        next_state: Array3<f32>,
        action: usize,
        reward: f32,
        done: bool,
    ) -> Result<()> {
        self.check_state("state", state.dim())?;
        self.check_state("next_state", next_state.dim())?;
        if action >= self.config.action_dim {
            return Err(ShipError::InvalidAction {
                action,
                max_actions: self.config.action_dim,
            });
        }
        self.memory.push(Transition { state, next_state, action, reward, done });
        Ok(())
    }

    /// Re-seed the agent's random number generator
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn curr_step(&self) -> u64 {
        self.curr_step
    }

    pub fn exploration_rate(&self) -> f64 {
        self.policy.rate()
    }

    pub fn policy(&self) -> &EpsilonGreedy {
        &self.policy
    }

    pub fn memory(&self) -> &ReplayBuffer {
        &self.memory
    }

    pub fn net(&self) -> &ShipNet {
        &self.net
    }

    pub fn optimizer(&self) -> &OptimizerWrapper {
        &self.optimizer
    }
}
