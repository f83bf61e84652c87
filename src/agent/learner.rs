use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView4};
use crate::agent::config::AgentConfig;
use crate::agent::ship::Ship;
use crate::error::{Result, ShipError};
use crate::loss::Loss;
use crate::network::{argmax, Model};
use crate::optimizer::Optimizer;
use crate::replay_buffer::Batch;

/// Observability output of one learning step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LearnStats {
    /// Batch mean of the TD estimate `Q_online(s, a)`
    pub mean_q: f32,
    /// Smooth-L1 loss between TD estimate and TD target
    pub loss: f32,
}

/// What `learn()` does with the online network at a given step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LearnPhase {
    /// Still collecting experience
    BurnIn,
    /// Past burn-in, but not a learning step
    Throttled,
    Update,
}

/// Step-counter schedule for target syncs and learning updates.
///
/// A pure function of the step counter: no state beyond the three cadences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepGate {
    pub sync_every: u64,
    pub burn_in: u64,
    pub learn_every: u64,
}

impl StepGate {
    pub fn from_config(config: &AgentConfig) -> Self {
        StepGate {
            sync_every: config.sync_every,
            burn_in: config.burn_in,
            learn_every: config.learn_every,
        }
    }

    /// Syncs happen on every multiple of `sync_every`, burn-in included
    pub fn should_sync(&self, step: u64) -> bool {
        step % self.sync_every == 0
    }

    pub fn phase(&self, step: u64) -> LearnPhase {
        if step < self.burn_in {
            LearnPhase::BurnIn
        } else if step % self.learn_every != 0 {
            LearnPhase::Throttled
        } else {
            LearnPhase::Update
        }
    }
}

impl Ship {
    /// Run the learning schedule for the current step.
    ///
    /// Syncs the target network on `sync_every` multiples, then returns
    /// `Ok(None)` during burn-in and between `learn_every` steps. Otherwise it
    /// samples a batch and performs one Double-DQN update of the online
    /// network. Sampling from a buffer smaller than `batch_size` is an
    /// [`ShipError::InsufficientData`] error.
    pub fn learn(&mut self) -> Result<Option<LearnStats>> {
        let gate = StepGate::from_config(&self.config);

        if gate.should_sync(self.curr_step) {
            self.sync_q_target();
        }

        match gate.phase(self.curr_step) {
            LearnPhase::BurnIn | LearnPhase::Throttled => return Ok(None),
            LearnPhase::Update => {}
        }

        let batch = self.recall()?;

        // Target first: it also runs the online network, and the backward pass
        // needs the activations cached by the estimate's forward pass.
        let td_tgt = self.td_target(batch.rewards.view(), batch.next_states.view(), batch.dones.view())?;
        let td_est = self.td_estimate(batch.states.view(), &batch.actions)?;

        let loss = self.update_q_online(&batch.actions, &td_est, &td_tgt)?;
        let mean_q = td_est.mean().unwrap_or(0.0);

        debug!("step {}: mean Q {:.4}, loss {:.6}", self.curr_step, mean_q, loss);
        Ok(Some(LearnStats { mean_q, loss }))
    }

    /// Sample a batch of `batch_size` transitions from replay memory
    pub fn recall(&mut self) -> Result<Batch> {
        self.memory.sample(self.config.batch_size, &mut self.rng)
    }

    /// `Q_online(s)[a]` for every sampled transition
    pub fn td_estimate(&mut self, states: ArrayView4<f32>, actions: &[usize]) -> Result<Array1<f32>> {
        if states.dim().0 != actions.len() {
            return Err(ShipError::dimension_mismatch(
                format!("{} actions", states.dim().0),
                format!("{} actions", actions.len()),
            ));
        }
        let q_values = self.net.forward(states, Model::Online)?;
        actions
            .iter()
            .enumerate()
            .map(|(i, &action)| {
                if action >= self.config.action_dim {
                    return Err(ShipError::InvalidAction {
                        action,
                        max_actions: self.config.action_dim,
                    });
                }
                Ok(q_values[[i, action]])
            })
            .collect()
    }

    /// Double-DQN target: the online network picks the next action, the target network values it.
    ///
    /// Terminal transitions get exactly their reward.
    pub fn td_target(
        &mut self,
        rewards: ArrayView1<f32>,
        next_states: ArrayView4<f32>,
        dones: ArrayView1<f32>,
    ) -> Result<Array1<f32>> {
        let batch_size = next_states.dim().0;
        if rewards.len() != batch_size || dones.len() != batch_size {
            return Err(ShipError::dimension_mismatch(
                format!("{} rewards and done flags", batch_size),
                format!("{} rewards, {} done flags", rewards.len(), dones.len()),
            ));
        }

        let next_online = self.net.forward(next_states, Model::Online)?;
        let next_target = self.net.forward(next_states, Model::Target)?;
        let gamma = self.config.gamma;

        Ok(Array1::from_shape_fn(batch_size, |i| {
            if dones[i] != 0.0 {
                rewards[i]
            } else {
                let best_action = argmax(next_online.row(i));
                rewards[i] + gamma * next_target[[i, best_action]]
            }
        }))
    }

    /// Backpropagate the smooth-L1 loss through the online network and take one optimizer step.
    ///
    /// Must follow [`Ship::td_estimate`] on the same batch. Returns the loss value.
    fn update_q_online(&mut self, actions: &[usize], td_estimate: &Array1<f32>, td_target: &Array1<f32>) -> Result<f32> {
        let loss = self.loss_fn.compute(td_estimate.view(), td_target.view());
        let grad = self.loss_fn.gradient(td_estimate.view(), td_target.view());

        // Only the taken action's output receives gradient
        let mut output_grad = Array2::<f32>::zeros((actions.len(), self.config.action_dim));
        for (i, &action) in actions.iter().enumerate() {
            output_grad[[i, action]] = grad[i];
        }

        let gradients = self.net.online().backward(output_grad.view())?;
        self.optimizer.step(
            self.net.online_mut().parameters_mut(),
            &gradients,
            self.config.learning_rate,
        )?;
        Ok(loss)
    }

    /// Copy the online parameters into the target network
    pub fn sync_q_target(&mut self) {
        self.net.sync();
        debug!("step {}: target network synced", self.curr_step);
    }
}
