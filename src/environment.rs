use log::debug;
use ndarray::Array3;
use crate::agent::Ship;
use crate::error::Result;

/// Single-agent episodic environment producing stacked-frame observations
pub trait Environment {
    /// Start a new episode and return its first observation
    fn reset(&mut self) -> Result<Array3<f32>>;

    /// Apply `action` and advance one step
    fn step(&mut self, action: usize) -> Result<EnvStep>;
}

/// Outcome of one environment step
#[derive(Clone, Debug, PartialEq)]
pub struct EnvStep {
    pub observation: Array3<f32>,
    pub reward: f32,
    pub done: bool,
}

/// Summary of one episode
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpisodeStats {
    pub steps: u64,
    pub total_reward: f32,
    /// Mean loss over the learning steps taken, `None` if there were none
    pub mean_loss: Option<f32>,
    /// Mean TD estimate over the learning steps taken
    pub mean_q: Option<f32>,
}

/// Play one episode of at most `max_steps` steps, learning as it goes.
///
/// Each step: act, step the environment, cache the transition, learn, and
/// save a checkpoint when one is due.
pub fn run_episode<E: Environment + ?Sized>(agent: &mut Ship, env: &mut E, max_steps: u64) -> Result<EpisodeStats> {
    let mut stats = EpisodeStats::default();
    let mut losses = Vec::new();
    let mut q_values = Vec::new();

    let mut state = env.reset()?;
    while stats.steps < max_steps {
        let (action, _) = agent.act(state.view())?;
        let EnvStep { observation, reward, done } = env.step(action)?;

        agent.cache(state, observation.clone(), action, reward, done)?;
        if let Some(learned) = agent.learn()? {
            losses.push(learned.loss);
            q_values.push(learned.mean_q);
        }
        agent.save_if_due()?;

        stats.steps += 1;
        stats.total_reward += reward;
        state = observation;
        if done {
            break;
        }
    }

    stats.mean_loss = mean(&losses);
    stats.mean_q = mean(&q_values);
    debug!(
        "episode finished after {} steps, reward {:.3}, epsilon {:.4}",
        stats.steps,
        stats.total_reward,
        agent.exploration_rate()
    );
    Ok(stats)
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}
