//! Synthetic training run
//!
//! A bright dot drifts across a dark 84x84 frame; the agent steers it
//! towards the centre column. Two stacked frames let the agent see the drift.
//!
//! Run with `RUST_LOG=debug` to see every sync and learning step. An optional
//! first argument names a JSON agent config.

use log::{info, LevelFilter};
use ndarray::{s, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ship_dqn::agent::{AgentConfig, Ship};
use ship_dqn::environment::{run_episode, EnvStep, Environment};
use ship_dqn::error::Result;

const CENTRE: i32 = 42;

struct DriftingDot {
    column: i32,
    drift: i32,
    previous: Array3<f32>,
    steps: usize,
    rng: StdRng,
}

impl DriftingDot {
    fn new(seed: u64) -> Self {
        DriftingDot {
            column: CENTRE,
            drift: 1,
            previous: Array3::zeros((1, 84, 84)),
            steps: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn frame(&self) -> Array3<f32> {
        let mut frame = Array3::zeros((1, 84, 84));
        let column = self.column.clamp(0, 83) as usize;
        frame.slice_mut(s![0, 40..44, column]).fill(1.0);
        frame
    }

    fn observation(&mut self) -> Array3<f32> {
        let current = self.frame();
        let mut stacked = Array3::zeros((2, 84, 84));
        stacked.slice_mut(s![0..1, .., ..]).assign(&self.previous);
        stacked.slice_mut(s![1..2, .., ..]).assign(&current);
        self.previous = current;
        stacked
    }
}

impl Environment for DriftingDot {
    fn reset(&mut self) -> Result<Array3<f32>> {
        self.column = CENTRE + self.rng.gen_range(-10..=10);
        self.drift = if self.rng.gen_bool(0.5) { 1 } else { -1 };
        self.steps = 0;
        self.previous = self.frame();
        Ok(self.observation())
    }

    fn step(&mut self, action: usize) -> Result<EnvStep> {
        // 0: push left, 1: stay, 2: push right
        self.column += self.drift + action as i32 - 1;
        self.steps += 1;

        let distance = (self.column - CENTRE).abs();
        let done = distance > 30 || self.steps >= 200;
        let reward = if distance > 30 { -1.0 } else { 1.0 - distance as f32 / 30.0 };
        Ok(EnvStep { observation: self.observation(), reward, done })
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .format_target(false)
        .format_timestamp_secs()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AgentConfig::from_json_file(path)?,
        None => AgentConfig::builder()
            .state_dim((2, 84, 84))
            .action_dim(3)
            .save_dir("checkpoints/synthetic")
            .exploration(1.0, 0.999, 0.05)
            .batch_size(16)
            .burn_in(200)
            .learn_every(2)
            .sync_every(250)
            .save_every(1_000)
            .memory_capacity(2_000)
            .seed(2024)
            .build()?,
    };

    let mut ship = Ship::new(config)?;
    let mut env = DriftingDot::new(7);

    for episode in 0..20 {
        let stats = run_episode(&mut ship, &mut env, 200)?;
        info!(
            "episode {:>3}: {:>3} steps, reward {:>7.2}, loss {}, mean Q {}, epsilon {:.3}",
            episode,
            stats.steps,
            stats.total_reward,
            stats.mean_loss.map_or("-".to_string(), |l| format!("{:.4}", l)),
            stats.mean_q.map_or("-".to_string(), |q| format!("{:.3}", q)),
            ship.exploration_rate()
        );
    }

    ship.save()?;
    Ok(())
}
