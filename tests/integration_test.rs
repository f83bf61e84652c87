use ship_dqn::{
    agent::{AgentConfig, Ship},
    checkpoint::{Checkpoint, CHECKPOINT_FORMAT_VERSION},
    environment::{run_episode, EnvStep, Environment},
    error::{Result, ShipError},
};
use ndarray::Array3;
use std::path::Path;

/// One-dimensional corridor drawn as a bright column on an 84x84 frame.
/// Action 1 moves right, anything else moves left; reaching the end pays 1.
struct Corridor {
    position: usize,
    length: usize,
}

impl Corridor {
    fn new(length: usize) -> Self {
        Corridor { position: 0, length }
    }

    fn render(&self) -> Array3<f32> {
        let column = self.position * 83 / self.length.max(1);
        Array3::from_shape_fn((1, 84, 84), |(_, _, w)| if w == column { 1.0 } else { 0.0 })
    }
}

impl Environment for Corridor {
    fn reset(&mut self) -> Result<Array3<f32>> {
        self.position = 0;
        Ok(self.render())
    }

    fn step(&mut self, action: usize) -> Result<EnvStep> {
        if action == 1 {
            self.position += 1;
        } else {
            self.position = self.position.saturating_sub(1);
        }
        let done = self.position >= self.length;
        Ok(EnvStep {
            observation: self.render(),
            reward: if done { 1.0 } else { -0.01 },
            done,
        })
    }
}

fn config(save_dir: &Path) -> AgentConfig {
    AgentConfig::builder()
        .state_dim((1, 84, 84))
        .action_dim(2)
        .save_dir(save_dir)
        .exploration(0.5, 0.99, 0.05)
        .batch_size(2)
        .burn_in(2)
        .learn_every(1)
        .sync_every(3)
        .save_every(1_000)
        .memory_capacity(16)
        .seed(21)
        .build()
        .unwrap()
}

fn frame(seed: usize) -> Array3<f32> {
    Array3::from_shape_fn((1, 84, 84), |(_, h, w)| ((seed * 13 + h + 2 * w) as f32 * 0.02).sin().abs())
}

/// Drive an agent through a handful of act/cache/learn steps
fn train(ship: &mut Ship, steps: usize) {
    for i in 0..steps {
        let state = frame(i);
        let (action, _) = ship.act(state.view()).unwrap();
        ship.cache(state, frame(i + 1), action, (i % 3) as f32 - 1.0, i % 4 == 3).unwrap();
        ship.learn().unwrap();
    }
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut original = Ship::new(config(dir.path())).unwrap();
    train(&mut original, 6);

    let path = original.save().unwrap();
    assert_eq!(path, dir.path().join("ship_net_6.chkpt"));
    assert!(path.exists());

    let mut restored = Ship::new(AgentConfig { seed: Some(99), ..config(dir.path()) }).unwrap();
    assert_ne!(
        restored.net().online().export_parameters(),
        original.net().online().export_parameters()
    );
    restored.load(&path).unwrap();

    assert_eq!(restored.curr_step(), 6);
    assert_eq!(restored.exploration_rate(), original.exploration_rate());
    assert_eq!(restored.policy(), original.policy());
    assert_eq!(restored.memory(), original.memory());
    assert_eq!(restored.optimizer(), original.optimizer());
    assert_eq!(
        restored.net().online().export_parameters(),
        original.net().online().export_parameters()
    );
    assert_eq!(
        restored.net().target().export_parameters(),
        original.net().target().export_parameters()
    );
    assert_eq!(restored.config().learning_rate, original.config().learning_rate);
    assert_eq!(restored.config().seed, Some(99));
}

#[test]
fn test_loaded_agent_continues_identically() {
    let dir = tempfile::tempdir().unwrap();
    let mut original = Ship::new(config(dir.path())).unwrap();
    train(&mut original, 5);
    let path = original.save().unwrap();

    let mut restored = Ship::new(config(dir.path())).unwrap();
    restored.load(&path).unwrap();

    original.reseed(1234);
    restored.reseed(1234);
    let a = original.learn().unwrap().unwrap();
    let b = restored.learn().unwrap().unwrap();
    assert_eq!(a, b);

    let (action_a, values_a) = original.act(frame(50).view()).unwrap();
    let (action_b, values_b) = restored.act(frame(50).view()).unwrap();
    assert_eq!(action_a, action_b);
    assert_eq!(values_a, values_b);
}

#[test]
fn test_checkpoint_holds_named_fields() {
    let dir = tempfile::tempdir().unwrap();
    let mut ship = Ship::new(config(dir.path())).unwrap();
    train(&mut ship, 3);
    let path = ship.save().unwrap();

    let checkpoint = Checkpoint::read_from(&path).unwrap();
    assert_eq!(checkpoint.format_version, CHECKPOINT_FORMAT_VERSION);
    assert_eq!(checkpoint.curr_step, 3);
    assert_eq!(checkpoint.batch_size, 2);
    assert_eq!(checkpoint.sync_every, 3);
    assert_eq!(checkpoint.replay_buffer_contents.len(), 3);
    assert_eq!(checkpoint.parameters_online.len(), 10);
    assert_eq!(checkpoint.exploration_rate, ship.exploration_rate());
}

#[test]
fn test_save_creates_directory_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("runs").join("a");
    let ship = Ship::new(config(&nested)).unwrap();

    let path = ship.save().unwrap();
    assert_eq!(path, nested.join("ship_net_0.chkpt"));
    let entries: Vec<_> = std::fs::read_dir(&nested).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_load_errors_leave_agent_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut ship = Ship::new(config(dir.path())).unwrap();
    train(&mut ship, 4);
    let before = ship.net().online().export_parameters();

    let missing = ship.load(dir.path().join("missing.chkpt"));
    assert!(matches!(missing, Err(ShipError::Checkpoint(_))));

    let corrupt = dir.path().join("corrupt.chkpt");
    std::fs::write(&corrupt, [7u8; 64]).unwrap();
    assert!(matches!(ship.load(&corrupt), Err(ShipError::Checkpoint(_))));

    let other_dir = tempfile::tempdir().unwrap();
    let other = Ship::new(AgentConfig { action_dim: 3, ..config(other_dir.path()) }).unwrap();
    let incompatible = other.save().unwrap();
    assert!(matches!(ship.load(&incompatible), Err(ShipError::Checkpoint(_))));

    assert_eq!(ship.curr_step(), 4);
    assert_eq!(ship.memory().len(), 4);
    assert_eq!(ship.net().online().export_parameters(), before);
}

#[test]
fn test_save_if_due() {
    let dir = tempfile::tempdir().unwrap();
    let mut ship = Ship::new(AgentConfig { save_every: 2, ..config(dir.path()) }).unwrap();
    assert_eq!(ship.save_if_due().unwrap(), None);

    ship.act(frame(0).view()).unwrap();
    assert_eq!(ship.save_if_due().unwrap(), None);

    ship.act(frame(0).view()).unwrap();
    let saved = ship.save_if_due().unwrap().unwrap();
    assert_eq!(saved, dir.path().join("ship_net_2.chkpt"));
}

#[test]
fn test_run_episode_on_corridor() {
    let dir = tempfile::tempdir().unwrap();
    let mut ship = Ship::new(config(dir.path())).unwrap();
    let mut env = Corridor::new(3);

    let stats = run_episode(&mut ship, &mut env, 12).unwrap();
    assert!(stats.steps > 0 && stats.steps <= 12);
    assert_eq!(ship.curr_step(), stats.steps);
    assert_eq!(ship.memory().len() as u64, stats.steps.min(16));
    if stats.steps > 2 {
        assert!(stats.mean_loss.unwrap().is_finite());
        assert!(stats.mean_q.is_some());
    }

    let before = ship.curr_step();
    let second = run_episode(&mut ship, &mut env, 4).unwrap();
    assert_eq!(ship.curr_step(), before + second.steps);
}
