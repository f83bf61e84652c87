use ndarray::{arr1, Array3, Array4, ArrayD, Axis};
use crate::agent::{ActionValues, AgentConfig, Ship};
use crate::error::ShipError;
use crate::network::{argmax, Model};

const ACTIONS: usize = 4;

fn frame(seed: usize) -> Array3<f32> {
    Array3::from_shape_fn((1, 84, 84), |(_, h, w)| ((seed * 17 + h * 5 + w) as f32 * 0.03).cos().abs())
}

fn learning_ship(batch_size: usize, burn_in: u64, learn_every: u64, sync_every: u64) -> Ship {
    let config = AgentConfig::builder()
        .state_dim((1, 84, 84))
        .action_dim(ACTIONS)
        .batch_size(batch_size)
        .burn_in(burn_in)
        .learn_every(learn_every)
        .sync_every(sync_every)
        .seed(11)
        .build()
        .unwrap();
    Ship::new(config).unwrap()
}

fn greedy_ship() -> Ship {
    let config = AgentConfig::builder()
        .state_dim((1, 84, 84))
        .action_dim(ACTIONS)
        .exploration(0.0, 1.0, 0.0)
        .seed(3)
        .build()
        .unwrap();
    Ship::new(config).unwrap()
}

fn perturb_online(ship: &mut Ship) {
    let changed: Vec<ArrayD<f32>> = ship
        .net
        .online()
        .export_parameters()
        .iter()
        .map(|p| p.mapv(|x| x * 1.01 + 0.001))
        .collect();
    ship.net.online_mut().import_parameters(&changed).unwrap();
}

fn networks_equal(ship: &Ship) -> bool {
    ship.net().online().export_parameters() == ship.net().target().export_parameters()
}

#[test]
fn test_ship_rejects_bad_frames() {
    let config = AgentConfig::new((1, 80, 84), ACTIONS, "unused");
    assert!(matches!(Ship::new(config), Err(ShipError::Configuration { .. })));
}

#[test]
fn test_explore_reports_no_values() {
    let mut ship = learning_ship(2, 0, 1, 100);
    assert_eq!(ship.exploration_rate(), 1.0);

    let (action, values) = ship.act(frame(0).view()).unwrap();
    assert!(action < ACTIONS);
    assert_eq!(values, ActionValues::NotComputed);
    assert_eq!(ship.curr_step(), 1);
    assert_eq!(ship.exploration_rate(), 0.99999975);
}

#[test]
fn test_exploit_returns_argmax_of_online_values() {
    let mut ship = greedy_ship();
    let state = frame(4);
    let (action, values) = ship.act(state.view()).unwrap();

    let q = values.as_array().unwrap().clone();
    assert_eq!(q.len(), ACTIONS);
    assert_eq!(action, argmax(q.view()));

    let expected = ship
        .net
        .forward(state.view().insert_axis(Axis(0)), Model::Online)
        .unwrap()
        .index_axis_move(Axis(0), 0);
    assert_eq!(q, expected);
    assert_eq!(ship.exploration_rate(), 0.0);
}

#[test]
fn test_epsilon_decays_once_per_action() {
    let mut ship = learning_ship(2, 0, 1, 100);
    let state = frame(1);
    for _ in 0..10 {
        ship.act(state.view()).unwrap();
    }
    assert_eq!(ship.curr_step(), 10);
    let expected = (0..10).fold(1.0f64, |rate, _| (rate * 0.99999975).max(0.1));
    assert_eq!(ship.exploration_rate(), expected);
}

#[test]
fn test_act_and_cache_validate_input() {
    let mut ship = learning_ship(2, 0, 1, 100);
    let wrong = Array3::<f32>::zeros((2, 84, 84));
    assert!(matches!(ship.act(wrong.view()), Err(ShipError::DimensionMismatch { .. })));
    assert_eq!(ship.curr_step(), 0);

    assert!(matches!(
        ship.cache(frame(0), wrong, 0, 0.0, false),
        Err(ShipError::DimensionMismatch { .. })
    ));
    assert_eq!(
        ship.cache(frame(0), frame(1), ACTIONS, 0.0, false),
        Err(ShipError::InvalidAction { action: ACTIONS, max_actions: ACTIONS })
    );
    assert!(ship.memory().is_empty());

    ship.cache(frame(0), frame(1), ACTIONS - 1, 1.0, true).unwrap();
    assert_eq!(ship.memory().len(), 1);
}

#[test]
fn test_learn_waits_for_burn_in() {
    let mut ship = learning_ship(2, 5, 1, 100);
    ship.cache(frame(0), frame(1), 0, 1.0, false).unwrap();
    ship.cache(frame(1), frame(2), 1, 0.0, false).unwrap();

    for _ in 0..5 {
        assert_eq!(ship.learn().unwrap(), None);
        ship.act(frame(0).view()).unwrap();
    }
    assert_eq!(ship.curr_step(), 5);
    assert!(ship.learn().unwrap().is_some());
}

#[test]
fn test_learn_is_throttled_between_updates() {
    let mut ship = learning_ship(2, 0, 3, 100);
    ship.cache(frame(0), frame(1), 0, 1.0, false).unwrap();
    ship.cache(frame(1), frame(2), 1, 0.0, false).unwrap();

    let mut updates = Vec::new();
    for step in 0..7 {
        if ship.learn().unwrap().is_some() {
            updates.push(step);
        }
        ship.act(frame(0).view()).unwrap();
    }
    assert_eq!(updates, vec![0, 3, 6]);
}

#[test]
fn test_sync_step_copies_online_exactly() {
    // Burn-in keeps the online network still, syncs happen regardless
    let mut ship = learning_ship(2, 1_000, 1, 2);
    perturb_online(&mut ship);
    assert!(!networks_equal(&ship));

    assert_eq!(ship.learn().unwrap(), None);
    assert!(networks_equal(&ship));

    perturb_online(&mut ship);
    ship.act(frame(0).view()).unwrap();
    ship.learn().unwrap();
    assert!(!networks_equal(&ship));

    ship.act(frame(0).view()).unwrap();
    ship.learn().unwrap();
    assert!(networks_equal(&ship));
}

#[test]
fn test_terminal_target_is_reward() {
    let mut ship = learning_ship(2, 0, 1, 100);
    let next_states = ndarray::stack(Axis(0), &[frame(5).view(), frame(6).view()]).unwrap();
    let rewards = arr1(&[3.5, -1.25]);
    let dones = arr1(&[1.0, 1.0]);

    let target = ship.td_target(rewards.view(), next_states.view(), dones.view()).unwrap();
    assert_eq!(target, rewards);
}

#[test]
fn test_non_terminal_target_is_double_dqn() {
    let mut ship = learning_ship(2, 0, 1, 100);
    perturb_online(&mut ship);

    let next_states: Array4<f32> = ndarray::stack(Axis(0), &[frame(7).view(), frame(8).view()]).unwrap();
    let rewards = arr1(&[0.5, 2.0]);
    let dones = arr1(&[0.0, 1.0]);
    let target = ship.td_target(rewards.view(), next_states.view(), dones.view()).unwrap();

    let online = ship.net.forward(next_states.view(), Model::Online).unwrap();
    let target_q = ship.net.forward(next_states.view(), Model::Target).unwrap();
    let best = argmax(online.row(0));
    let gamma = ship.config().gamma;
    assert_eq!(target[0], 0.5 + gamma * target_q[[0, best]]);
    assert_eq!(target[1], 2.0);
}

#[test]
fn test_td_estimate_picks_taken_action() {
    let mut ship = greedy_ship();
    let states = ndarray::stack(Axis(0), &[frame(1).view(), frame(2).view()]).unwrap();
    let q = ship.net.forward(states.view(), Model::Online).unwrap();

    let estimate = ship.td_estimate(states.view(), &[3, 0]).unwrap();
    assert_eq!(estimate, arr1(&[q[[0, 3]], q[[1, 0]]]));

    assert!(matches!(
        ship.td_estimate(states.view(), &[0, ACTIONS]),
        Err(ShipError::InvalidAction { .. })
    ));
}

#[test]
fn test_minimal_end_to_end_update() {
    let mut ship = learning_ship(2, 0, 1, 100);
    ship.cache(frame(0), frame(1), 2, 1.0, false).unwrap();
    ship.cache(frame(1), frame(2), 0, -1.0, true).unwrap();

    let stats = ship.learn().unwrap().unwrap();
    assert!(stats.loss.is_finite());
    assert!(stats.loss >= 0.0);
    assert!(stats.mean_q.is_finite());

    // Step 0 synced before the update, so only the online network moved
    assert!(!networks_equal(&ship));
}

#[test]
fn test_learn_with_too_little_memory() {
    let mut ship = learning_ship(2, 0, 1, 100);
    ship.cache(frame(0), frame(1), 2, 1.0, false).unwrap();
    assert_eq!(
        ship.learn(),
        Err(ShipError::InsufficientData { requested: 2, available: 1 })
    );
}

#[test]
fn test_update_leaves_target_untouched() {
    let mut ship = learning_ship(2, 0, 1, 100);
    ship.cache(frame(0), frame(1), 2, 1.0, false).unwrap();
    ship.cache(frame(1), frame(2), 0, -1.0, false).unwrap();
    ship.learn().unwrap().unwrap();

    for _ in 0..2 {
        ship.act(frame(3).view()).unwrap();
        let target_before = ship.net().target().export_parameters();
        let online_before = ship.net().online().export_parameters();

        assert!(ship.learn().unwrap().is_some());
        assert_eq!(ship.net().target().export_parameters(), target_before);
        assert_ne!(ship.net().online().export_parameters(), online_before);
    }
}

#[test]
fn test_exploration_rate_never_rises() {
    let config = AgentConfig::builder()
        .state_dim((1, 84, 84))
        .action_dim(ACTIONS)
        .exploration(0.12, 0.9, 0.1)
        .seed(5)
        .build()
        .unwrap();
    let mut ship = Ship::new(config).unwrap();

    let mut previous = ship.exploration_rate();
    for _ in 0..5 {
        ship.act(frame(2).view()).unwrap();
        assert!(ship.exploration_rate() <= previous);
        assert!(ship.exploration_rate() >= 0.1);
        previous = ship.exploration_rate();
    }
    assert_eq!(previous, 0.1);
}
