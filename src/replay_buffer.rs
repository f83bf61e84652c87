use ndarray::{Array1, Array3, Array4, Axis};
use rand::seq::index;
use rand::Rng;
use serde::{Serialize, Deserialize};
use std::collections::VecDeque;
use crate::error::{Result, ShipError};

/// One environment step as stored in replay memory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: Array3<f32>,
    pub next_state: Array3<f32>,
    pub action: usize,
    pub reward: f32,
    pub done: bool,
}

/// A sampled minibatch with every field stacked along a leading batch axis
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub states: Array4<f32>,
    pub next_states: Array4<f32>,
    pub actions: Vec<usize>,
    pub rewards: Array1<f32>,
    /// 1.0 for terminal transitions, 0.0 otherwise
    pub dones: Array1<f32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Fixed-capacity FIFO replay memory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        ReplayBuffer {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuild a buffer from transitions ordered oldest first, keeping the newest `capacity`
    pub fn from_transitions(capacity: usize, transitions: Vec<Transition>) -> Self {
        let mut buffer = Self::new(capacity);
        for transition in transitions {
            buffer.push(transition);
        }
        buffer
    }

    /// Store a transition, evicting the oldest one when full
    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `batch_size` distinct transitions uniformly at random
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch> {
        if batch_size == 0 {
            return Err(ShipError::configuration(
                "batch_size".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        if self.buffer.len() < batch_size {
            return Err(ShipError::InsufficientData {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }

        let picked = index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|i| &self.buffer[i])
            .collect::<Vec<_>>();

        let states = ndarray::stack(Axis(0), &picked.iter().map(|t| t.state.view()).collect::<Vec<_>>())?;
        let next_states = ndarray::stack(Axis(0), &picked.iter().map(|t| t.next_state.view()).collect::<Vec<_>>())?;

        Ok(Batch {
            states,
            next_states,
            actions: picked.iter().map(|t| t.action).collect(),
            rewards: picked.iter().map(|t| t.reward).collect(),
            dones: picked.iter().map(|t| if t.done { 1.0 } else { 0.0 }).collect(),
        })
    }

    /// Transitions from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
