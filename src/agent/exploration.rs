use ndarray::Array1;
use rand::Rng;
use serde::{Serialize, Deserialize};

/// Epsilon-greedy exploration with multiplicative decay towards a floor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpsilonGreedy {
    rate: f64,
    decay: f64,
    min: f64,
}

impl EpsilonGreedy {
    pub fn new(rate: f64, decay: f64, min: f64) -> Self {
        EpsilonGreedy { rate, decay, min }
    }

    /// Current exploration probability
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn decay_factor(&self) -> f64 {
        self.decay
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    /// Draw `u ~ U[0, 1)` and report whether to explore
    pub fn should_explore<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() < self.rate
    }

    /// `rate <- max(min, rate * decay)`, returning the new rate
    pub fn decay(&mut self) -> f64 {
        self.rate = (self.rate * self.decay).max(self.min);
        self.rate
    }
}

/// Action values reported alongside a selected action.
///
/// Random (exploring) actions never run the network, so they carry no values.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionValues {
    NotComputed,
    Computed(Array1<f32>),
}

impl ActionValues {
    pub fn is_computed(&self) -> bool {
        matches!(self, ActionValues::Computed(_))
    }

    pub fn as_array(&self) -> Option<&Array1<f32>> {
        match self {
            ActionValues::Computed(values) => Some(values),
            ActionValues::NotComputed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_decay_reaches_floor() {
        let mut policy = EpsilonGreedy::new(1.0, 0.5, 0.1);
        assert_eq!(policy.decay(), 0.5);
        assert_eq!(policy.decay(), 0.25);
        assert_eq!(policy.decay(), 0.125);
        assert_eq!(policy.decay(), 0.1);
        assert_eq!(policy.decay(), 0.1);
    }

    #[test]
    fn test_extreme_rates() {
        let mut rng = StdRng::seed_from_u64(0);
        let always = EpsilonGreedy::new(1.0, 1.0, 1.0);
        let never = EpsilonGreedy::new(0.0, 1.0, 0.0);
        for _ in 0..100 {
            assert!(always.should_explore(&mut rng));
            assert!(!never.should_explore(&mut rng));
        }
    }
}
