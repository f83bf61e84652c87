use ndarray::{Array, Dimension, ShapeBuilder};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Normal;
use crate::activations::Activation;
use crate::error::{Result, ShipError};

/// Weight initialization strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightInit {
    /// Xavier/Glorot normal initialization
    XavierNormal,

    /// He/Kaiming normal initialization (for ReLU)
    HeNormal,

    /// All zeros
    Zeros,
}

impl WeightInit {
    /// Draw a parameter tensor of the given shape.
    ///
    /// `fan_in` and `fan_out` are the number of inputs feeding one output unit
    /// and the number of outputs one input unit feeds; for a convolution they
    /// include the kernel area.
    pub fn initialize<Sh, D, R>(&self, shape: Sh, fan_in: usize, fan_out: usize, rng: &mut R) -> Result<Array<f32, D>>
    where
        Sh: ShapeBuilder<Dim = D>,
        D: Dimension,
        R: Rng + ?Sized,
    {
        let std = match self {
            WeightInit::XavierNormal => (2.0 / (fan_in + fan_out).max(1) as f32).sqrt(),
            WeightInit::HeNormal => (2.0 / fan_in.max(1) as f32).sqrt(),
            WeightInit::Zeros => return Ok(Array::zeros(shape)),
        };
        let dist = Normal::new(0.0, std)
            .map_err(|e| ShipError::configuration("weight_init".to_string(), e.to_string()))?;
        Ok(Array::random_using(shape, dist, rng))
    }

    /// Get the recommended initialization for an activation function
    pub fn for_activation(activation: &Activation) -> Self {
        match activation {
            Activation::Relu => WeightInit::HeNormal,
            Activation::Linear => WeightInit::XavierNormal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Ix2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_seeded_init_is_reproducible() {
        let mut a = StdRng::seed_from_u64(11);
        let mut b = StdRng::seed_from_u64(11);
        let wa = WeightInit::HeNormal.initialize::<_, Ix2, _>((8, 4), 8, 4, &mut a).unwrap();
        let wb = WeightInit::HeNormal.initialize::<_, Ix2, _>((8, 4), 8, 4, &mut b).unwrap();
        assert_eq!(wa, wb);
    }

    #[test]
    fn test_zeros() {
        let mut rng = StdRng::seed_from_u64(0);
        let w = WeightInit::Zeros.initialize((3, 2, 2, 2), 12, 12, &mut rng).unwrap();
        assert!(w.iter().all(|&v| v == 0.0));
    }
}
