//! Scalar noise sources for the synthetic power traces.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Normal;

/// A scalar noise generator.
pub trait NoiseSource {
    /// Draw one noise sample.
    fn get(&mut self) -> f64;
}

/// The supported noise source shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoiseKind {
    /// No noise at all.
    Zero,
    /// A constant offset.
    Constant(f64),
    /// Uniform on `[-level/2, +level/2]`.
    Uniform(f64),
    /// Gaussian with mean 0 and standard deviation `level/2`.
    Normal(f64),
}

struct ZeroNoise;

impl NoiseSource for ZeroNoise {
    fn get(&mut self) -> f64 {
        0.0
    }
}

struct ConstantNoise {
    value: f64,
}

impl NoiseSource for ConstantNoise {
    fn get(&mut self) -> f64 {
        self.value
    }
}

struct UniformNoise {
    dist: Uniform<f64>,
    rng: StdRng,
}

impl NoiseSource for UniformNoise {
    fn get(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}

struct NormalNoise {
    dist: Normal<f64>,
    rng: StdRng,
}

impl NoiseSource for NormalNoise {
    fn get(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}

/// Build a noise source of the requested kind. The random sources are seeded
/// from OS entropy, fresh for every run.
pub fn new_source(kind: NoiseKind) -> Box<dyn NoiseSource> {
    match kind {
        NoiseKind::Zero => Box::new(ZeroNoise),
        NoiseKind::Constant(value) => Box::new(ConstantNoise { value }),
        NoiseKind::Uniform(level) => Box::new(UniformNoise {
            dist: Uniform::new_inclusive(-level / 2.0, level / 2.0),
            rng: StdRng::from_entropy(),
        }),
        NoiseKind::Normal(level) => Box::new(NormalNoise {
            dist: Normal::new(0.0, level / 2.0).expect("noise level must be finite"),
            rng: StdRng::from_entropy(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_noise() {
        let mut ns = new_source(NoiseKind::Zero);
        for _ in 0..10 {
            assert_eq!(ns.get(), 0.0);
        }
    }

    #[test]
    fn constant_noise() {
        let mut ns = new_source(NoiseKind::Constant(3.14));
        for _ in 0..10 {
            assert_eq!(ns.get(), 3.14);
        }
    }

    #[test]
    fn uniform_noise_stays_in_range() {
        let mut ns = new_source(NoiseKind::Uniform(5.0));
        for _ in 0..1000 {
            let v = ns.get();
            assert!((-2.5..=2.5).contains(&v));
        }
    }

    #[test]
    fn normal_noise_can_be_constructed() {
        let mut ns = new_source(NoiseKind::Normal(5.0));
        // A thousand standard normals one of which is > 10 sigma would be
        // something to write home about.
        for _ in 0..1000 {
            assert!(ns.get().abs() < 25.0);
        }
    }
}
