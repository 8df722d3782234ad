//! Epsilon-greedy exploration with staged exponential decay.
use crate::error::AdvantageError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parameters of [`EpsilonScheduler`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonConfig {
    /// Epsilon at step 0.
    pub initial_value: f64,

    /// Lower bound of epsilon.
    pub min_value: f64,

    /// Number of steps in a decay stage.
    pub decay_steps: usize,

    /// Multiplier applied once per decay stage, in `(0, 1]`.
    pub decay_rate: f64,
}

impl Default for EpsilonConfig {
    fn default() -> Self {
        Self {
            initial_value: 1.0,
            min_value: 0.1,
            decay_steps: 32,
            decay_rate: 0.9,
        }
    }
}

impl EpsilonConfig {
    /// Sets the initial value.
    pub fn initial_value(mut self, v: f64) -> Self {
        self.initial_value = v;
        self
    }

    /// Sets the lower bound.
    pub fn min_value(mut self, v: f64) -> Self {
        self.min_value = v;
        self
    }

    /// Sets the number of steps in a decay stage.
    pub fn decay_steps(mut self, v: usize) -> Self {
        self.decay_steps = v;
        self
    }

    /// Sets the decay rate.
    pub fn decay_rate(mut self, v: f64) -> Self {
        self.decay_rate = v;
        self
    }

    /// Checks the parameters.
    pub fn validate(&self) -> Result<(), AdvantageError> {
        let err = |msg: &str| Err(AdvantageError::InvalidConfig(format!("epsilon.{}", msg)));
        if !(0.0..=1.0).contains(&self.initial_value) {
            return err("initial_value must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.min_value) {
            return err("min_value must be in [0, 1]");
        }
        if self.min_value > self.initial_value {
            return err("min_value must not exceed initial_value");
        }
        if self.decay_steps == 0 {
            return err("decay_steps must be positive");
        }
        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            return err("decay_rate must be in (0, 1]");
        }
        Ok(())
    }
}

/// Exploration probability as a function of a decay-step counter.
///
/// `value_at(step) = max(min_value, initial_value * decay_rate ^ floor(step / decay_steps))`.
/// The counter is advanced once per completed trajectory by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct EpsilonScheduler {
    config: EpsilonConfig,
    step: usize,
}

impl EpsilonScheduler {
    /// Creates a scheduler at step 0.
    pub fn new(config: EpsilonConfig) -> Self {
        Self { config, step: 0 }
    }

    /// Returns epsilon at the given step.
    pub fn value_at(&self, step: usize) -> f64 {
        let stage = (step / self.config.decay_steps).min(i32::MAX as usize) as i32;
        let v = self.config.initial_value * self.config.decay_rate.powi(stage);
        v.max(self.config.min_value).min(self.config.initial_value)
    }

    /// Returns epsilon at the current step.
    pub fn value(&self) -> f64 {
        self.value_at(self.step)
    }

    /// Returns the decay-step counter.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Advances the decay-step counter.
    pub fn advance(&mut self) {
        self.step += 1;
    }

    /// Sets the decay-step counter, used when resuming from a checkpoint.
    pub fn set_step(&mut self, step: usize) {
        self.step = step;
    }
}

/// Takes a uniformly random action with probability `eps`, otherwise the
/// first action with the largest value.
///
/// `action_values` must not be empty.
pub fn epsilon_greedy(action_values: &[f32], eps: f64, rng: &mut impl Rng) -> usize {
    if rng.gen::<f64>() < eps {
        rng.gen_range(0..action_values.len())
    } else {
        argmax(action_values)
    }
}

/// Index of the first maximal element. `NaN` values are never selected unless
/// all values are `NaN`.
pub fn argmax(xs: &[f32]) -> usize {
    let mut best = 0;
    for (i, x) in xs.iter().enumerate() {
        if xs[best].is_nan() || *x > xs[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    fn scheduler() -> EpsilonScheduler {
        EpsilonScheduler::new(EpsilonConfig::default())
    }

    #[test]
    fn test_staged_decay() {
        let s = scheduler();
        assert_eq!(s.value_at(0), 1.0);
        assert_eq!(s.value_at(31), 1.0);
        assert!((s.value_at(32) - 0.9).abs() < 1e-12);
        assert!((s.value_at(320) - 0.9f64.powi(10)).abs() < 1e-12);
        assert!((s.value_at(320) - 0.349).abs() < 1e-3);
    }

    #[test]
    fn test_bounds_and_monotonicity() {
        let s = EpsilonScheduler::new(EpsilonConfig::default().decay_steps(3).decay_rate(0.5));
        let mut prev = s.value_at(0);
        for step in 0..10_000 {
            let v = s.value_at(step);
            assert!(v <= prev);
            assert!(v >= 0.1 && v <= 1.0);
            prev = v;
        }
        assert_eq!(s.value_at(usize::MAX), 0.1);
    }

    #[test]
    fn test_no_decay() {
        let s = EpsilonScheduler::new(EpsilonConfig::default().decay_rate(1.0));
        assert_eq!(s.value_at(1_000_000), 1.0);
    }

    #[test]
    fn test_advance() {
        let mut s = scheduler();
        for _ in 0..32 {
            s.advance();
        }
        assert_eq!(s.step(), 32);
        assert!((s.value() - 0.9).abs() < 1e-12);
        s.set_step(0);
        assert_eq!(s.value(), 1.0);
    }

    #[test]
    fn test_validate() {
        assert!(EpsilonConfig::default().validate().is_ok());
        assert!(EpsilonConfig::default().decay_rate(0.0).validate().is_err());
        assert!(EpsilonConfig::default().decay_rate(1.5).validate().is_err());
        assert!(EpsilonConfig::default().decay_steps(0).validate().is_err());
        assert!(EpsilonConfig::default().min_value(0.5).initial_value(0.4).validate().is_err());
    }

    #[test]
    fn test_epsilon_greedy() {
        let mut rng = SmallRng::seed_from_u64(0);
        let q = [0.1, 2.0, -1.0];
        for _ in 0..100 {
            assert_eq!(epsilon_greedy(&q, 0.0, &mut rng), 1);
        }
        let mut seen = [false; 3];
        for _ in 0..1000 {
            seen[epsilon_greedy(&q, 1.0, &mut rng)] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), 1);
        assert_eq!(argmax(&[f32::NAN, -1.0]), 1);
        assert_eq!(argmax(&[5.0]), 0);
    }
}
