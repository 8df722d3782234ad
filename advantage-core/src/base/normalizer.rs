//! Rescaling of transitions before they enter the replay buffer.

/// Rescales observations, rewards and actions.
///
/// The rescaling rule belongs to the caller. [`TrajectoryCollector`] applies
/// each method only if the corresponding `normalize*` flag is set in
/// [`TrainerConfig`].
///
/// [`TrajectoryCollector`]: crate::TrajectoryCollector
/// [`TrainerConfig`]: crate::TrainerConfig
pub trait Normalizer<O> {
    /// Rescales an observation.
    fn normalize_obs(&mut self, obs: O) -> O;

    /// Rescales a reward.
    fn normalize_reward(&mut self, reward: f32) -> f32;

    /// Maps an action index.
    fn normalize_act(&mut self, act: usize) -> usize;
}

/// A [`Normalizer`] returning its inputs unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityNormalizer;

impl<O> Normalizer<O> for IdentityNormalizer {
    fn normalize_obs(&mut self, obs: O) -> O {
        obs
    }

    fn normalize_reward(&mut self, reward: f32) -> f32 {
        reward
    }

    fn normalize_act(&mut self, act: usize) -> usize {
        act
    }
}
