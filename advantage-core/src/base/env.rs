//! Environment.
use super::Step;
use anyhow::Result;
use std::fmt::Debug;

/// Represents an environment with a discrete action space.
///
/// Actions are integers in `[0, num_actions)`. Any error returned from
/// [`Env::reset`] or [`Env::step`] is fatal to the current trajectory.
pub trait Env {
    /// Observation of the environment.
    type Obs: Clone + Debug;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Performes an environment step.
    fn step(&mut self, act: usize) -> Result<Step<Self::Obs>>;

    /// Returns the number of discrete actions.
    fn num_actions(&self) -> usize;

    /// Returns the maximum number of steps in an episode, if the environment defines one.
    fn max_episode_steps(&self) -> Option<usize> {
        None
    }
}
