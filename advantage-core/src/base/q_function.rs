//! Action-value function.
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

/// A training example `(o, a, target)` given to [`QFunction::train_step`].
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingSample<O> {
    /// Observation.
    pub obs: O,

    /// Action whose value is regressed.
    pub act: usize,

    /// TD target of the action value.
    pub target: f32,
}

/// A trainable approximator of action values.
///
/// The policy network and the target network of DQN are two instances of the
/// same type. The target network is only ever changed through
/// [`QFunction::set_parameters`].
pub trait QFunction {
    /// Observation given to the function.
    type Obs;

    /// Snapshot of all parameters, copied by value.
    type Params: Clone + PartialEq + Serialize + DeserializeOwned + Send + 'static;

    /// Returns the number of actions, i.e., the length of [`QFunction::predict`] outputs.
    fn num_actions(&self) -> usize;

    /// Returns action values for the given observation.
    fn predict(&self, obs: &Self::Obs) -> Result<Vec<f32>>;

    /// Performs an optimization step on the given batch and returns the loss.
    fn train_step(&mut self, batch: &[TrainingSample<Self::Obs>]) -> Result<f32>;

    /// Returns a copy of the parameters.
    fn parameters(&self) -> Self::Params;

    /// Overwrites the parameters.
    fn set_parameters(&mut self, params: &Self::Params) -> Result<()>;
}
