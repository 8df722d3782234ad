//! Environment step and transitions.

/// Represents an observation, reward and termination flag emitted by
/// [`Env::step`](super::Env::step).
#[derive(Clone, Debug, PartialEq)]
pub struct Step<O> {
    /// Observation after the action was applied.
    pub obs: O,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if the episode ended.
    pub is_done: bool,
}

impl<O> Step<O> {
    /// Constructs a [`Step`] object.
    pub fn new(obs: O, reward: f32, is_done: bool) -> Self {
        Self {
            obs,
            reward,
            is_done,
        }
    }
}

/// A transition `(o_t, a_t, r_t, o_t+1, is_done_t)`.
///
/// For n-step returns, `r_t` is the discounted sum of the rewards of
/// [`Transition::bootstrap_steps`] steps and `o_t+1` is the observation after
/// the last of them.
///
/// Fields are private, a transition cannot be modified after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<O> {
    obs: O,
    act: usize,
    reward: f32,
    next_obs: O,
    is_done: bool,
    bootstrap_steps: usize,
}

impl<O> Transition<O> {
    /// Constructs a transition.
    pub fn new(obs: O, act: usize, reward: f32, next_obs: O, is_done: bool) -> Self {
        Self {
            obs,
            act,
            reward,
            next_obs,
            is_done,
            bootstrap_steps: 1,
        }
    }

    /// Sets the number of environment steps covered by the reward.
    pub fn with_bootstrap_steps(mut self, n: usize) -> Self {
        self.bootstrap_steps = n;
        self
    }

    /// Returns `o_t`.
    pub fn obs(&self) -> &O {
        &self.obs
    }

    /// Returns `a_t`.
    pub fn act(&self) -> usize {
        self.act
    }

    /// Returns `r_t`.
    pub fn reward(&self) -> f32 {
        self.reward
    }

    /// Returns `o_t+1`.
    pub fn next_obs(&self) -> &O {
        &self.next_obs
    }

    /// Returns `is_done_t`.
    pub fn is_done(&self) -> bool {
        self.is_done
    }

    /// Returns the number of environment steps covered by the reward, 1 by default.
    pub fn bootstrap_steps(&self) -> usize {
        self.bootstrap_steps
    }

    /// Unpack the data `(o_t, a_t, r_t, o_t+1, is_done_t)`.
    pub fn unpack(self) -> (O, usize, f32, O, bool) {
        (self.obs, self.act, self.reward, self.next_obs, self.is_done)
    }
}
