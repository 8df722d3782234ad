//! Configuration of [`ExperienceReplayBuffer`](super::ExperienceReplayBuffer).
use serde::{Deserialize, Serialize};

/// Configuration of [`ExperienceReplayBuffer`](super::ExperienceReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayBufferConfig {
    /// Maximum number of transitions. When the buffer is full, new transitions
    /// replace the oldest ones.
    pub capacity: usize,

    /// If `true`, a batch request larger than the number of stored transitions
    /// returns all of them instead of failing.
    pub sample_less: bool,

    /// Random seed used for sampling.
    pub seed: u64,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            sample_less: false,
            seed: 42,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the sample-less policy.
    pub fn sample_less(mut self, sample_less: bool) -> Self {
        self.sample_less = sample_less;
        self
    }

    /// Sets the random seed for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
