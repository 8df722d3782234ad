//! Experience replay buffer.
//!
//! [`ExperienceReplayBuffer`] keeps the last `capacity` transitions in a
//! circular store and samples minibatches uniformly, without replacement
//! within a batch.
mod base;
mod config;
pub use base::ExperienceReplayBuffer;
pub use config::ReplayBufferConfig;
