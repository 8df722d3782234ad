//! Checkpoints of the model pair and the training counters.
//!
//! A checkpoint consists of three files in the checkpoint directory:
//!
//! * `{prefix}_policy.bin` - parameters of the policy network (bincode)
//! * `{prefix}_target.bin` - parameters of the target network (bincode)
//! * `{prefix}_state.yaml` - [`TrainingCounters`] and the time of saving
//!
//! [`CheckpointScheduler`] requests a save when `checkpoint_freq_sec` seconds
//! have passed since the previous request.
mod base;
mod scheduler;
mod writer;
pub use base::{Checkpoint, TrainingCounters};
pub use scheduler::{CheckpointOutcome, CheckpointScheduler};
