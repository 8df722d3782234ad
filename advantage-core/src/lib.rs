#![warn(missing_docs)]
//! Replay, exploration and training cadence for DQN agents.
//!
//! The environment and the action-value function are given by implementing
//! [`Env`] and [`QFunction`]. [`TrainingOrchestrator`] runs episodes with an
//! epsilon-greedy policy, stores transitions in an
//! [`ExperienceReplayBuffer`](replay_buffer::ExperienceReplayBuffer), trains
//! the policy network on a trajectory-counted cadence, synchronizes the
//! target network on a training-step-counted cadence and saves checkpoints
//! on a wall-clock interval.
//!
//! ```rust
//! use advantage_core::{
//!     dummy::{DummyEnv, DummyQFunction},
//!     record::BufferedRecorder,
//!     TrainerConfig, TrainingOrchestrator,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = TrainerConfig::default()
//!     .buffer_size(128)
//!     .batch_size(8)
//!     .sample_less(true)
//!     .improve_for_steps(20)
//!     .max_episode_steps(50);
//! let mut orchestrator = TrainingOrchestrator::build(
//!     config,
//!     DummyEnv::new(5),
//!     DummyQFunction::new(2),
//!     DummyQFunction::new(2),
//! )?;
//! let report = orchestrator.train(&mut BufferedRecorder::new())?;
//! assert_eq!(report.trajectories_completed, 20);
//! # Ok(())
//! # }
//! ```
pub mod checkpoint;
pub mod dummy;
pub mod error;
pub mod explorer;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Env, ExperienceBufferBase, IdentityNormalizer, Normalizer, QFunction, ReplayBufferBase, Step,
    TrainingSample, Transition,
};

mod trainer;
pub use trainer::{
    td_targets, CadenceOrigin, SchedulerState, StopHandle, TargetSynchronizer, TickReport,
    TrainerConfig, TrainingOrchestrator, TrainingReport, TrainingScheduler, TrajectoryCollector,
    TrajectoryStats,
};
