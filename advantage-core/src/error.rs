//! Errors in the library.
use std::path::PathBuf;
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdvantageError {
    /// The replay buffer cannot supply the requested batch.
    #[error("Insufficient data in replay buffer: requested {requested}, available {available}")]
    InsufficientData {
        /// Requested batch size.
        requested: usize,
        /// Number of valid transitions in the buffer.
        available: usize,
    },

    /// Configuration rejected at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The optimizer reported a non-finite loss.
    #[error("Non-finite loss {loss} after {training_steps} training steps")]
    NonFiniteLoss {
        /// The loss value returned by the model.
        loss: f32,
        /// Training steps completed before the failing round.
        training_steps: usize,
    },

    /// An action index outside `[0, num_actions)`.
    #[error("Action {act} out of range for {num_actions} actions")]
    ActionOutOfRange {
        /// The action index.
        act: usize,
        /// The number of actions.
        num_actions: usize,
    },

    /// The model returned action values of an unexpected length.
    #[error("Expected {expected} action values, got {actual}")]
    PredictionShape {
        /// Number of actions of the environment.
        expected: usize,
        /// Length of the returned vector.
        actual: usize,
    },

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// A checkpoint file does not exist.
    #[error("Checkpoint file not found: {0:?}")]
    CheckpointMissing(PathBuf),
}
