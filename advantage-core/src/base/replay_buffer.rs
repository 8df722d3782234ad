//! Replay buffer interface.
//!
//! Storing experiences and generating batches are separate traits, following
//! the split between the process that collects transitions and the process
//! that consumes them for optimization.
use crate::error::AdvantageError;

/// Interface for buffers that store experiences from environments.
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    ///
    /// Pushing never fails, the oldest item is overwritten when the buffer is full.
    fn push(&mut self, tr: Self::Item);

    /// Returns the current number of experiences in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if no experience is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Self;

    /// Constructs a batch of experiences for training.
    ///
    /// Returns [`AdvantageError::InsufficientData`] if the buffer cannot supply
    /// the batch.
    fn batch(&mut self, size: usize) -> Result<Self::Batch, AdvantageError>;
}
