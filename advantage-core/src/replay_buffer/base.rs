use super::ReplayBufferConfig;
use crate::{
    error::AdvantageError, ExperienceBufferBase, ReplayBufferBase, Transition,
};
use log::warn;
use rand::{rngs::StdRng, seq::index, SeedableRng};

/// A fixed-capacity circular store of transitions.
///
/// Until the buffer is full, transitions are appended. After that, each push
/// overwrites the slot at the write cursor `i`, which always points to the
/// oldest transition.
pub struct ExperienceReplayBuffer<O> {
    capacity: usize,

    /// Write cursor.
    i: usize,

    /// Number of valid transitions.
    size: usize,

    sample_less: bool,
    slots: Vec<Transition<O>>,
    rng: StdRng,
}

impl<O: Clone> ExperienceReplayBuffer<O> {
    /// Returns the capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if the buffer holds `capacity` transitions.
    pub fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Returns the number of transitions a request of `n` would return,
    /// or an error if the request cannot be served.
    pub fn effective_batch_size(&self, n: usize) -> Result<usize, AdvantageError> {
        if self.size >= n {
            Ok(n)
        } else if self.sample_less && self.size > 0 {
            Ok(self.size)
        } else {
            Err(AdvantageError::InsufficientData {
                requested: n,
                available: self.size,
            })
        }
    }

    /// Samples `n` distinct transitions uniformly at random.
    ///
    /// If fewer than `n` transitions are stored, returns all of them when
    /// `sample_less` is set and fails with [`AdvantageError::InsufficientData`]
    /// otherwise. An empty buffer always fails.
    pub fn sample(&mut self, n: usize) -> Result<Vec<Transition<O>>, AdvantageError> {
        let n = self.effective_batch_size(n)?;
        let ixs = index::sample(&mut self.rng, self.size, n);
        Ok(ixs.into_iter().map(|ix| self.slots[ix].clone()).collect())
    }

    /// Iterates the stored transitions from the oldest to the newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition<O>> + '_ {
        let (newer, older) = self.slots.split_at(self.i % self.size.max(1));
        older.iter().chain(newer.iter())
    }
}

impl<O> ExperienceBufferBase for ExperienceReplayBuffer<O> {
    type Item = Transition<O>;

    fn push(&mut self, tr: Transition<O>) {
        if self.slots.len() < self.capacity {
            self.slots.push(tr);
        } else {
            self.slots[self.i] = tr;
        }
        self.i = (self.i + 1) % self.capacity;
        self.size = self.slots.len();
    }

    fn len(&self) -> usize {
        self.size
    }
}

impl<O: Clone> ReplayBufferBase for ExperienceReplayBuffer<O> {
    type Config = ReplayBufferConfig;
    type Batch = Vec<Transition<O>>;

    /// Creates an empty buffer.
    ///
    /// A capacity of zero is raised to one. In training,
    /// [`TrainerConfig::validate`] rejects it before a buffer is built.
    ///
    /// [`TrainerConfig::validate`]: crate::TrainerConfig::validate
    fn build(config: &Self::Config) -> Self {
        let capacity = match config.capacity {
            0 => {
                warn!("Replay buffer capacity is 0, using 1");
                1
            }
            n => n,
        };
        Self {
            capacity,
            i: 0,
            size: 0,
            sample_less: config.sample_less,
            slots: Vec::with_capacity(capacity),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch, AdvantageError> {
        self.sample(size)
    }
}
