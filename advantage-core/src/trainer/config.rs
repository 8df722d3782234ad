//! Configuration of [`TrainingOrchestrator`](super::TrainingOrchestrator).
use crate::{error::AdvantageError, explorer::EpsilonConfig, replay_buffer::ReplayBufferConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Origin of the trajectory counter used for the training cadence.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum CadenceOrigin {
    /// Training runs when `trajectories_completed % train_target_modulo == 0`.
    #[default]
    Absolute,

    /// Training runs when
    /// `(trajectories_completed - delay_improvement) % train_target_modulo == 0`,
    /// i.e., the first round happens at the trajectory ending the delay.
    SinceDelay,
}

/// Configuration of [`TrainingOrchestrator`](super::TrainingOrchestrator).
///
/// Field names follow the keys of the YAML configuration file.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TrainerConfig {
    /// Capacity of the replay buffer.
    #[serde(rename = "bufferSize")]
    pub buffer_size: usize,

    /// Interval of training in trajectories.
    pub train_target_modulo: usize,

    /// Training rounds per cadence tick.
    pub train_iterations: usize,

    /// Number of transitions per training round.
    pub batch_size: usize,

    /// Interval of target synchronization in training steps.
    pub improve_policy_modulo: usize,

    /// Allows batches smaller than `batch_size` before the buffer holds enough transitions.
    pub sample_less: bool,

    /// Trajectories collected before the first training round.
    pub delay_improvement: usize,

    /// Exploration schedule.
    pub epsilon: EpsilonConfig,

    /// Discount factor.
    pub discount_factor: f32,

    /// Number of environment steps folded into the reward of a stored
    /// transition before bootstrapping from the target network.
    pub n_step: usize,

    /// Minimum wall-clock seconds between checkpoints.
    pub checkpoint_freq_sec: u64,

    /// Directory of checkpoints. Checkpointing is disabled if `None`.
    pub checkpoint_dir_path: Option<PathBuf>,

    /// Prefix of checkpoint file names.
    pub checkpoint_file_prefix: String,

    /// Writes checkpoints on a background thread.
    pub checkpoint_in_background: bool,

    /// Interval of logging the smoothed return in trajectories.
    pub info_log_frequency: usize,

    /// Exponential smoothing factor of the logged return.
    pub average_smoothing: f32,

    /// Number of trajectories to collect.
    pub improve_for_steps: usize,

    /// Rescales rewards before they are stored.
    #[serde(rename = "normalizeReward")]
    pub normalize_reward: bool,

    /// Rescales observations before they are stored.
    #[serde(rename = "normalizeState")]
    pub normalize_state: bool,

    /// Maps actions before they are stored.
    #[serde(rename = "normalizeAction")]
    pub normalize_action: bool,

    /// Origin of the trajectory counter for the training cadence.
    pub cadence_origin: CadenceOrigin,

    /// Maximum steps in an episode, overriding the environment's own limit.
    pub max_episode_steps: Option<usize>,

    /// Random seed of exploration and sampling.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1024,
            train_target_modulo: 1,
            train_iterations: 1,
            batch_size: 32,
            improve_policy_modulo: 1,
            sample_less: false,
            delay_improvement: 0,
            epsilon: EpsilonConfig::default(),
            discount_factor: 0.99,
            n_step: 1,
            checkpoint_freq_sec: 600,
            checkpoint_dir_path: None,
            checkpoint_file_prefix: "advantage".to_string(),
            checkpoint_in_background: false,
            info_log_frequency: 100,
            average_smoothing: 0.9,
            improve_for_steps: 1000,
            normalize_reward: false,
            normalize_state: false,
            normalize_action: false,
            cadence_origin: CadenceOrigin::Absolute,
            max_episode_steps: None,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Sets the capacity of the replay buffer.
    pub fn buffer_size(mut self, v: usize) -> Self {
        self.buffer_size = v;
        self
    }

    /// Sets the interval of training in trajectories.
    pub fn train_target_modulo(mut self, v: usize) -> Self {
        self.train_target_modulo = v;
        self
    }

    /// Sets the number of training rounds per cadence tick.
    pub fn train_iterations(mut self, v: usize) -> Self {
        self.train_iterations = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the interval of target synchronization in training steps.
    pub fn improve_policy_modulo(mut self, v: usize) -> Self {
        self.improve_policy_modulo = v;
        self
    }

    /// Sets the sample-less policy of the replay buffer.
    pub fn sample_less(mut self, v: bool) -> Self {
        self.sample_less = v;
        self
    }

    /// Sets the delay in trajectories.
    pub fn delay_improvement(mut self, v: usize) -> Self {
        self.delay_improvement = v;
        self
    }

    /// Sets the exploration schedule.
    pub fn epsilon(mut self, v: EpsilonConfig) -> Self {
        self.epsilon = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount_factor(mut self, v: f32) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the number of steps of the bootstrapped return.
    pub fn n_step(mut self, v: usize) -> Self {
        self.n_step = v;
        self
    }

    /// Sets the checkpoint interval in seconds.
    pub fn checkpoint_freq_sec(mut self, v: u64) -> Self {
        self.checkpoint_freq_sec = v;
        self
    }

    /// Sets the checkpoint directory.
    pub fn checkpoint_dir_path(mut self, v: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir_path = Some(v.into());
        self
    }

    /// Sets the prefix of checkpoint files.
    pub fn checkpoint_file_prefix(mut self, v: impl Into<String>) -> Self {
        self.checkpoint_file_prefix = v.into();
        self
    }

    /// Enables writing checkpoints on a background thread.
    pub fn checkpoint_in_background(mut self, v: bool) -> Self {
        self.checkpoint_in_background = v;
        self
    }

    /// Sets the interval of logging in trajectories.
    pub fn info_log_frequency(mut self, v: usize) -> Self {
        self.info_log_frequency = v;
        self
    }

    /// Sets the smoothing factor of the logged return.
    pub fn average_smoothing(mut self, v: f32) -> Self {
        self.average_smoothing = v;
        self
    }

    /// Sets the number of trajectories to collect.
    pub fn improve_for_steps(mut self, v: usize) -> Self {
        self.improve_for_steps = v;
        self
    }

    /// Sets the normalization flags for rewards, observations and actions.
    pub fn normalize(mut self, reward: bool, state: bool, action: bool) -> Self {
        self.normalize_reward = reward;
        self.normalize_state = state;
        self.normalize_action = action;
        self
    }

    /// Sets the origin of the training cadence.
    pub fn cadence_origin(mut self, v: CadenceOrigin) -> Self {
        self.cadence_origin = v;
        self
    }

    /// Sets the maximum number of steps in an episode.
    pub fn max_episode_steps(mut self, v: usize) -> Self {
        self.max_episode_steps = Some(v);
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Configuration of the replay buffer derived from this configuration.
    pub fn replay_buffer_config(&self) -> ReplayBufferConfig {
        ReplayBufferConfig::default()
            .capacity(self.buffer_size)
            .sample_less(self.sample_less)
            .seed(self.seed)
    }

    /// Checks the configuration.
    ///
    /// Called before any trajectory runs; an error here is fatal.
    pub fn validate(&self) -> Result<(), AdvantageError> {
        let positive = [
            ("bufferSize", self.buffer_size),
            ("train_target_modulo", self.train_target_modulo),
            ("train_iterations", self.train_iterations),
            ("batch_size", self.batch_size),
            ("improve_policy_modulo", self.improve_policy_modulo),
            ("n_step", self.n_step),
            ("info_log_frequency", self.info_log_frequency),
        ];
        for (name, v) in positive {
            if v == 0 {
                return Err(AdvantageError::InvalidConfig(format!(
                    "{} must be positive",
                    name
                )));
            }
        }
        self.epsilon.validate()?;

        if !(0.0..=1.0).contains(&self.discount_factor) {
            return Err(AdvantageError::InvalidConfig(
                "discount_factor must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.average_smoothing) {
            return Err(AdvantageError::InvalidConfig(
                "average_smoothing must be in [0, 1)".to_string(),
            ));
        }
        if !self.sample_less && self.buffer_size < self.batch_size {
            return Err(AdvantageError::InvalidConfig(format!(
                "bufferSize ({}) is smaller than batch_size ({}) and sample_less is false",
                self.buffer_size, self.batch_size
            )));
        }
        if self.checkpoint_file_prefix.is_empty() {
            return Err(AdvantageError::InvalidConfig(
                "checkpoint_file_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
