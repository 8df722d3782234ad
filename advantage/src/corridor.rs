//! A one-dimensional corridor.
use advantage_core::{Env, Step};
use anyhow::{bail, Result};
use ndarray::Array1;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration of [`Corridor`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CorridorConfig {
    /// Number of cells, at least 2.
    pub length: usize,

    /// Reward of reaching the last cell.
    pub goal_reward: f32,

    /// Reward of every other step.
    pub step_reward: f32,

    /// Probability that the opposite move is applied.
    pub slip: f64,

    /// Episode step limit.
    pub max_episode_steps: Option<usize>,

    /// Random seed of slips.
    pub seed: u64,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            length: 8,
            goal_reward: 1.0,
            step_reward: -0.01,
            slip: 0.0,
            max_episode_steps: Some(100),
            seed: 0,
        }
    }
}

impl CorridorConfig {
    /// Sets the number of cells.
    pub fn length(mut self, v: usize) -> Self {
        self.length = v;
        self
    }

    /// Sets the slip probability.
    pub fn slip(mut self, v: f64) -> Self {
        self.slip = v;
        self
    }

    /// Sets the episode step limit.
    pub fn max_episode_steps(mut self, v: Option<usize>) -> Self {
        self.max_episode_steps = v;
        self
    }
}

/// The agent starts at cell 0 and the episode ends at the last cell.
///
/// Action 0 moves left, action 1 moves right. Moving left at cell 0 keeps
/// the agent in place. Observations are one-hot vectors of the position.
pub struct Corridor {
    config: CorridorConfig,
    pos: usize,
    rng: SmallRng,
}

impl Corridor {
    /// Builds the environment.
    pub fn build(config: &CorridorConfig) -> Result<Self> {
        if config.length < 2 {
            bail!("corridor length must be at least 2, got {}", config.length);
        }
        if !(0.0..=1.0).contains(&config.slip) {
            bail!("slip must be in [0, 1], got {}", config.slip);
        }
        Ok(Self {
            config: config.clone(),
            pos: 0,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }

    /// Returns the position of the agent.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn obs(&self) -> Array1<f32> {
        let mut obs = Array1::zeros(self.config.length);
        obs[self.pos] = 1.0;
        obs
    }
}

impl Env for Corridor {
    type Obs = Array1<f32>;

    fn reset(&mut self) -> Result<Array1<f32>> {
        self.pos = 0;
        Ok(self.obs())
    }

    fn step(&mut self, act: usize) -> Result<Step<Array1<f32>>> {
        let right = match act {
            0 => false,
            1 => true,
            _ => bail!("invalid action {}", act),
        };
        let right = match self.config.slip > 0.0 && self.rng.gen_bool(self.config.slip) {
            true => !right,
            false => right,
        };
        self.pos = match right {
            true => self.pos + 1,
            false => self.pos.saturating_sub(1),
        };

        let is_done = self.pos == self.config.length - 1;
        let reward = match is_done {
            true => self.config.goal_reward,
            false => self.config.step_reward,
        };
        Ok(Step::new(self.obs(), reward, is_done))
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn max_episode_steps(&self) -> Option<usize> {
        self.config.max_episode_steps
    }
}
