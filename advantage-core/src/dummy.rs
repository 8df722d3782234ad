//! Deterministic environments and action-value functions used in tests.
use crate::{Env, QFunction, Step, TrainingSample};
use anyhow::{bail, Result};

/// A corridor of `length` cells.
///
/// The agent starts at cell 0. Action 0 moves left, action 1 moves right.
/// Reaching the last cell ends the episode with reward 1, every other step
/// gives reward 0. The observation is `vec![position]`.
#[derive(Clone, Debug)]
pub struct DummyEnv {
    length: usize,
    pos: usize,
    max_episode_steps: Option<usize>,
    n_resets: usize,
}

impl DummyEnv {
    /// Constructs a corridor, `length` must be at least 2.
    pub fn new(length: usize) -> Self {
        assert!(length >= 2);
        Self {
            length,
            pos: 0,
            max_episode_steps: None,
            n_resets: 0,
        }
    }

    /// Sets the environment-defined episode step limit.
    pub fn with_max_episode_steps(mut self, v: usize) -> Self {
        self.max_episode_steps = Some(v);
        self
    }

    /// Returns how many times the environment was reset.
    pub fn n_resets(&self) -> usize {
        self.n_resets
    }
}

impl Env for DummyEnv {
    type Obs = Vec<f32>;

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.pos = 0;
        self.n_resets += 1;
        Ok(vec![0.0])
    }

    fn step(&mut self, act: usize) -> Result<Step<Vec<f32>>> {
        match act {
            0 => self.pos = self.pos.saturating_sub(1),
            1 => self.pos += 1,
            _ => bail!("invalid action {}", act),
        }
        let is_done = self.pos == self.length - 1;
        let reward = if is_done { 1.0 } else { 0.0 };
        Ok(Step::new(vec![self.pos as f32], reward, is_done))
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn max_episode_steps(&self) -> Option<usize> {
        self.max_episode_steps
    }
}

/// An environment whose step fails after `n_ok` successful steps.
pub struct FailingEnv {
    n_ok: usize,
    n_steps: usize,
}

impl FailingEnv {
    /// Constructs the environment.
    pub fn new(n_ok: usize) -> Self {
        Self { n_ok, n_steps: 0 }
    }
}

impl Env for FailingEnv {
    type Obs = Vec<f32>;

    fn reset(&mut self) -> Result<Vec<f32>> {
        Ok(vec![0.0])
    }

    fn step(&mut self, _act: usize) -> Result<Step<Vec<f32>>> {
        if self.n_steps == self.n_ok {
            bail!("simulator crashed");
        }
        self.n_steps += 1;
        Ok(Step::new(vec![self.n_steps as f32], 0.0, false))
    }

    fn num_actions(&self) -> usize {
        2
    }
}

/// An action-value function ignoring the observation.
///
/// The parameters are one value per action. [`QFunction::train_step`] moves
/// the value of each sampled action towards its target and keeps a copy of
/// every batch.
#[derive(Clone, Debug)]
pub struct DummyQFunction {
    values: Vec<f32>,
    num_actions: Option<usize>,
    learning_rate: f32,
    loss: Option<f32>,
    batches: Vec<Vec<TrainingSample<Vec<f32>>>>,
}

impl DummyQFunction {
    /// All action values are zero.
    pub fn new(n_actions: usize) -> Self {
        Self {
            values: vec![0.0; n_actions],
            num_actions: None,
            learning_rate: 0.5,
            loss: None,
            batches: vec![],
        }
    }

    /// Value 1 for `act`, 0 for the other actions, and no learning.
    pub fn prefer(n_actions: usize, act: usize) -> Self {
        let mut q = Self::new(n_actions);
        q.values[act] = 1.0;
        q.learning_rate = 0.0;
        q
    }

    /// Makes [`QFunction::num_actions`] return `n` whatever the number of values.
    pub fn with_num_actions(mut self, n: usize) -> Self {
        self.num_actions = Some(n);
        self
    }

    /// Makes [`QFunction::train_step`] return `loss`.
    pub fn set_loss(&mut self, loss: f32) {
        self.loss = Some(loss);
    }

    /// Returns the number of calls of [`QFunction::train_step`].
    pub fn n_train_steps(&self) -> usize {
        self.batches.len()
    }

    /// Returns the batches given to [`QFunction::train_step`].
    pub fn batches(&self) -> &[Vec<TrainingSample<Vec<f32>>>] {
        &self.batches
    }
}

impl QFunction for DummyQFunction {
    type Obs = Vec<f32>;
    type Params = Vec<f32>;

    fn num_actions(&self) -> usize {
        self.num_actions.unwrap_or(self.values.len())
    }

    fn predict(&self, _obs: &Vec<f32>) -> Result<Vec<f32>> {
        Ok(self.values.clone())
    }

    fn train_step(&mut self, batch: &[TrainingSample<Vec<f32>>]) -> Result<f32> {
        let n = batch.len() as f32;
        let mut loss = 0.0;
        for s in batch {
            let err = s.target - self.values[s.act];
            self.values[s.act] += self.learning_rate * err / n;
            loss += 0.5 * err * err / n;
        }
        self.batches.push(batch.to_vec());
        Ok(self.loss.unwrap_or(loss))
    }

    fn parameters(&self) -> Vec<f32> {
        self.values.clone()
    }

    fn set_parameters(&mut self, params: &Vec<f32>) -> Result<()> {
        if params.len() != self.values.len() {
            bail!(
                "expected {} parameters, got {}",
                self.values.len(),
                params.len()
            );
        }
        self.values.copy_from_slice(params);
        Ok(())
    }
}
