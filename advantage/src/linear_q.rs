//! Linear action-value function.
use advantage_core::{QFunction, TrainingSample};
use anyhow::{bail, Result};
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration of [`LinearQ`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LinearQConfig {
    /// Learning rate of SGD.
    pub learning_rate: f32,

    /// Weights are initialized uniformly in `[-init_scale, init_scale]`.
    pub init_scale: f32,

    /// Random seed of the initialization.
    pub seed: u64,
}

impl Default for LinearQConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            init_scale: 0.01,
            seed: 0,
        }
    }
}

impl LinearQConfig {
    /// Sets the learning rate.
    pub fn learning_rate(mut self, v: f32) -> Self {
        self.learning_rate = v;
        self
    }

    /// Sets the scale of the initial weights.
    pub fn init_scale(mut self, v: f32) -> Self {
        self.init_scale = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }
}

/// Parameters of [`LinearQ`], the weights stored row-major.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LinearQParams {
    /// Number of actions, i.e., rows of the weight matrix.
    pub n_actions: usize,

    /// Dimension of observations.
    pub dim_obs: usize,

    /// Weights, `n_actions * dim_obs` values.
    pub weights: Vec<f32>,

    /// Bias, `n_actions` values.
    pub bias: Vec<f32>,
}

/// `Q(o, .) = W o + b`, trained by SGD on the mean squared TD error.
#[derive(Debug, Clone)]
pub struct LinearQ {
    weights: Array2<f32>,
    bias: Array1<f32>,
    learning_rate: f32,
}

impl LinearQ {
    /// Builds the model for observations of dimension `dim_obs`.
    pub fn build(config: &LinearQConfig, dim_obs: usize, n_actions: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let s = config.init_scale;
        let weights = Array2::from_shape_fn((n_actions, dim_obs), |_| match s > 0.0 {
            true => rng.gen_range(-s..=s),
            false => 0.0,
        });
        Self {
            weights,
            bias: Array1::zeros(n_actions),
            learning_rate: config.learning_rate,
        }
    }

    fn check_obs(&self, obs: &Array1<f32>) -> Result<()> {
        if obs.len() != self.weights.ncols() {
            bail!(
                "observation has dimension {}, expected {}",
                obs.len(),
                self.weights.ncols()
            );
        }
        Ok(())
    }
}

impl QFunction for LinearQ {
    type Obs = Array1<f32>;
    type Params = LinearQParams;

    fn num_actions(&self) -> usize {
        self.weights.nrows()
    }

    fn predict(&self, obs: &Array1<f32>) -> Result<Vec<f32>> {
        self.check_obs(obs)?;
        Ok((self.weights.dot(obs) + &self.bias).to_vec())
    }

    fn train_step(&mut self, batch: &[TrainingSample<Array1<f32>>]) -> Result<f32> {
        if batch.is_empty() {
            bail!("empty batch");
        }
        let n = batch.len() as f32;
        let mut grad_w = Array2::<f32>::zeros(self.weights.raw_dim());
        let mut grad_b = Array1::<f32>::zeros(self.bias.raw_dim());
        let mut loss = 0.0;

        for s in batch {
            self.check_obs(&s.obs)?;
            if s.act >= self.num_actions() {
                bail!("action {} out of range", s.act);
            }
            let q = self.weights.row(s.act).dot(&s.obs) + self.bias[s.act];
            let err = q - s.target;
            loss += 0.5 * err * err;
            grad_w.row_mut(s.act).scaled_add(err, &s.obs);
            grad_b[s.act] += err;
        }

        let step = self.learning_rate / n;
        self.weights.scaled_add(-step, &grad_w);
        self.bias.scaled_add(-step, &grad_b);
        Ok(loss / n)
    }

    fn parameters(&self) -> LinearQParams {
        LinearQParams {
            n_actions: self.weights.nrows(),
            dim_obs: self.weights.ncols(),
            weights: self.weights.iter().copied().collect(),
            bias: self.bias.to_vec(),
        }
    }

    fn set_parameters(&mut self, params: &LinearQParams) -> Result<()> {
        if (params.n_actions, params.dim_obs) != self.weights.dim() {
            bail!(
                "parameter shape ({}, {}) differs from model shape {:?}",
                params.n_actions,
                params.dim_obs,
                self.weights.dim()
            );
        }
        if params.bias.len() != params.n_actions {
            bail!("bias has {} values, expected {}", params.bias.len(), params.n_actions);
        }
        self.weights = Array2::from_shape_vec(self.weights.dim(), params.weights.clone())?;
        self.bias = Array1::from_vec(params.bias.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(i: usize, n: usize) -> Array1<f32> {
        let mut x = Array1::zeros(n);
        x[i] = 1.0;
        x
    }

    #[test]
    fn test_predict() -> Result<()> {
        let mut q = LinearQ::build(&LinearQConfig::default(), 3, 2);
        q.set_parameters(&LinearQParams {
            n_actions: 2,
            dim_obs: 3,
            weights: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            bias: vec![0.5, -0.5],
        })?;
        assert_eq!(q.predict(&one_hot(1, 3))?, vec![2.5, 4.5]);
        assert!(q.predict(&one_hot(1, 4)).is_err());
        Ok(())
    }

    #[test]
    fn test_train_step_reduces_error() -> Result<()> {
        let mut q = LinearQ::build(&LinearQConfig::default().init_scale(0.0), 4, 2);
        let sample = TrainingSample {
            obs: one_hot(2, 4),
            act: 1,
            target: 1.0,
        };
        let mut prev = f32::INFINITY;
        for _ in 0..20 {
            let loss = q.train_step(&[sample.clone()])?;
            assert!(loss < prev);
            prev = loss;
        }
        let v = q.predict(&sample.obs)?;
        assert!((v[1] - 1.0).abs() < 0.05);
        // Action 0 is untouched.
        assert_eq!(v[0], 0.0);
        Ok(())
    }

    #[test]
    fn test_parameters() -> Result<()> {
        let a = LinearQ::build(&LinearQConfig::default().seed(1), 5, 3);
        let mut b = LinearQ::build(&LinearQConfig::default().seed(2), 5, 3);
        assert_ne!(a.parameters(), b.parameters());
        b.set_parameters(&a.parameters())?;
        assert_eq!(a.parameters(), b.parameters());

        let mut c = LinearQ::build(&LinearQConfig::default(), 4, 3);
        assert!(c.set_parameters(&a.parameters()).is_err());
        Ok(())
    }
}
