//! Configuration of a training run.
use crate::{CorridorConfig, LinearQConfig};
use advantage_core::{explorer::EpsilonConfig, TrainerConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Environment, model and trainer configurations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Environment.
    pub env: CorridorConfig,

    /// Action-value function.
    pub model: LinearQConfig,

    /// Trainer.
    pub trainer: TrainerConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            env: CorridorConfig::default(),
            model: LinearQConfig::default(),
            trainer: TrainerConfig::default()
                .buffer_size(2048)
                .batch_size(32)
                .train_target_modulo(1)
                .train_iterations(4)
                .improve_policy_modulo(50)
                .delay_improvement(10)
                .discount_factor(0.95)
                .epsilon(EpsilonConfig::default().decay_steps(20).decay_rate(0.8))
                .improve_for_steps(500)
                .info_log_frequency(50)
                .checkpoint_freq_sec(60)
                .checkpoint_dir_path("model/corridor"),
        }
    }
}

impl RunConfig {
    /// Constructs [`RunConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RunConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_run_config() -> Result<()> {
        let config = RunConfig::default();
        assert!(config.trainer.validate().is_ok());

        let dir = TempDir::new("run_config")?;
        let path = dir.path().join("run.yaml");
        config.save(&path)?;
        assert_eq!(RunConfig::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_yaml() -> Result<()> {
        let yaml = "\
env:
  length: 5
trainer:
  bufferSize: 64
  batch_size: 8
  improve_for_steps: 20
";
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        assert_eq!(config.env.length, 5);
        assert_eq!(config.env.goal_reward, 1.0);
        assert_eq!(config.trainer.buffer_size, 64);
        assert_eq!(config.trainer.checkpoint_dir_path, None);
        assert_eq!(config.model, LinearQConfig::default());
        Ok(())
    }
}
