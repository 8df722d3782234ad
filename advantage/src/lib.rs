//! Trains a linear action-value function on a corridor with `advantage-core`.
mod config;
mod corridor;
mod eval;
mod linear_q;
use advantage_core::{
    checkpoint::Checkpoint,
    record::{NullRecorder, Recorder},
    Env, QFunction, TrainingOrchestrator, TrainingReport,
};
use advantage_tensorboard::TensorboardRecorder;
use anyhow::{Context, Result};
pub use config::RunConfig;
pub use corridor::{Corridor, CorridorConfig};
pub use eval::evaluate;
pub use linear_q::{LinearQ, LinearQConfig, LinearQParams};
use log::{info, warn};
use std::path::Path;

/// Orchestrator of a run.
pub type CorridorOrchestrator = TrainingOrchestrator<Corridor, LinearQ>;

fn build_model(config: &RunConfig) -> LinearQ {
    LinearQ::build(&config.model, config.env.length, 2)
}

/// Builds the orchestrator of a run.
///
/// With `resume`, training continues from the checkpoint in
/// `checkpoint_dir_path` if one exists.
pub fn build(config: &RunConfig, resume: bool) -> Result<CorridorOrchestrator> {
    let env = Corridor::build(&config.env)?;
    let policy = build_model(config);
    let target = build_model(config);
    let mut orchestrator = TrainingOrchestrator::build(config.trainer.clone(), env, policy, target)?;

    if resume {
        let dir = config
            .trainer
            .checkpoint_dir_path
            .as_ref()
            .context("resuming requires checkpoint_dir_path")?;
        let prefix = &config.trainer.checkpoint_file_prefix;
        match Checkpoint::<LinearQParams>::exists(dir, prefix) {
            true => orchestrator.resume(Checkpoint::load(dir, prefix)?)?,
            false => warn!("No checkpoint in {:?}, training from scratch", dir),
        }
    }
    Ok(orchestrator)
}

/// Trains and saves the final checkpoint if `checkpoint_dir_path` is set.
///
/// Records are written to TensorBoard in `logdir` if given.
pub fn train(config: &RunConfig, resume: bool, logdir: Option<&Path>) -> Result<TrainingReport> {
    let mut orchestrator = build(config, resume)?;
    let mut recorder: Box<dyn Recorder> = match logdir {
        Some(logdir) => Box::new(TensorboardRecorder::new(logdir)),
        None => Box::new(NullRecorder {}),
    };

    let report = orchestrator.train(recorder.as_mut())?;
    info!(
        "Finished: {} trajectories, {} training steps, {} target syncs, smoothed return = {:?}",
        report.trajectories_completed,
        report.training_steps_completed,
        report.target_syncs,
        report.smoothed_return
    );

    if let Some(dir) = &config.trainer.checkpoint_dir_path {
        orchestrator
            .checkpoint()
            .save(dir, &config.trainer.checkpoint_file_prefix)?;
        info!("Saved the final checkpoint in {:?}", dir);
    }
    Ok(report)
}

/// Loads the policy network from the checkpoint and returns the mean return
/// of `n_episodes` greedy episodes.
pub fn eval(config: &RunConfig, n_episodes: usize) -> Result<f32> {
    let dir = config
        .trainer
        .checkpoint_dir_path
        .as_ref()
        .context("evaluation requires checkpoint_dir_path")?;
    let ckpt = Checkpoint::<LinearQParams>::load(dir, &config.trainer.checkpoint_file_prefix)?;
    let mut q = build_model(config);
    q.set_parameters(&ckpt.policy_params)?;

    let mut env = Corridor::build(&config.env)?;
    let max_steps = config.trainer.max_episode_steps.or_else(|| env.max_episode_steps());
    let mean_return = evaluate(&mut env, &q, n_episodes, max_steps)?;
    info!(
        "Mean return of {} episodes after {} trajectories: {}",
        n_episodes, ckpt.counters.trajectories_completed, mean_return
    );
    Ok(mean_return)
}
