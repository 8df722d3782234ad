use advantage::{build, eval, train, LinearQParams, RunConfig};
use advantage_core::{checkpoint::Checkpoint, QFunction};
use anyhow::Result;
use tempdir::TempDir;

fn config(dir: &TempDir) -> RunConfig {
    let mut config = RunConfig::default();
    config.env.length = 5;
    config.trainer = config
        .trainer
        .improve_for_steps(30)
        .delay_improvement(5)
        .checkpoint_freq_sec(3600)
        .checkpoint_dir_path(dir.path().join("model"));
    config
}

#[test]
fn test_train_eval_resume() -> Result<()> {
    let dir = TempDir::new("train_corridor")?;
    let logdir = dir.path().join("runs");
    let mut config = config(&dir);

    let report = train(&config, false, Some(&logdir))?;
    assert_eq!(report.trajectories_completed, 30);
    assert!(!report.stopped_early);
    assert!(report.training_steps_completed > 0);
    assert!(logdir.exists());

    let model_dir = dir.path().join("model");
    let ckpt = Checkpoint::<LinearQParams>::load(&model_dir, "advantage")?;
    assert_eq!(ckpt.counters.trajectories_completed, 30);
    assert_eq!(ckpt.counters.epsilon_step, 30);
    assert_eq!(ckpt.counters.training_steps_completed, report.training_steps_completed);

    let mean_return = eval(&config, 3)?;
    assert!(mean_return.is_finite());

    // Resume restores the models and the counters.
    config.trainer.improve_for_steps = 40;
    let orchestrator = build(&config, true)?;
    assert_eq!(orchestrator.counters(), ckpt.counters);
    assert_eq!(orchestrator.policy().parameters(), ckpt.policy_params);

    let report = train(&config, true, None)?;
    assert_eq!(report.trajectories_completed, 40);
    Ok(())
}

#[test]
fn test_resume_without_checkpoint() -> Result<()> {
    let dir = TempDir::new("train_corridor")?;
    let orchestrator = build(&config(&dir), true)?;
    assert_eq!(orchestrator.counters().trajectories_completed, 0);
    Ok(())
}

#[test]
fn test_eval_without_checkpoint() -> Result<()> {
    let dir = TempDir::new("train_corridor")?;
    assert!(eval(&config(&dir), 1).is_err());

    let mut config = config(&dir);
    config.trainer.checkpoint_dir_path = None;
    assert!(eval(&config, 1).is_err());
    Ok(())
}
