//! Training loop.
mod collector;
mod config;
mod scheduler;
mod stop;
mod sync;
use crate::{
    checkpoint::{Checkpoint, CheckpointScheduler, TrainingCounters},
    error::AdvantageError,
    explorer::EpsilonScheduler,
    record::{
        Record,
        RecordValue::{Array1, Scalar},
        Recorder,
    },
    replay_buffer::ExperienceReplayBuffer,
    Env, IdentityNormalizer, Normalizer, QFunction, ReplayBufferBase,
};
use anyhow::Result;
pub use collector::{TrajectoryCollector, TrajectoryStats};
pub use config::{CadenceOrigin, TrainerConfig};
use log::info;
pub use scheduler::{td_targets, SchedulerState, TickReport, TrainingScheduler};
use std::time::Instant;
pub use stop::StopHandle;
pub use sync::TargetSynchronizer;

/// Summary of a call of [`TrainingOrchestrator::train`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Trajectories completed, including those before a resume.
    pub trajectories_completed: usize,

    /// Optimizer updates of the policy network, including those before a resume.
    pub training_steps_completed: usize,

    /// Target synchronizations in this call.
    pub target_syncs: usize,

    /// Checkpoints written successfully in this call.
    pub checkpoints_saved: usize,

    /// Exponentially smoothed episode return, `None` if no trajectory ran.
    pub smoothed_return: Option<f32>,

    /// `true` if training ended through a [`StopHandle`].
    pub stopped_early: bool,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Trains a policy network with DQN.
///
/// # Training loop
///
/// [`TrainingOrchestrator::train`] repeats the following until
/// `improve_for_steps` trajectories are completed or a stop is requested:
///
/// 1. Run one episode with [`TrajectoryCollector`], using the current value of
///    the [`EpsilonScheduler`].
/// 2. Call [`TrainingScheduler::on_trajectory_completed`], which counts the
///    trajectory, trains the policy network on cadence and synchronizes the
///    target network.
/// 3. Advance the epsilon schedule.
/// 4. Let [`CheckpointScheduler`] save a checkpoint if one is due.
/// 5. Update the smoothed return
///    `smoothed = average_smoothing * smoothed + (1 - average_smoothing) * episode_return`,
///    log it every `info_log_frequency` trajectories and write a [`Record`].
///
/// A stop requested with the [`StopHandle`] is honored between trajectories.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Policy]-->|action|B[Env]
///     B -->|Step|C[TrajectoryCollector]
///     C -->|Transition|D[ExperienceReplayBuffer]
///     D -->|batch|E[TrainingScheduler]
///     F[Target] -->|TD target|E
///     E -->|train_step|A
///     E -->|sync|F
/// ```
pub struct TrainingOrchestrator<E, Q, N = IdentityNormalizer>
where
    E: Env,
    Q: QFunction<Obs = E::Obs>,
{
    env: E,
    policy: Q,
    target: Q,
    buffer: ExperienceReplayBuffer<E::Obs>,
    collector: TrajectoryCollector<N>,
    scheduler: TrainingScheduler,
    epsilon: EpsilonScheduler,
    checkpoint: Option<CheckpointScheduler<Q::Params>>,
    stop: StopHandle,
    improve_for_steps: usize,
    info_log_frequency: usize,
    average_smoothing: f32,
    smoothed_return: Option<f32>,
}

impl<E, Q> TrainingOrchestrator<E, Q, IdentityNormalizer>
where
    E: Env,
    Q: QFunction<Obs = E::Obs>,
{
    /// Constructs an orchestrator storing transitions unchanged.
    ///
    /// See [`TrainingOrchestrator::build_with_normalizer`].
    pub fn build(config: TrainerConfig, env: E, policy: Q, target: Q) -> Result<Self> {
        Self::build_with_normalizer(config, env, policy, target, IdentityNormalizer)
    }
}

impl<E, Q, N> TrainingOrchestrator<E, Q, N>
where
    E: Env,
    Q: QFunction<Obs = E::Obs>,
    N: Normalizer<E::Obs>,
{
    /// Constructs an orchestrator.
    ///
    /// The configuration is validated and the target network is initialized
    /// with the parameters of the policy network. `normalizer` rescales the
    /// parts of transitions enabled by the `normalize*` options.
    pub fn build_with_normalizer(
        config: TrainerConfig,
        env: E,
        policy: Q,
        mut target: Q,
        normalizer: N,
    ) -> Result<Self> {
        config.validate()?;
        if env.num_actions() != policy.num_actions() || policy.num_actions() != target.num_actions()
        {
            return Err(AdvantageError::InvalidConfig(format!(
                "number of actions differ: env = {}, policy = {}, target = {}",
                env.num_actions(),
                policy.num_actions(),
                target.num_actions()
            ))
            .into());
        }
        target.set_parameters(&policy.parameters())?;

        let collector = TrajectoryCollector::with_normalizer(config.seed, normalizer)
            .normalize(
                config.normalize_reward,
                config.normalize_state,
                config.normalize_action,
            )
            .max_episode_steps(config.max_episode_steps)
            .n_step(config.n_step, config.discount_factor);

        Ok(Self {
            env,
            policy,
            target,
            buffer: ExperienceReplayBuffer::build(&config.replay_buffer_config()),
            collector,
            scheduler: TrainingScheduler::build(&config),
            epsilon: EpsilonScheduler::new(config.epsilon.clone()),
            checkpoint: CheckpointScheduler::build(&config),
            stop: StopHandle::new(),
            improve_for_steps: config.improve_for_steps,
            info_log_frequency: config.info_log_frequency,
            average_smoothing: config.average_smoothing,
            smoothed_return: None,
        })
    }

    /// Returns a handle for stopping [`TrainingOrchestrator::train`] from
    /// another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Returns the policy network.
    pub fn policy(&self) -> &Q {
        &self.policy
    }

    /// Returns the target network.
    pub fn target(&self) -> &Q {
        &self.target
    }

    /// Returns the environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Returns the replay buffer.
    pub fn buffer(&self) -> &ExperienceReplayBuffer<E::Obs> {
        &self.buffer
    }

    /// Returns the training scheduler.
    pub fn scheduler(&self) -> &TrainingScheduler {
        &self.scheduler
    }

    /// Returns the epsilon scheduler.
    pub fn epsilon(&self) -> &EpsilonScheduler {
        &self.epsilon
    }

    /// Returns the current counters.
    pub fn counters(&self) -> TrainingCounters {
        TrainingCounters {
            trajectories_completed: self.scheduler.trajectories_completed(),
            training_steps_completed: self.scheduler.training_steps_completed(),
            epsilon_step: self.epsilon.step(),
        }
    }

    /// Takes a snapshot of both networks and the counters.
    pub fn checkpoint(&self) -> Checkpoint<Q::Params> {
        Checkpoint {
            policy_params: self.policy.parameters(),
            target_params: self.target.parameters(),
            counters: self.counters(),
        }
    }

    /// Restores both networks and the counters from a checkpoint.
    ///
    /// The replay buffer is not part of a checkpoint and starts empty.
    pub fn resume(&mut self, checkpoint: Checkpoint<Q::Params>) -> Result<()> {
        self.policy.set_parameters(&checkpoint.policy_params)?;
        self.target.set_parameters(&checkpoint.target_params)?;
        let c = checkpoint.counters;
        self.scheduler
            .restore(c.trajectories_completed, c.training_steps_completed);
        self.epsilon.set_step(c.epsilon_step);
        info!(
            "Resumed at trajectory {}, training step {}",
            c.trajectories_completed, c.training_steps_completed
        );
        Ok(())
    }

    /// Runs trajectories until `improve_for_steps` trajectories are completed
    /// or a stop is requested.
    ///
    /// Errors of the environment or the policy network, and non-finite losses,
    /// end training and are returned.
    pub fn train(&mut self, recorder: &mut dyn Recorder) -> Result<TrainingReport> {
        let syncs_before = self.scheduler.target_syncs();
        let mut stopped_early = false;

        while self.scheduler.trajectories_completed() < self.improve_for_steps {
            if self.stop.is_stopped() {
                info!(
                    "Stopped at trajectory {}",
                    self.scheduler.trajectories_completed()
                );
                stopped_early = true;
                break;
            }
            let record = self.run_trajectory()?;
            recorder.write(record);
        }
        recorder.flush();

        let checkpoints_saved = match self.checkpoint.as_mut() {
            Some(checkpoint) => {
                checkpoint.finish();
                checkpoint.checkpoints_saved()
            }
            None => 0,
        };

        Ok(TrainingReport {
            trajectories_completed: self.scheduler.trajectories_completed(),
            training_steps_completed: self.scheduler.training_steps_completed(),
            target_syncs: self.scheduler.target_syncs() - syncs_before,
            checkpoints_saved,
            smoothed_return: self.smoothed_return,
            stopped_early,
        })
    }

    fn run_trajectory(&mut self) -> Result<Record> {
        let eps = self.epsilon.value();
        let stats = self
            .collector
            .collect(&mut self.env, &self.policy, &mut self.buffer, eps)?;
        let tick = self.scheduler.on_trajectory_completed(
            &mut self.policy,
            &mut self.target,
            &mut self.buffer,
        )?;
        self.epsilon.advance();

        let counters = self.counters();
        if let Some(checkpoint) = self.checkpoint.as_mut() {
            let (policy, target) = (&self.policy, &self.target);
            checkpoint.poll(Instant::now(), || Checkpoint {
                policy_params: policy.parameters(),
                target_params: target.parameters(),
                counters,
            });
        }

        let smoothed = smooth(self.smoothed_return, stats.episode_return, self.average_smoothing);
        self.smoothed_return = Some(smoothed);

        let n = counters.trajectories_completed;
        if n % self.info_log_frequency == 0 {
            info!(
                "Trajectory {}: smoothed return = {:.3}, epsilon = {:.3}, training steps = {}",
                n, smoothed, eps, counters.training_steps_completed
            );
        }

        let mut record = Record::from_slice(&[
            ("trajectories", Scalar(n as f32)),
            (
                "training_steps",
                Scalar(counters.training_steps_completed as f32),
            ),
            ("episode_return", Scalar(stats.episode_return)),
            ("smoothed_return", Scalar(smoothed)),
            ("episode_length", Scalar(stats.steps as f32)),
            ("epsilon", Scalar(eps as f32)),
            ("q_values", Array1(stats.initial_q_values.clone())),
        ]);
        if let Some(loss) = tick.mean_loss {
            record.insert("loss", Scalar(loss));
        }
        Ok(record)
    }
}

/// Exponential smoothing seeded with the first value.
fn smooth(prev: Option<f32>, x: f32, alpha: f32) -> f32 {
    match prev {
        None => x,
        Some(s) => alpha * s + (1.0 - alpha) * x,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{DummyEnv, DummyQFunction, FailingEnv},
        explorer::EpsilonConfig,
        record::BufferedRecorder,
        ExperienceBufferBase,
    };

    fn config() -> TrainerConfig {
        TrainerConfig::default()
            .buffer_size(256)
            .batch_size(4)
            .sample_less(true)
            .improve_for_steps(10)
            .max_episode_steps(20)
            .info_log_frequency(5)
    }

    fn greedy() -> EpsilonConfig {
        EpsilonConfig::default().initial_value(0.0).min_value(0.0)
    }

    #[test]
    fn test_smooth() {
        assert_eq!(smooth(None, 4.0, 0.9), 4.0);
        assert!((smooth(Some(4.0), 14.0, 0.9) - 5.0).abs() < 1e-6);
        assert_eq!(smooth(Some(4.0), 14.0, 0.0), 14.0);
    }

    #[test]
    fn test_target_initialized_from_policy() -> Result<()> {
        let orchestrator = TrainingOrchestrator::build(
            config(),
            DummyEnv::new(4),
            DummyQFunction::prefer(2, 1),
            DummyQFunction::new(2),
        )?;
        assert_eq!(
            orchestrator.policy().parameters(),
            orchestrator.target().parameters()
        );
        Ok(())
    }

    #[test]
    fn test_build_errors() {
        let err = TrainingOrchestrator::build(
            config().train_target_modulo(0),
            DummyEnv::new(4),
            DummyQFunction::new(2),
            DummyQFunction::new(2),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<AdvantageError>(),
            Some(AdvantageError::InvalidConfig(_))
        ));

        let err = TrainingOrchestrator::build(
            config(),
            DummyEnv::new(4),
            DummyQFunction::new(3),
            DummyQFunction::new(3),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<AdvantageError>(),
            Some(AdvantageError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_train() -> Result<()> {
        let mut orchestrator = TrainingOrchestrator::build(
            config(),
            DummyEnv::new(4),
            DummyQFunction::new(2),
            DummyQFunction::new(2),
        )?;
        let mut recorder = BufferedRecorder::new();
        let report = orchestrator.train(&mut recorder)?;

        assert_eq!(report.trajectories_completed, 10);
        assert_eq!(report.training_steps_completed, 10);
        assert_eq!(report.target_syncs, 10);
        assert_eq!(report.checkpoints_saved, 0);
        assert!(!report.stopped_early);
        assert!(report.smoothed_return.is_some());
        assert_eq!(orchestrator.epsilon().step(), 10);
        assert_eq!(orchestrator.policy().n_train_steps(), 10);

        let total_steps: f32 = recorder.scalars("episode_length").iter().sum();
        assert_eq!(orchestrator.buffer().len(), total_steps as usize);
        assert_eq!(
            recorder.scalars("trajectories"),
            (1..=10).map(|n| n as f32).collect::<Vec<_>>()
        );
        assert_eq!(recorder.scalars("loss").len(), 10);

        // Training is complete, a second call does nothing.
        let report = orchestrator.train(&mut recorder)?;
        assert_eq!(report.trajectories_completed, 10);
        assert_eq!(recorder.len(), 10);
        Ok(())
    }

    #[test]
    fn test_n_step_transitions() -> Result<()> {
        let mut orchestrator = TrainingOrchestrator::build(
            config()
                .epsilon(greedy())
                .n_step(3)
                .discount_factor(0.5)
                .improve_for_steps(1),
            DummyEnv::new(3),
            DummyQFunction::prefer(2, 1),
            DummyQFunction::new(2),
        )?;
        orchestrator.train(&mut BufferedRecorder::new())?;

        let stored = orchestrator
            .buffer()
            .iter()
            .map(|t| (t.reward(), t.bootstrap_steps()))
            .collect::<Vec<_>>();
        assert_eq!(stored, vec![(0.5, 2), (1.0, 1)]);
        Ok(())
    }

    #[test]
    fn test_smoothed_return() -> Result<()> {
        let mut orchestrator = TrainingOrchestrator::build(
            config().epsilon(greedy()).average_smoothing(0.5),
            DummyEnv::new(3),
            DummyQFunction::prefer(2, 1),
            DummyQFunction::new(2),
        )?;
        let mut recorder = BufferedRecorder::new();
        let report = orchestrator.train(&mut recorder)?;

        // Greedy walk to the goal: every return is 1 in 2 steps.
        assert_eq!(recorder.scalars("episode_return"), vec![1.0; 10]);
        assert_eq!(recorder.scalars("episode_length"), vec![2.0; 10]);
        assert_eq!(recorder.scalars("smoothed_return"), vec![1.0; 10]);
        assert_eq!(report.smoothed_return, Some(1.0));
        assert_eq!(recorder.scalars("epsilon"), vec![0.0; 10]);
        assert!(recorder
            .iter()
            .all(|r| r.get("q_values") == Some(&Array1(vec![0.0, 1.0]))));
        Ok(())
    }

    #[test]
    fn test_env_failure_is_fatal() -> Result<()> {
        let mut orchestrator = TrainingOrchestrator::build(
            config(),
            FailingEnv::new(3),
            DummyQFunction::new(2),
            DummyQFunction::new(2),
        )?;
        let err = orchestrator.train(&mut BufferedRecorder::new()).unwrap_err();
        assert!(format!("{:#}", err).contains("simulator crashed"));
        assert_eq!(orchestrator.scheduler().trajectories_completed(), 0);
        Ok(())
    }

    #[test]
    fn test_non_finite_loss_is_fatal() -> Result<()> {
        let mut policy = DummyQFunction::new(2);
        policy.set_loss(f32::NAN);
        let mut orchestrator =
            TrainingOrchestrator::build(config(), DummyEnv::new(4), policy, DummyQFunction::new(2))?;
        let err = orchestrator.train(&mut BufferedRecorder::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AdvantageError>(),
            Some(AdvantageError::NonFiniteLoss { .. })
        ));
        assert_eq!(orchestrator.scheduler().training_steps_completed(), 0);
        Ok(())
    }

    struct StopAfter {
        n: usize,
        handle: StopHandle,
        written: usize,
    }

    impl Recorder for StopAfter {
        fn write(&mut self, _record: Record) {
            self.written += 1;
            if self.written == self.n {
                self.handle.stop();
            }
        }
    }

    #[test]
    fn test_stop_between_trajectories() -> Result<()> {
        let mut orchestrator = TrainingOrchestrator::build(
            config(),
            DummyEnv::new(4),
            DummyQFunction::new(2),
            DummyQFunction::new(2),
        )?;
        let mut recorder = StopAfter {
            n: 3,
            handle: orchestrator.stop_handle(),
            written: 0,
        };
        let report = orchestrator.train(&mut recorder)?;
        assert!(report.stopped_early);
        assert_eq!(report.trajectories_completed, 3);
        assert_eq!(recorder.written, 3);
        Ok(())
    }

    #[test]
    fn test_resume() -> Result<()> {
        let mut orchestrator = TrainingOrchestrator::build(
            config().improve_for_steps(6),
            DummyEnv::new(4),
            DummyQFunction::new(2),
            DummyQFunction::new(2),
        )?;
        orchestrator.train(&mut BufferedRecorder::new())?;
        let ckpt = orchestrator.checkpoint();
        assert_eq!(
            ckpt.counters,
            TrainingCounters {
                trajectories_completed: 6,
                training_steps_completed: 6,
                epsilon_step: 6,
            }
        );

        let mut resumed = TrainingOrchestrator::build(
            config(),
            DummyEnv::new(4),
            DummyQFunction::new(2),
            DummyQFunction::new(2),
        )?;
        resumed.resume(ckpt.clone())?;
        assert_eq!(resumed.policy().parameters(), ckpt.policy_params);
        assert_eq!(resumed.target().parameters(), ckpt.target_params);
        assert_eq!(resumed.counters(), ckpt.counters);

        let mut recorder = BufferedRecorder::new();
        let report = resumed.train(&mut recorder)?;
        assert_eq!(report.trajectories_completed, 10);
        assert_eq!(
            recorder.scalars("trajectories"),
            vec![7.0, 8.0, 9.0, 10.0]
        );
        Ok(())
    }
}
