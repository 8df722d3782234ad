//! Training and target-synchronization cadence.
use super::{config::CadenceOrigin, sync::TargetSynchronizer, TrainerConfig};
use crate::{error::AdvantageError, QFunction, ReplayBufferBase, TrainingSample, Transition};
use anyhow::Result;
use log::{debug, info, warn};

/// State of [`TrainingScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Fewer than `delay_improvement` trajectories were completed.
    WaitingForDelay,

    /// Training runs on the configured cadence.
    Active,
}

/// What happened in a call of [`TrainingScheduler::on_trajectory_completed`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Training rounds performed, each one an optimizer update.
    pub trained_rounds: usize,

    /// `true` if a round was skipped because the buffer could not supply a batch.
    pub skipped: bool,

    /// `true` if the target network was synchronized.
    pub synced: bool,

    /// Mean loss of the performed rounds.
    pub mean_loss: Option<f32>,
}

/// Decides, after each completed trajectory, whether to train the policy
/// network and whether to synchronize the target network.
///
/// The scheduler owns the two monotonic counters, `trajectories_completed`
/// and `training_steps_completed`. Both cadences use absolute counter values:
///
/// 1. If the scheduler is [`SchedulerState::Active`] and the trajectory count
///    is a multiple of `train_target_modulo` (see [`CadenceOrigin`]), run
///    `train_iterations` rounds. A round samples `batch_size` transitions,
///    computes TD targets with the target network and calls
///    [`QFunction::train_step`] on the policy network.
/// 2. If the rounds moved `training_steps_completed` onto or past a multiple
///    of `improve_policy_modulo`, synchronize the target network.
///
/// If the buffer cannot supply a batch, the remaining rounds of the tick are
/// skipped and not retried before the next tick.
pub struct TrainingScheduler {
    train_target_modulo: usize,
    train_iterations: usize,
    batch_size: usize,
    improve_policy_modulo: usize,
    delay_improvement: usize,
    discount_factor: f32,
    cadence_origin: CadenceOrigin,
    trajectories_completed: usize,
    training_steps_completed: usize,
    state: SchedulerState,
    synchronizer: TargetSynchronizer,
}

impl TrainingScheduler {
    /// Builds a scheduler with both counters at zero.
    pub fn build(config: &TrainerConfig) -> Self {
        let mut scheduler = Self {
            train_target_modulo: config.train_target_modulo,
            train_iterations: config.train_iterations,
            batch_size: config.batch_size,
            improve_policy_modulo: config.improve_policy_modulo,
            delay_improvement: config.delay_improvement,
            discount_factor: config.discount_factor,
            cadence_origin: config.cadence_origin,
            trajectories_completed: 0,
            training_steps_completed: 0,
            state: SchedulerState::WaitingForDelay,
            synchronizer: TargetSynchronizer::new(),
        };
        scheduler.update_state();
        scheduler
    }

    /// Returns the state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Returns the number of completed trajectories.
    pub fn trajectories_completed(&self) -> usize {
        self.trajectories_completed
    }

    /// Returns the number of optimizer updates on the policy network.
    pub fn training_steps_completed(&self) -> usize {
        self.training_steps_completed
    }

    /// Returns the number of target synchronizations done by this scheduler.
    pub fn target_syncs(&self) -> usize {
        self.synchronizer.n_syncs()
    }

    /// Sets both counters, used when resuming from a checkpoint.
    pub fn restore(&mut self, trajectories_completed: usize, training_steps_completed: usize) {
        self.trajectories_completed = trajectories_completed;
        self.training_steps_completed = training_steps_completed;
        self.update_state();
    }

    fn update_state(&mut self) {
        if self.state == SchedulerState::WaitingForDelay
            && self.trajectories_completed >= self.delay_improvement
        {
            self.state = SchedulerState::Active;
            if self.delay_improvement > 0 {
                info!(
                    "Training starts after {} trajectories",
                    self.trajectories_completed
                );
            }
        }
    }

    fn is_training_tick(&self) -> bool {
        if self.state != SchedulerState::Active {
            return false;
        }
        let count = match self.cadence_origin {
            CadenceOrigin::Absolute => self.trajectories_completed,
            CadenceOrigin::SinceDelay => self.trajectories_completed - self.delay_improvement,
        };
        count % self.train_target_modulo == 0
    }

    /// Counts a completed trajectory, then trains and synchronizes on cadence.
    ///
    /// Counting and evaluating happen in one call, so each value of
    /// `trajectories_completed` is evaluated exactly once.
    pub fn on_trajectory_completed<Q, R>(
        &mut self,
        policy: &mut Q,
        target: &mut Q,
        buffer: &mut R,
    ) -> Result<TickReport>
    where
        Q: QFunction,
        R: ReplayBufferBase<Batch = Vec<Transition<Q::Obs>>>,
    {
        self.trajectories_completed += 1;
        self.update_state();

        let mut report = TickReport::default();
        if !self.is_training_tick() {
            return Ok(report);
        }

        let steps_before = self.training_steps_completed;
        let mut loss_sum = 0f32;
        for _ in 0..self.train_iterations {
            match buffer.batch(self.batch_size) {
                Ok(batch) => {
                    loss_sum += self.train_round(policy, target, batch)?;
                    report.trained_rounds += 1;
                }
                Err(e @ AdvantageError::InsufficientData { .. }) => {
                    warn!(
                        "Skipped training at trajectory {}: {}",
                        self.trajectories_completed, e
                    );
                    report.skipped = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if report.trained_rounds > 0 {
            report.mean_loss = Some(loss_sum / report.trained_rounds as f32);
            let m = self.improve_policy_modulo;
            if self.training_steps_completed / m != steps_before / m {
                self.synchronizer.sync(policy, target)?;
                report.synced = true;
            }
        }

        Ok(report)
    }

    fn train_round<Q: QFunction>(
        &mut self,
        policy: &mut Q,
        target: &Q,
        batch: Vec<Transition<Q::Obs>>,
    ) -> Result<f32> {
        let samples = td_targets(batch, target, self.discount_factor)?;
        let loss = policy.train_step(&samples)?;
        if !loss.is_finite() {
            return Err(AdvantageError::NonFiniteLoss {
                loss,
                training_steps: self.training_steps_completed,
            }
            .into());
        }
        self.training_steps_completed += 1;
        debug!(
            "Training step {}: loss = {}",
            self.training_steps_completed, loss
        );
        Ok(loss)
    }
}

/// Computes TD targets with the target network.
///
/// The target of a transition is `r` if it is terminal, otherwise
/// `r + discount_factor^k * max_a Q_target(o', a)` where `k` is
/// [`Transition::bootstrap_steps`]. Fails with
/// [`AdvantageError::ActionOutOfRange`] if an action is not valid for `target`
/// and with [`AdvantageError::PredictionShape`] if a prediction does not have
/// one value per action.
pub fn td_targets<Q: QFunction>(
    batch: Vec<Transition<Q::Obs>>,
    target: &Q,
    discount_factor: f32,
) -> Result<Vec<TrainingSample<Q::Obs>>> {
    let n_actions = target.num_actions();
    batch
        .into_iter()
        .map(|tr| -> Result<TrainingSample<Q::Obs>> {
            let k = tr.bootstrap_steps();
            let (obs, act, reward, next_obs, is_done) = tr.unpack();
            if act >= n_actions {
                return Err(AdvantageError::ActionOutOfRange {
                    act,
                    num_actions: n_actions,
                }
                .into());
            }
            let value = if is_done {
                reward
            } else {
                let q = target.predict(&next_obs)?;
                if q.len() != n_actions {
                    return Err(AdvantageError::PredictionShape {
                        expected: n_actions,
                        actual: q.len(),
                    }
                    .into());
                }
                let q_max = q.into_iter().fold(f32::NEG_INFINITY, f32::max);
                reward + discount_factor.powi(k as i32) * q_max
            };
            Ok(TrainingSample {
                obs,
                act,
                target: value,
            })
        })
        .collect()
}
