use super::{writer::BackgroundWriter, Checkpoint};
use crate::TrainerConfig;
use log::{info, warn};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// Result of [`CheckpointScheduler::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointOutcome {
    /// The interval has not elapsed.
    NotDue,

    /// The checkpoint was written.
    Saved,

    /// Writing failed. Training continues.
    Failed,

    /// The checkpoint was handed to the background writer.
    Dispatched,

    /// The background writer was busy and the request was dropped.
    Dropped,
}

/// Requests checkpoints on a wall-clock interval.
///
/// A request is due when `checkpoint_freq_sec` seconds have passed since the
/// previous request, or since construction for the first one. The timer is
/// reset whenever a request is made, whether the save succeeds or not.
///
/// The snapshot of the parameters is taken on the calling thread. With
/// `checkpoint_in_background`, writing happens on a separate thread and
/// requests made while a save is in flight are dropped.
pub struct CheckpointScheduler<P> {
    dir: PathBuf,
    prefix: String,
    interval: Duration,
    last_request: Instant,
    n_saved: usize,
    n_failed: usize,
    writer: Option<BackgroundWriter<P>>,
}

impl<P> CheckpointScheduler<P>
where
    P: Serialize + DeserializeOwned + Send + 'static,
{
    /// Builds a scheduler, or returns `None` if `checkpoint_dir_path` is not set.
    pub fn build(config: &TrainerConfig) -> Option<Self> {
        let dir = config.checkpoint_dir_path.clone()?;
        let writer = match config.checkpoint_in_background {
            true => Some(BackgroundWriter::spawn(
                dir.clone(),
                config.checkpoint_file_prefix.clone(),
            )),
            false => None,
        };
        Some(Self {
            dir,
            prefix: config.checkpoint_file_prefix.clone(),
            interval: Duration::from_secs(config.checkpoint_freq_sec),
            last_request: Instant::now(),
            n_saved: 0,
            n_failed: 0,
            writer,
        })
    }

    /// Returns the checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the prefix of checkpoint files.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `true` if a checkpoint is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_request) >= self.interval
    }

    /// Saves a checkpoint built by `snapshot` if one is due at `now`.
    ///
    /// `snapshot` is called only when a checkpoint is due.
    pub fn poll<F>(&mut self, now: Instant, snapshot: F) -> CheckpointOutcome
    where
        F: FnOnce() -> Checkpoint<P>,
    {
        if !self.is_due(now) {
            return CheckpointOutcome::NotDue;
        }
        self.last_request = now;
        self.save(snapshot())
    }

    /// Saves `ckpt` regardless of the interval, resetting the timer.
    pub fn save_now(&mut self, ckpt: Checkpoint<P>) -> CheckpointOutcome {
        self.last_request = Instant::now();
        self.save(ckpt)
    }

    fn save(&mut self, ckpt: Checkpoint<P>) -> CheckpointOutcome {
        if let Some(writer) = &self.writer {
            return match writer.try_submit(ckpt) {
                true => CheckpointOutcome::Dispatched,
                false => {
                    warn!("Checkpoint writer is busy, dropped a checkpoint request");
                    CheckpointOutcome::Dropped
                }
            };
        }

        let trajectories_completed = ckpt.counters.trajectories_completed;
        match ckpt.save(&self.dir, &self.prefix) {
            Ok(()) => {
                self.n_saved += 1;
                info!(
                    "Saved checkpoint in {:?} at trajectory {}",
                    self.dir, trajectories_completed
                );
                CheckpointOutcome::Saved
            }
            Err(e) => {
                self.n_failed += 1;
                warn!("Failed to save checkpoint in {:?}: {:#}", self.dir, e);
                CheckpointOutcome::Failed
            }
        }
    }

    /// Returns the number of checkpoints written successfully.
    ///
    /// Saves in flight on the background writer are not counted until they finish.
    pub fn checkpoints_saved(&self) -> usize {
        self.n_saved + self.writer.as_ref().map_or(0, |w| w.n_saved())
    }

    /// Returns the number of failed foreground saves.
    pub fn checkpoints_failed(&self) -> usize {
        self.n_failed
    }

    /// Waits for the background writer, if any, to finish its save in flight.
    pub fn finish(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            writer.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::TrainingCounters;
    use anyhow::Result;
    use std::{fs, thread};
    use tempdir::TempDir;

    fn checkpoint(trajectories_completed: usize) -> Checkpoint<Vec<f32>> {
        Checkpoint {
            policy_params: vec![0.5, 1.5],
            target_params: vec![0.5, 1.0],
            counters: TrainingCounters {
                trajectories_completed,
                training_steps_completed: 3,
                epsilon_step: trajectories_completed,
            },
        }
    }

    #[test]
    fn test_disabled_without_dir() {
        let config = TrainerConfig::default();
        assert!(CheckpointScheduler::<Vec<f32>>::build(&config).is_none());
    }

    #[test]
    fn test_interval() -> Result<()> {
        let dir = TempDir::new("checkpoint_scheduler")?;
        let config = TrainerConfig::default()
            .checkpoint_dir_path(dir.path())
            .checkpoint_freq_sec(60);
        let mut scheduler = CheckpointScheduler::<Vec<f32>>::build(&config).unwrap();
        let start = Instant::now();

        let mut called = false;
        let outcome = scheduler.poll(start, || {
            called = true;
            checkpoint(1)
        });
        assert_eq!(outcome, CheckpointOutcome::NotDue);
        assert!(!called);

        let t1 = start + Duration::from_secs(61);
        assert_eq!(scheduler.poll(t1, || checkpoint(2)), CheckpointOutcome::Saved);
        assert_eq!(
            Checkpoint::<Vec<f32>>::load(dir.path(), "advantage")?,
            checkpoint(2)
        );

        // The timer restarts at the request.
        let t2 = t1 + Duration::from_secs(30);
        assert_eq!(scheduler.poll(t2, || checkpoint(3)), CheckpointOutcome::NotDue);
        let t3 = t1 + Duration::from_secs(60);
        assert_eq!(scheduler.poll(t3, || checkpoint(4)), CheckpointOutcome::Saved);
        assert_eq!(scheduler.checkpoints_saved(), 2);
        Ok(())
    }

    #[test]
    fn test_failure_resets_timer() -> Result<()> {
        let dir = TempDir::new("checkpoint_scheduler")?;
        // A regular file where the directory should be.
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, b"")?;
        let config = TrainerConfig::default()
            .checkpoint_dir_path(&blocked)
            .checkpoint_freq_sec(60);
        let mut scheduler = CheckpointScheduler::<Vec<f32>>::build(&config).unwrap();
        let t1 = Instant::now() + Duration::from_secs(60);

        assert_eq!(scheduler.poll(t1, || checkpoint(1)), CheckpointOutcome::Failed);
        assert_eq!(
            scheduler.poll(t1 + Duration::from_secs(1), || checkpoint(2)),
            CheckpointOutcome::NotDue
        );
        assert_eq!(scheduler.checkpoints_saved(), 0);
        assert_eq!(scheduler.checkpoints_failed(), 1);
        Ok(())
    }

    #[test]
    fn test_background() -> Result<()> {
        let dir = TempDir::new("checkpoint_scheduler")?;
        let config = TrainerConfig::default()
            .checkpoint_dir_path(dir.path())
            .checkpoint_file_prefix("bg")
            .checkpoint_freq_sec(0)
            .checkpoint_in_background(true);
        let mut scheduler = CheckpointScheduler::<Vec<f32>>::build(&config).unwrap();

        let mut dispatched = false;
        for _ in 0..1000 {
            match scheduler.poll(Instant::now(), || checkpoint(7)) {
                CheckpointOutcome::Dispatched => {
                    dispatched = true;
                    break;
                }
                CheckpointOutcome::Dropped => thread::sleep(Duration::from_millis(1)),
                outcome => panic!("unexpected outcome {:?}", outcome),
            }
        }
        assert!(dispatched);
        scheduler.finish();

        assert_eq!(scheduler.checkpoints_saved(), 1);
        assert_eq!(Checkpoint::<Vec<f32>>::load(dir.path(), "bg")?, checkpoint(7));
        Ok(())
    }
}
