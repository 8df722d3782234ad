//! TensorBoard output of training records.
use advantage_core::record::{Record, RecordValue, Recorder};
use log::warn;
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Every scalar in a record is written at the step given by the value of the
/// step key, `"trajectories"` by default. Records without the step key are
/// discarded.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    prefix: Option<String>,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "trajectories".to_string(),
            prefix: None,
        }
    }

    /// Uses the value of `key` as the step.
    pub fn step_key(mut self, key: impl Into<String>) -> Self {
        self.step_key = key.into();
        self
    }

    /// Prepends `prefix/` to every tag, e.g. `train/episode_return`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn tag(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [`Record`] into a TFRecord.
    ///
    /// [`RecordValue::Scalar`] values are written as they are.
    /// [`RecordValue::Array1`] values are written as one scalar per element,
    /// tagged `key/i`.
    fn write(&mut self, record: Record) {
        let step = match record.get_scalar(&self.step_key) {
            Ok(v) => v as usize,
            Err(e) => {
                warn!("Discarded a record without step: {}", e);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => {
                    let tag = self.tag(k);
                    self.writer.add_scalar(&tag, *v, step);
                }
                RecordValue::Array1(vs) => {
                    for (i, v) in vs.iter().enumerate() {
                        let tag = self.tag(&format!("{}/{}", k, i));
                        self.writer.add_scalar(&tag, *v, step);
                    }
                }
            }
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempdir::TempDir;

    fn event_files(dir: &Path) -> Result<usize> {
        Ok(std::fs::read_dir(dir)?.count())
    }

    #[test]
    fn test_write() -> Result<()> {
        let dir = TempDir::new("tensorboard")?;
        let mut recorder = TensorboardRecorder::new(dir.path()).prefix("train");
        for n in 1..=3 {
            let mut record = Record::from_scalar("trajectories", n as f32);
            record.insert("episode_return", RecordValue::Scalar(0.5 * n as f32));
            record.insert("q", RecordValue::Array1(vec![1.0, 2.0]));
            recorder.write(record);
        }
        // No step key
        recorder.write(Record::from_scalar("loss", 1.0));
        recorder.flush();
        assert!(event_files(dir.path())? > 0);
        Ok(())
    }

    #[test]
    fn test_tag() -> Result<()> {
        let dir = TempDir::new("tensorboard")?;
        let recorder = TensorboardRecorder::new(dir.path());
        assert_eq!(recorder.tag("loss"), "loss");
        let recorder = recorder.prefix("eval");
        assert_eq!(recorder.tag("loss"), "eval/loss");
        Ok(())
    }
}
