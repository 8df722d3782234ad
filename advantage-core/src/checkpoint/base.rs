use crate::error::AdvantageError;
use anyhow::{Context, Result};
use chrono::Local;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Counters needed to resume training at the scheduler level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrainingCounters {
    /// Completed trajectories.
    pub trajectories_completed: usize,

    /// Optimizer updates of the policy network.
    pub training_steps_completed: usize,

    /// Decay-step counter of the epsilon scheduler.
    pub epsilon_step: usize,
}

#[derive(Debug, Deserialize, Serialize)]
struct CheckpointState {
    counters: TrainingCounters,
    saved_at: String,
}

/// Parameters of the model pair and the training counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint<P> {
    /// Parameters of the policy network.
    pub policy_params: P,

    /// Parameters of the target network.
    pub target_params: P,

    /// Training counters.
    pub counters: TrainingCounters,
}

fn file_path(dir: &Path, prefix: &str, name: &str) -> PathBuf {
    dir.join(format!("{}_{}", prefix, name))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(bytes)?;
    file.flush()?;
    Ok(())
}

/// Replaces the files in `files` as a set.
///
/// Every file is first written to a temporary sibling. Renaming starts only
/// after all of them were written, so a failed write leaves the previous set
/// untouched.
fn write_all_atomic(files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        let tmp = tmp_path(path);
        if let Err(e) = write_file(&tmp, bytes) {
            for t in staged.iter().chain([&tmp]) {
                let _ = fs::remove_file(t);
            }
            return Err(e.context(format!("Failed to write {:?}", tmp)));
        }
        staged.push(tmp);
    }
    for (tmp, (path, _)) in staged.iter().zip(files) {
        fs::rename(tmp, path)?;
    }
    Ok(())
}

fn open(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(AdvantageError::CheckpointMissing(path.to_path_buf()).into());
    }
    Ok(BufReader::new(File::open(path)?))
}

impl<P> Checkpoint<P>
where
    P: Serialize + DeserializeOwned,
{
    /// Saves the checkpoint in `dir`, creating the directory if needed.
    ///
    /// Existing files with the same prefix are replaced. If writing fails,
    /// the previously saved checkpoint stays loadable.
    pub fn save(&self, dir: impl AsRef<Path>, prefix: &str) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create checkpoint directory {:?}", dir))?;

        let state = CheckpointState {
            counters: self.counters,
            saved_at: Local::now().to_rfc3339(),
        };
        write_all_atomic(&[
            (
                file_path(dir, prefix, "policy.bin"),
                bincode::serialize(&self.policy_params)?,
            ),
            (
                file_path(dir, prefix, "target.bin"),
                bincode::serialize(&self.target_params)?,
            ),
            (
                file_path(dir, prefix, "state.yaml"),
                serde_yaml::to_string(&state)?.into_bytes(),
            ),
        ])
    }

    /// Loads the checkpoint saved in `dir` with `prefix`.
    pub fn load(dir: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let policy_params = bincode::deserialize_from(open(&file_path(dir, prefix, "policy.bin"))?)?;
        let target_params = bincode::deserialize_from(open(&file_path(dir, prefix, "target.bin"))?)?;
        let state: CheckpointState =
            serde_yaml::from_reader(open(&file_path(dir, prefix, "state.yaml"))?)?;
        Ok(Self {
            policy_params,
            target_params,
            counters: state.counters,
        })
    }

    /// Returns `true` if all files of the checkpoint exist.
    pub fn exists(dir: impl AsRef<Path>, prefix: &str) -> bool {
        ["policy.bin", "target.bin", "state.yaml"]
            .iter()
            .all(|name| file_path(dir.as_ref(), prefix, name).exists())
    }
}
