use super::Checkpoint;
use anyhow::Result;
use crossbeam_channel::{bounded, Sender, TrySendError};
use log::{info, warn};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

/// Writes checkpoints on a dedicated thread.
///
/// The channel has no capacity: a request is accepted only while the thread
/// waits for one, so at most one save is in flight.
pub(super) struct BackgroundWriter<P> {
    sender: Option<Sender<Checkpoint<P>>>,
    handle: Option<JoinHandle<()>>,
    n_saved: Arc<AtomicUsize>,
}

impl<P> BackgroundWriter<P>
where
    P: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn spawn(dir: PathBuf, prefix: String) -> Self {
        Self::spawn_with(move |ckpt: &Checkpoint<P>| ckpt.save(&dir, &prefix))
    }

    pub fn spawn_with<F>(mut save: F) -> Self
    where
        F: FnMut(&Checkpoint<P>) -> Result<()> + Send + 'static,
    {
        let (sender, receiver) = bounded::<Checkpoint<P>>(0);
        let n_saved = Arc::new(AtomicUsize::new(0));
        let n_saved_ = n_saved.clone();
        let handle = thread::spawn(move || {
            for ckpt in receiver.iter() {
                match save(&ckpt) {
                    Ok(()) => {
                        n_saved_.fetch_add(1, Ordering::SeqCst);
                        info!(
                            "Saved checkpoint at trajectory {}",
                            ckpt.counters.trajectories_completed
                        );
                    }
                    Err(e) => warn!("Failed to save checkpoint: {:#}", e),
                }
            }
        });

        Self {
            sender: Some(sender),
            handle: Some(handle),
            n_saved,
        }
    }
}

impl<P> BackgroundWriter<P> {
    /// Hands `ckpt` to the thread. Returns `false` if a save is in flight.
    pub fn try_submit(&self, ckpt: Checkpoint<P>) -> bool {
        match &self.sender {
            Some(sender) => match sender.try_send(ckpt) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => false,
                Err(TrySendError::Disconnected(_)) => {
                    warn!("Checkpoint writer thread is gone");
                    false
                }
            },
            None => false,
        }
    }

    pub fn n_saved(&self) -> usize {
        self.n_saved.load(Ordering::SeqCst)
    }

    /// Waits for the save in flight, then stops the thread.
    pub fn finish(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Checkpoint writer thread panicked");
            }
        }
    }
}

impl<P> Drop for BackgroundWriter<P> {
    fn drop(&mut self) {
        self.finish();
    }
}
