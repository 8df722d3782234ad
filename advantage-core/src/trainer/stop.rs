use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Requests a [`TrainingOrchestrator`](super::TrainingOrchestrator) to stop.
///
/// The orchestrator checks the handle between trajectories, so the trajectory
/// in progress always completes. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Creates a handle that is not stopped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
