use crate::QFunction;
use anyhow::Result;
use log::debug;

/// Copies the parameters of the policy network into the target network.
///
/// The target network is borrowed mutably for the whole copy, so no
/// prediction on it can observe a partially copied parameter set.
#[derive(Debug, Default)]
pub struct TargetSynchronizer {
    n_syncs: usize,
}

impl TargetSynchronizer {
    /// Constructs a synchronizer.
    pub fn new() -> Self {
        Self { n_syncs: 0 }
    }

    /// Overwrites the parameters of `target` with those of `policy`.
    pub fn sync<Q: QFunction>(&mut self, policy: &Q, target: &mut Q) -> Result<()> {
        let params = policy.parameters();
        target.set_parameters(&params)?;
        self.n_syncs += 1;
        debug!("Synchronized target network ({} syncs)", self.n_syncs);
        Ok(())
    }

    /// Returns the number of completed synchronizations.
    pub fn n_syncs(&self) -> usize {
        self.n_syncs
    }
}
