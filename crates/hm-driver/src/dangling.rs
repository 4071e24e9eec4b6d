use tracing::{error, info};

use crate::{CloudApi, Error};

/// A resource created during a run, and how to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    DeleteSshKey { id: i64, name: String },
    DeletePlacementGroup { id: i64, name: String },
}

impl Rollback {
    async fn undo(&self, api: &dyn CloudApi) -> crate::Result<()> {
        match self {
            Self::DeleteSshKey { id, .. } => api.delete_ssh_key(*id).await,
            Self::DeletePlacementGroup { id, .. } => api.delete_placement_group(*id).await,
        }
    }
}

/// Outcome of a rollback. Entries that failed keep their error.
#[derive(Debug, Default)]
pub struct RollbackReport {
    pub undone: Vec<Rollback>,
    pub failed: Vec<(Rollback, Error)>,
}

/// Ordered list of resources a run created and must delete if it fails.
#[derive(Debug, Default)]
pub struct DanglingResources {
    entries: Vec<Rollback>,
}

impl DanglingResources {
    pub fn push(&mut self, entry: Rollback) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Rollback] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry; the created resources now belong to the machine.
    pub fn discard(&mut self) {
        self.entries.clear();
    }

    /// Undo every entry in order. A failed entry is logged and does not
    /// stop the ones after it.
    pub async fn rollback(&mut self, api: &dyn CloudApi) -> RollbackReport {
        let mut report = RollbackReport::default();
        for entry in self.entries.drain(..) {
            match entry.undo(api).await {
                Ok(()) => {
                    info!(?entry, "rolled back");
                    report.undone.push(entry);
                }
                Err(e) => {
                    error!(?entry, error = %e, "could not roll back");
                    report.failed.push((entry, e));
                }
            }
        }
        report
    }
}
