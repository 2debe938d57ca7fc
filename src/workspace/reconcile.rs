use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use uuid::Uuid;

use super::Backends;
use crate::error::VaultError;
use crate::repositories::RecordStore;
use crate::storage::ObjectStore;

/// Leftover of a two-step write whose second half or compensation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    /// Bytes stored without a metadata row.
    OrphanObject(String),
    /// Metadata row whose bytes are already removed.
    DanglingRecord(Uuid),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub resolved: usize,
    pub remaining: usize,
}

/// Held in process memory; entries do not survive a restart.
#[derive(Clone, Default)]
pub struct ReconciliationQueue(Arc<Mutex<Vec<Pending>>>);

impl ReconciliationQueue {
    pub fn mark(&self, pending: Pending) {
        let mut queue = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if !queue.contains(&pending) {
            warn!("Queued for reconciliation: {:?}", pending);
            queue.push(pending);
        }
    }

    pub fn pending(&self) -> Vec<Pending> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Retries every queued entry once; failures stay queued.
    pub async fn sweep(&self, objects: &dyn ObjectStore, records: &dyn RecordStore) -> SweepReport {
        let batch = std::mem::take(&mut *self.0.lock().unwrap_or_else(|e| e.into_inner()));
        let mut report = SweepReport::default();

        for pending in batch {
            let outcome = match &pending {
                Pending::OrphanObject(key) => match objects.remove(std::slice::from_ref(key)).await {
                    Err(VaultError::ObjectMissing(_)) => Ok(()),
                    other => other,
                },
                Pending::DanglingRecord(id) => records.delete(*id).await,
            };

            match outcome {
                Ok(()) => {
                    info!("Reconciled {:?}", pending);
                    report.resolved += 1;
                }
                Err(e) => {
                    warn!("Reconciliation of {:?} failed: {}", pending, e);
                    self.mark(pending);
                }
            }
        }

        report.remaining = self.pending().len();
        report
    }
}

/// Sweeps the shared queue every `period` for the life of the process.
pub async fn run_sweeper(backends: Backends, period: Duration) {
    let mut ticker = tokio::time::interval(period.max(Duration::from_secs(1)));
    loop {
        ticker.tick().await;
        let report = backends
            .reconciliation
            .sweep(backends.objects.as_ref(), backends.records.as_ref())
            .await;
        if report.resolved > 0 || report.remaining > 0 {
            info!(
                "Reconciliation sweep: {} resolved, {} remaining",
                report.resolved, report.remaining
            );
        }
    }
}
