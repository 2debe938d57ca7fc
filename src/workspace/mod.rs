//! The signed-in workspace: session gate, uploader and file listing driving
//! the object store and the record store.

use std::sync::{Arc, Mutex};

use log::{info, warn};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::SessionProvider;
use crate::config::RetryPolicy;
use crate::models::PdfFile;
use crate::repositories::RecordStore;
use crate::storage::ObjectStore;

pub mod gate;
pub mod listing;
pub mod reconcile;
pub mod uploader;

pub use gate::{AuthGate, GateView};
pub use listing::{Download, FileListing, FileRow};
pub use reconcile::ReconciliationQueue;
pub use uploader::{DroppedFile, UploadSlots, Uploader, accepted_files};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

/// Collects user-facing notifications raised while handling one interaction.
#[derive(Clone, Default)]
pub struct Notifier(Arc<Mutex<Vec<Notification>>>);

impl Notifier {
    pub fn success(&self, message: impl Into<String>) {
        let message = message.into();
        info!("notify: {}", message);
        self.push(Level::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("notify: {}", message);
        self.push(Level::Error, message);
    }

    fn push(&self, level: Level, message: String) {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notification { level, message });
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceEvent {
    FileUploaded(PdfFile),
    FileDeleted(Uuid),
}

/// Broadcast channel connecting the uploader to listings that should refresh.
#[derive(Clone)]
pub struct WorkspaceEvents(broadcast::Sender<WorkspaceEvent>);

impl WorkspaceEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self(tx)
    }

    pub fn emit(&self, event: WorkspaceEvent) {
        // No listeners is fine.
        let _ = self.0.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkspaceEvent> {
        self.0.subscribe()
    }
}

impl Default for WorkspaceEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Process-wide collaborators shared by every workspace.
#[derive(Clone)]
pub struct Backends {
    pub objects: Arc<dyn ObjectStore>,
    pub records: Arc<dyn RecordStore>,
    pub events: WorkspaceEvents,
    pub reconciliation: ReconciliationQueue,
    pub uploads: UploadSlots,
    pub record_delete: RetryPolicy,
}

impl Backends {
    pub fn new(objects: Arc<dyn ObjectStore>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            objects,
            records,
            events: WorkspaceEvents::default(),
            reconciliation: ReconciliationQueue::default(),
            uploads: UploadSlots::default(),
            record_delete: RetryPolicy::default(),
        }
    }

    pub fn with_record_delete(mut self, policy: RetryPolicy) -> Self {
        self.record_delete = policy;
        self
    }

    /// Uploader and listing bound to one session, sharing one notifier.
    pub fn workspace(&self, session: Arc<SessionProvider>) -> Workspace {
        let notifier = Notifier::default();
        Workspace {
            uploader: Uploader::new(session.clone(), self, notifier.clone()),
            listing: FileListing::new(session, self, notifier.clone()),
            notifier,
        }
    }
}

pub struct Workspace {
    pub notifier: Notifier,
    pub uploader: Uploader,
    pub listing: FileListing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_drains_in_order() {
        let notifier = Notifier::default();
        notifier.success("saved");
        notifier.error("failed");
        assert_eq!(
            notifier.drain(),
            vec![
                Notification {
                    level: Level::Success,
                    message: "saved".into()
                },
                Notification {
                    level: Level::Error,
                    message: "failed".into()
                },
            ]
        );
        assert!(notifier.drain().is_empty());
    }

    #[test]
    fn events_reach_every_subscriber() {
        let events = WorkspaceEvents::new(4);
        let mut a = events.subscribe();
        let mut b = events.subscribe();
        let id = Uuid::new_v4();
        events.emit(WorkspaceEvent::FileDeleted(id));
        assert_eq!(a.try_recv().unwrap(), WorkspaceEvent::FileDeleted(id));
        assert_eq!(b.try_recv().unwrap(), WorkspaceEvent::FileDeleted(id));
    }
}
