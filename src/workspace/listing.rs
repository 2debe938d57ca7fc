use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use log::{info, warn};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use super::reconcile::Pending;
use super::{Backends, Notifier, ReconciliationQueue, WorkspaceEvent, WorkspaceEvents};
use crate::auth::SessionProvider;
use crate::config::{RetryPolicy, SIGNED_URL_EXPIRY_SECS};
use crate::error::{VaultError, VaultResult};
use crate::models::PdfFile;
use crate::repositories::RecordStore;
use crate::storage::ObjectStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRow {
    pub id: Uuid,
    pub filename: String,
    pub size: String,
    pub uploaded_at: String,
    pub storage_key: String,
}

pub struct Download {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The session owner's uploaded files, newest first as returned by the record store.
pub struct FileListing {
    session: Arc<SessionProvider>,
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    events: WorkspaceEvents,
    reconciliation: ReconciliationQueue,
    record_delete: RetryPolicy,
    notifier: Notifier,
    files: Vec<PdfFile>,
    loading: bool,
}

impl FileListing {
    pub fn new(session: Arc<SessionProvider>, backends: &Backends, notifier: Notifier) -> Self {
        Self {
            session,
            objects: backends.objects.clone(),
            records: backends.records.clone(),
            events: backends.events.clone(),
            reconciliation: backends.reconciliation.clone(),
            record_delete: backends.record_delete,
            notifier,
            files: Vec::new(),
            loading: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn files(&self) -> &[PdfFile] {
        &self.files
    }

    pub fn rows<Tz>(&self, tz: &Tz) -> Vec<FileRow>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.files
            .iter()
            .map(|f| FileRow {
                id: f.id,
                filename: f.filename.clone(),
                size: f.size_label(),
                uploaded_at: f.uploaded_at_label(tz),
                storage_key: f.file_path.clone(),
            })
            .collect()
    }

    /// Replaces the list with a fresh fetch. On failure the list is left empty.
    pub async fn load(&mut self) -> VaultResult<()> {
        self.loading = true;
        let result = self.fetch().await;
        self.loading = false;

        match result {
            Ok(files) => {
                self.files = files;
                Ok(())
            }
            Err(e) => {
                warn!("Loading files failed: {}", e);
                self.files.clear();
                self.notifier.error("Failed to load files");
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> VaultResult<Vec<PdfFile>> {
        let user = self
            .session
            .resolve_user()
            .await?
            .ok_or(VaultError::AuthRequired)?;
        self.records.list(&user.id).await
    }

    fn find(&self, id: Uuid) -> VaultResult<&PdfFile> {
        self.files
            .iter()
            .find(|f| f.id == id)
            .ok_or(VaultError::FileNotFound(id))
    }

    /// Signed link to the file, valid for [`SIGNED_URL_EXPIRY_SECS`].
    pub async fn preview(&self, id: Uuid) -> VaultResult<String> {
        let result = match self.find(id) {
            Ok(file) => {
                self.objects
                    .signed_url(&file.file_path, Duration::from_secs(SIGNED_URL_EXPIRY_SECS))
                    .await
            }
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.notifier.error("Failed to open preview");
        }
        result
    }

    pub async fn download(&self, id: Uuid) -> VaultResult<Download> {
        let result = match self.find(id) {
            Ok(file) => self.objects.download(&file.file_path).await.map(|bytes| Download {
                filename: file.filename.clone(),
                bytes,
            }),
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.notifier.error("Download failed");
        }
        result
    }

    /// Removes the stored bytes, then the metadata row, then the list entry.
    pub async fn delete(&mut self, id: Uuid) -> VaultResult<()> {
        let file = match self.find(id) {
            Ok(file) => file.clone(),
            Err(e) => {
                self.notifier.error("Failed to delete file");
                return Err(e);
            }
        };

        if let Err(e) = self.objects.remove(std::slice::from_ref(&file.file_path)).await {
            self.notifier.error("Failed to delete file");
            return Err(e);
        }

        if let Err(e) = self.delete_record(id).await {
            self.reconciliation.mark(Pending::DanglingRecord(id));
            self.notifier.error("Failed to delete file");
            return Err(e);
        }

        self.files.retain(|f| f.id != id);
        info!("Deleted {} ({})", file.filename, file.file_path);
        self.notifier.success("File deleted");
        self.events.emit(WorkspaceEvent::FileDeleted(id));
        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> VaultResult<()> {
        let mut attempt = 0;
        loop {
            match self.records.delete(id).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 >= self.record_delete.attempts => return Err(e),
                Err(e) => {
                    attempt += 1;
                    warn!("Deleting record {} failed (attempt {}): {}", id, attempt, e);
                    tokio::time::sleep(self.record_delete.delay_before(attempt)).await;
                }
            }
        }
    }

    /// Applies the next workspace event: an upload triggers a re-fetch, a
    /// deletion drops the row. Returns false once the channel is closed.
    pub async fn follow(&mut self, events: &mut broadcast::Receiver<WorkspaceEvent>) -> bool {
        match events.recv().await {
            Ok(WorkspaceEvent::FileUploaded(_)) | Err(RecvError::Lagged(_)) => {
                let _ = self.load().await;
                true
            }
            Ok(WorkspaceEvent::FileDeleted(id)) => {
                self.files.retain(|f| f.id != id);
                true
            }
            Err(RecvError::Closed) => false,
        }
    }
}
