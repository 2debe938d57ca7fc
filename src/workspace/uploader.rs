use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{info, warn};

use super::reconcile::Pending;
use super::{Backends, Notifier, ReconciliationQueue, WorkspaceEvent, WorkspaceEvents};
use crate::auth::SessionProvider;
use crate::config::PDF_MIME;
use crate::error::{VaultError, VaultResult};
use crate::models::files::storage_key;
use crate::models::{NewPdfFile, PdfFile};
use crate::repositories::RecordStore;
use crate::storage::ObjectStore;

/// A file handed over by the client, before any validation.
#[derive(Debug, Clone)]
pub struct DroppedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl DroppedFile {
    fn is_pdf(&self) -> bool {
        let declared = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|ct| ct.trim().eq_ignore_ascii_case(PDF_MIME));

        declared
            || mime_guess::from_path(&self.name)
                .iter()
                .any(|m| m.essence_str() == PDF_MIME)
    }
}

/// Drop-zone filter: PDFs by declared type or extension, at most one file.
/// The bytes themselves are not inspected.
pub fn accepted_files(files: Vec<DroppedFile>) -> Vec<DroppedFile> {
    files.into_iter().filter(DroppedFile::is_pdf).take(1).collect()
}

/// Clears the uploading flag when the upload ends, however it ends.
struct UploadingGuard<'a>(&'a AtomicBool);

impl Drop for UploadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owners with an upload in flight, shared by every workspace of the process.
#[derive(Clone, Default)]
pub struct UploadSlots(Arc<Mutex<HashSet<String>>>);

impl UploadSlots {
    /// Claims the owner's slot. `None` while another upload for them runs.
    pub fn claim(&self, owner: &str) -> Option<UploadSlot> {
        let mut owners = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if !owners.insert(owner.to_string()) {
            return None;
        }
        Some(UploadSlot {
            slots: self.clone(),
            owner: owner.to_string(),
        })
    }

    pub fn is_claimed(&self, owner: &str) -> bool {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(owner)
    }
}

/// Held for the duration of one owner's upload.
pub struct UploadSlot {
    slots: UploadSlots,
    owner: String,
}

impl Drop for UploadSlot {
    fn drop(&mut self) {
        self.slots
            .0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.owner);
    }
}

pub struct Uploader {
    session: Arc<SessionProvider>,
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    events: WorkspaceEvents,
    reconciliation: ReconciliationQueue,
    slots: UploadSlots,
    notifier: Notifier,
    uploading: AtomicBool,
}

impl Uploader {
    pub fn new(session: Arc<SessionProvider>, backends: &Backends, notifier: Notifier) -> Self {
        Self {
            session,
            objects: backends.objects.clone(),
            records: backends.records.clone(),
            events: backends.events.clone(),
            reconciliation: backends.reconciliation.clone(),
            slots: backends.uploads.clone(),
            notifier,
            uploading: AtomicBool::new(false),
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    /// Uploads the first accepted file. `None` when nothing was dropped.
    pub async fn on_drop(&self, files: Vec<DroppedFile>) -> Option<VaultResult<PdfFile>> {
        let file = files.into_iter().next()?;

        if self
            .uploading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let err = VaultError::UploadInProgress;
            self.notifier.error(err.to_string());
            return Some(Err(err));
        }
        let _guard = UploadingGuard(&self.uploading);

        let result = self.store(file).await;
        match &result {
            Ok(record) => {
                self.notifier.success("PDF uploaded");
                self.events.emit(WorkspaceEvent::FileUploaded(record.clone()));
            }
            Err(e) => self.notifier.error(e.to_string()),
        }
        Some(result)
    }

    async fn store(&self, file: DroppedFile) -> VaultResult<PdfFile> {
        let user = self
            .session
            .resolve_user()
            .await?
            .ok_or(VaultError::AuthRequired)?;
        let _slot = self
            .slots
            .claim(&user.id)
            .ok_or(VaultError::UploadInProgress)?;

        let key = storage_key(&user.id, Utc::now().timestamp_millis(), &file.name);
        let file_size = file.bytes.len() as i64;
        let path = self.objects.upload(&key, file.bytes, PDF_MIME).await?;

        let new = NewPdfFile {
            user_id: user.id.clone(),
            filename: file.name,
            file_path: path.clone(),
            file_size,
        };

        match self.records.insert(new).await {
            Ok(record) => {
                info!("Uploaded {} for user {}", record.file_path, user.id);
                Ok(record)
            }
            Err(e) => {
                self.compensate(path).await;
                Err(e)
            }
        }
    }

    /// Undoes the object write after the metadata insert failed.
    async fn compensate(&self, path: String) {
        warn!("Removing {} after failed metadata insert", path);
        if let Err(e) = self.objects.remove(std::slice::from_ref(&path)).await {
            warn!("Compensating removal of {} failed: {}", path, e);
            self.reconciliation.mark(Pending::OrphanObject(path));
        }
    }
}
