//! In-memory collaborators with failure switches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::SessionClient;
use crate::error::{VaultError, VaultResult};
use crate::models::{NewPdfFile, PdfFile, SessionUser};
use crate::repositories::RecordStore;
use crate::storage::ObjectStore;

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    signed: Mutex<Vec<(String, Duration)>>,
    fail_uploads: AtomicBool,
    fail_removes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn put(&self, key: &str, bytes: &[u8]) {
        self.objects.lock().unwrap().insert(key.to_string(), bytes.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Drops an object behind the workspace's back.
    pub fn forget(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn signed_requests(&self) -> Vec<(String, Duration)> {
        self.signed.lock().unwrap().clone()
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> VaultResult<String> {
        // Lets concurrent callers interleave as they would over the network.
        tokio::task::yield_now().await;
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(VaultError::Storage(format!("put {}: unavailable", key)));
        }
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(key.to_string())
    }

    async fn download(&self, key: &str) -> VaultResult<Vec<u8>> {
        self.get(key)
            .ok_or_else(|| VaultError::ObjectMissing(key.to_string()))
    }

    async fn remove(&self, keys: &[String]) -> VaultResult<()> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(VaultError::Storage("delete: unavailable".into()));
        }
        let mut objects = self.objects.lock().unwrap();
        if let Some(missing) = keys.iter().find(|k| !objects.contains_key(*k)) {
            return Err(VaultError::ObjectMissing(missing.clone()));
        }
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> VaultResult<String> {
        self.signed
            .lock()
            .unwrap()
            .push((key.to_string(), expires_in));
        Ok(format!(
            "https://objects.test/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }
}

#[derive(Default)]
pub struct MemoryRecordStore {
    rows: Mutex<Vec<PdfFile>>,
    inserted: AtomicUsize,
    fail_inserts: AtomicBool,
    fail_lists: AtomicBool,
    failing_deletes: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// The next `count` deletes fail.
    pub fn fail_deletes(&self, count: usize) {
        self.failing_deletes.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, new: NewPdfFile) -> VaultResult<PdfFile> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(VaultError::Database(diesel::result::Error::RollbackTransaction));
        }
        // Strictly increasing timestamps regardless of clock resolution.
        let seq = self.inserted.fetch_add(1, Ordering::SeqCst) as i64;
        let record = PdfFile {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            filename: new.filename,
            file_path: new.file_path,
            file_size: new.file_size,
            created_at: Utc::now().naive_utc() + chrono::Duration::seconds(seq),
        };
        self.rows.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list(&self, owner: &str) -> VaultResult<Vec<PdfFile>> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(VaultError::Database(diesel::result::Error::BrokenTransactionManager));
        }
        let mut rows: Vec<PdfFile> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> VaultResult<()> {
        let failing = self.failing_deletes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_deletes.store(failing.saturating_sub(1), Ordering::SeqCst);
            return Err(VaultError::Database(diesel::result::Error::BrokenTransactionManager));
        }
        self.rows.lock().unwrap().retain(|r| r.id != id);
        Ok(())
    }
}

pub struct StaticSession {
    user: Option<SessionUser>,
    fail: bool,
    fetches: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl StaticSession {
    fn new(user: Option<SessionUser>, fail: bool) -> Self {
        Self {
            user,
            fail,
            fetches: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }

    pub fn signed_in(user: SessionUser) -> Self {
        Self::new(Some(user), false)
    }

    pub fn signed_out() -> Self {
        Self::new(None, false)
    }

    pub fn failing() -> Self {
        Self::new(None, true)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionClient for StaticSession {
    async fn current_user(&self) -> VaultResult<Option<SessionUser>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(VaultError::Session("identity provider unreachable".into()));
        }
        Ok(self.user.clone())
    }

    async fn sign_out(&self) -> VaultResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
