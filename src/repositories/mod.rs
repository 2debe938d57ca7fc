use async_trait::async_trait;
use uuid::Uuid;

use crate::error::VaultResult;
use crate::models::{NewPdfFile, PdfFile};

pub mod files;
pub mod users;

pub use files::PgRecordStore;

/// Record store client for PDF metadata rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts a row; the store assigns `id` and `created_at`.
    async fn insert(&self, new: NewPdfFile) -> VaultResult<PdfFile>;

    /// Rows owned by `owner`, newest first.
    async fn list(&self, owner: &str) -> VaultResult<Vec<PdfFile>>;

    /// Deletes the row with `id`. Deleting an absent row is not an error.
    async fn delete(&self, id: Uuid) -> VaultResult<()>;
}
