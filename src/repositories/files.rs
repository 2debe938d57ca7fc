use actix_web::web;
use async_trait::async_trait;
use diesel::prelude::*;
use log::info;
use uuid::Uuid;

use super::RecordStore;
use crate::database::{DbPool, get_db_conn};
use crate::error::VaultResult;
use crate::models::{NewPdfFile, PdfFile};
use crate::schema::pdf_files::dsl::*;

/// Inserts a new file record and returns the created record
pub fn insert_file(pool: &DbPool, new: &NewPdfFile) -> VaultResult<PdfFile> {
    let mut conn = get_db_conn(pool)?;

    Ok(diesel::insert_into(pdf_files)
        .values(new)
        .returning(PdfFile::as_returning())
        .get_result(&mut conn)?)
}

/// Loads every record owned by `owner`, newest first
pub fn load_files_for_owner(pool: &DbPool, owner: &str) -> VaultResult<Vec<PdfFile>> {
    let mut conn = get_db_conn(pool)?;

    Ok(pdf_files
        .filter(user_id.eq(owner))
        .order(created_at.desc())
        .select(PdfFile::as_select())
        .load(&mut conn)?)
}

/// Deletes a file record by its ID.
pub fn delete_file_by_id(pool: &DbPool, file_id: Uuid) -> VaultResult<usize> {
    let mut conn = get_db_conn(pool)?;

    Ok(diesel::delete(pdf_files.filter(id.eq(file_id))).execute(&mut conn)?)
}

/// Record store over the Postgres pool. Queries run on actix's blocking pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: DbPool,
}

impl PgRecordStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, new: NewPdfFile) -> VaultResult<PdfFile> {
        let pool = self.pool.clone();
        let record = web::block(move || insert_file(&pool, &new)).await??;
        info!("Inserted pdf_files row {} ({})", record.id, record.file_path);
        Ok(record)
    }

    async fn list(&self, owner: &str) -> VaultResult<Vec<PdfFile>> {
        let pool = self.pool.clone();
        let owner = owner.to_string();
        Ok(web::block(move || load_files_for_owner(&pool, &owner)).await??)
    }

    async fn delete(&self, file_id: Uuid) -> VaultResult<()> {
        let pool = self.pool.clone();
        let removed = web::block(move || delete_file_by_id(&pool, file_id)).await??;
        info!("Deleted pdf_files row {} ({} affected)", file_id, removed);
        Ok(())
    }
}
