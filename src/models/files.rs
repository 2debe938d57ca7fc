use std::fmt::Display;

use chrono::{NaiveDateTime, TimeZone};
use diesel::{Insertable, Queryable, Selectable};
use serde::Serialize;
use uuid::Uuid;

/// Metadata row for one uploaded PDF.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::pdf_files)]
pub struct PdfFile {
    pub id: Uuid,
    pub user_id: String,
    pub filename: String,
    /// Key of the bytes in the object store.
    pub file_path: String,
    pub file_size: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::pdf_files)]
pub struct NewPdfFile {
    pub user_id: String,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
}

/// `{owner}/{epoch_millis}-{filename}`. The filename is kept as uploaded.
pub fn storage_key(owner: &str, epoch_millis: i64, filename: &str) -> String {
    format!("{}/{}-{}", owner, epoch_millis, filename)
}

impl PdfFile {
    /// Size in mebibytes with two decimals, labelled "MB".
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.file_size as f64 / 1024.0 / 1024.0)
    }

    /// Upload time rendered in `tz`; `created_at` is stored as UTC.
    pub fn uploaded_at_label<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        tz.from_utc_datetime(&self.created_at)
            .format("%B %-d, %Y %-I:%M %p")
            .to_string()
    }
}
