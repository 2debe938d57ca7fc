use actix_web::http::{StatusCode, header};
use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Local;
use futures_util::StreamExt;
use uuid::Uuid;

use super::{failure, reply};
use crate::auth::RequestSession;
use crate::config::{PDF_MIME, SIGNED_URL_EXPIRY_SECS};
use crate::error::{VaultError, VaultResult};
use crate::workspace::{Backends, DroppedFile, Workspace, accepted_files};

/// Largest accepted upload body, in bytes.
#[derive(Clone, Copy)]
pub struct UploadLimit(pub usize);

/// Workspace with the listing already fetched.
async fn loaded(session: RequestSession, backends: &Backends) -> (Workspace, VaultResult<()>) {
    let mut workspace = backends.workspace(session.0);
    let loaded = workspace.listing.load().await;
    (workspace, loaded)
}

/// GET /api/files
/// Lists the caller's files, newest first.
pub async fn list_files(session: RequestSession, backends: web::Data<Backends>) -> HttpResponse {
    let (workspace, loaded) = loaded(session, &backends).await;
    match loaded {
        Ok(()) => reply(StatusCode::OK, workspace.listing.rows(&Local), &workspace.notifier),
        Err(e) => failure(e, &workspace.notifier),
    }
}

/// Client-side file name as sent, UTF-8 bytes included.
fn filename_header(req: &HttpRequest) -> VaultResult<String> {
    let value = req
        .headers()
        .get("X-Filename")
        .ok_or(VaultError::InvalidFilename)?;
    let name =
        String::from_utf8(value.as_bytes().to_vec()).map_err(|_| VaultError::InvalidFilename)?;
    if name.trim().is_empty() {
        return Err(VaultError::InvalidFilename);
    }
    Ok(name)
}

/// POST /api/files
/// Accepts one PDF as the raw body, named by the `X-Filename` header.
pub async fn upload_file(
    session: RequestSession,
    backends: web::Data<Backends>,
    limit: web::Data<UploadLimit>,
    mut payload: web::Payload,
    req: HttpRequest,
) -> VaultResult<HttpResponse> {
    let name = filename_header(&req)?;
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut bytes = Vec::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| VaultError::Internal(format!("stream error: {}", e)))?;
        if bytes.len() + chunk.len() > limit.0 {
            return Err(VaultError::PayloadTooLarge(limit.0));
        }
        bytes.extend_from_slice(&chunk);
    }

    let accepted = accepted_files(vec![DroppedFile {
        name,
        content_type,
        bytes,
    }]);
    if accepted.is_empty() {
        return Err(VaultError::NotPdf);
    }

    let workspace = backends.workspace(session.0);
    Ok(match workspace.uploader.on_drop(accepted).await {
        Some(Ok(record)) => reply(StatusCode::CREATED, record, &workspace.notifier),
        Some(Err(e)) => failure(e, &workspace.notifier),
        None => failure(VaultError::NotPdf, &workspace.notifier),
    })
}

/// GET /api/files/{id}
/// Sends the stored bytes as an attachment under the original filename.
pub async fn download_file(
    session: RequestSession,
    backends: web::Data<Backends>,
    file_id: web::Path<Uuid>,
) -> HttpResponse {
    let (workspace, loaded) = loaded(session, &backends).await;
    if let Err(e) = loaded {
        return failure(e, &workspace.notifier);
    }

    match workspace.listing.download(file_id.into_inner()).await {
        Ok(download) => HttpResponse::Ok()
            .append_header((header::CONTENT_DISPOSITION, attachment(&download.filename)))
            .append_header((header::CONTENT_TYPE, PDF_MIME))
            .body(download.bytes),
        Err(e) => failure(e, &workspace.notifier),
    }
}

/// Quoted ASCII name, plus an RFC 5987 `filename*` when the name is not ASCII.
fn attachment(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    if filename.is_ascii() {
        return format!("attachment; filename=\"{}\"", fallback);
    }

    let encoded = header::ExtendedValue {
        charset: header::Charset::Ext("UTF-8".to_string()),
        language_tag: None,
        value: filename.as_bytes().to_vec(),
    };
    format!("attachment; filename=\"{}\"; filename*={}", fallback, encoded)
}

/// GET /api/files/{id}/preview
/// Returns a signed link valid for one hour.
pub async fn preview_file(
    session: RequestSession,
    backends: web::Data<Backends>,
    file_id: web::Path<Uuid>,
) -> HttpResponse {
    let (workspace, loaded) = loaded(session, &backends).await;
    if let Err(e) = loaded {
        return failure(e, &workspace.notifier);
    }

    match workspace.listing.preview(file_id.into_inner()).await {
        Ok(url) => reply(
            StatusCode::OK,
            serde_json::json!({ "url": url, "expires_in": SIGNED_URL_EXPIRY_SECS }),
            &workspace.notifier,
        ),
        Err(e) => failure(e, &workspace.notifier),
    }
}

/// DELETE /api/files/{id}
/// Deletes the stored bytes and then the metadata row.
pub async fn delete_file(
    session: RequestSession,
    backends: web::Data<Backends>,
    file_id: web::Path<Uuid>,
) -> HttpResponse {
    let (mut workspace, loaded) = loaded(session, &backends).await;
    if let Err(e) = loaded {
        return failure(e, &workspace.notifier);
    }

    let id = file_id.into_inner();
    match workspace.listing.delete(id).await {
        Ok(()) => reply(StatusCode::OK, serde_json::json!({ "deleted": id }), &workspace.notifier),
        Err(e) => failure(e, &workspace.notifier),
    }
}
