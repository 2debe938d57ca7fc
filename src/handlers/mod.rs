use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use serde::Serialize;

use crate::auth::google;
use crate::error::VaultError;
use crate::workspace::Notifier;

pub mod files;
pub mod session;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(session::gate))
        .service(
            web::scope("/api/files")
                .route("", web::get().to(files::list_files))
                .route("", web::post().to(files::upload_file))
                .route("/{id}", web::get().to(files::download_file))
                .route("/{id}", web::delete().to(files::delete_file))
                .route("/{id}/preview", web::get().to(files::preview_file)),
        )
        .service(
            web::scope("/auth")
                .route("/google", web::get().to(google::google_auth))
                .route("/google/callback", web::get().to(google::google_callback))
                .route("/sign-out", web::post().to(session::sign_out)),
        );
}

/// Payload plus the notifications raised while producing it.
fn reply<T: Serialize>(status: StatusCode, data: T, notifier: &Notifier) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({
        "data": data,
        "notifications": notifier.drain(),
    }))
}

fn failure(err: VaultError, notifier: &Notifier) -> HttpResponse {
    let status = err.status_code();
    if status.is_server_error() {
        log::error!("{}", err);
    }
    HttpResponse::build(status).json(serde_json::json!({
        "error": err.to_string(),
        "notifications": notifier.drain(),
    }))
}
