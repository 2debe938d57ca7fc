use actix_web::cookie::Cookie;
use actix_web::{HttpResponse, web};
use chrono::Local;

use crate::auth::RequestSession;
use crate::config::{AUTH_COOKIE, SIGN_IN_PATH};
use crate::error::VaultResult;
use crate::workspace::{AuthGate, Backends, GateView};

/// GET /
/// Sign-in view without a session, otherwise the workspace with its files.
pub async fn gate(session: RequestSession, backends: web::Data<Backends>) -> HttpResponse {
    let provider = session.0;
    let gate = AuthGate::mount(provider.clone(), SIGN_IN_PATH).await;

    match gate.view() {
        GateView::Workspace { .. } => {
            let mut workspace = backends.workspace(provider);
            let _ = workspace.listing.load().await;
            HttpResponse::Ok().json(serde_json::json!({
                "gate": gate.view(),
                "files": workspace.listing.rows(&Local),
                "notifications": workspace.notifier.drain(),
            }))
        }
        view => HttpResponse::Ok().json(serde_json::json!({ "gate": view })),
    }
}

/// POST /auth/sign-out
/// Revokes the presented token and clears the session cookie.
pub async fn sign_out(session: RequestSession) -> VaultResult<HttpResponse> {
    let mut gate = AuthGate::mount(session.0, SIGN_IN_PATH).await;
    gate.sign_out().await?;

    let view = gate.changed().await.cloned().unwrap_or(GateView::SignIn {
        sign_in_url: SIGN_IN_PATH.to_string(),
    });

    let mut cookie = Cookie::build(AUTH_COOKIE, "").path("/").finish();
    cookie.make_removal();

    Ok(HttpResponse::Ok().cookie(cookie).json(serde_json::json!({ "gate": view })))
}
