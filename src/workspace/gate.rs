use std::sync::Arc;

use serde::Serialize;

use crate::auth::{SessionProvider, SessionState, SessionSubscription};
use crate::error::VaultResult;
use crate::models::SessionUser;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum GateView {
    Loading,
    SignIn { sign_in_url: String },
    Workspace { user: SessionUser },
    Error { message: String },
}

/// Chooses between the sign-in form and the workspace for the current session,
/// following session changes for as long as it is alive.
pub struct AuthGate {
    provider: Arc<SessionProvider>,
    subscription: SessionSubscription,
    sign_in_url: String,
    view: GateView,
}

impl AuthGate {
    /// Subscribes, then resolves the initial session. The subscription is
    /// owned by the gate and released when it is dropped.
    pub async fn mount(provider: Arc<SessionProvider>, sign_in_url: impl Into<String>) -> Self {
        let mut subscription = provider.subscribe();
        let sign_in_url = sign_in_url.into();
        let state = provider.load().await;
        subscription.mark_seen();
        let view = view_for(&state, &sign_in_url);

        Self {
            provider,
            subscription,
            sign_in_url,
            view,
        }
    }

    pub fn view(&self) -> &GateView {
        &self.view
    }

    /// Waits for the next session notification and re-renders.
    pub async fn changed(&mut self) -> Option<&GateView> {
        let state = self.subscription.changed().await?;
        self.view = view_for(&state, &self.sign_in_url);
        Some(&self.view)
    }

    /// Signs out. The view flips when the resulting notification is observed.
    pub async fn sign_out(&self) -> VaultResult<()> {
        self.provider.sign_out().await
    }
}

fn view_for(state: &SessionState, sign_in_url: &str) -> GateView {
    match state {
        SessionState::Loading => GateView::Loading,
        SessionState::SignedOut => GateView::SignIn {
            sign_in_url: sign_in_url.to_string(),
        },
        SessionState::SignedIn(user) => GateView::Workspace { user: user.clone() },
        SessionState::Failed(message) => GateView::Error {
            message: message.clone(),
        },
    }
}
