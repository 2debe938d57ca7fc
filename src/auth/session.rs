use std::future::{Ready, ready};
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use async_trait::async_trait;
use log::{debug, error, info};
use serde::Serialize;
use tokio::sync::watch;

use super::jwt::{JwtSession, token_from_request};
use crate::error::{VaultError, VaultResult};
use crate::models::SessionUser;

/// Identity provider client.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn current_user(&self) -> VaultResult<Option<SessionUser>>;

    async fn sign_out(&self) -> VaultResult<()>;
}

/// Session client over the token presented with one request.
pub struct JwtSessionClient {
    session: JwtSession,
    token: Option<String>,
}

impl JwtSessionClient {
    pub fn new(session: JwtSession, token: Option<String>) -> Self {
        Self { session, token }
    }
}

#[async_trait]
impl SessionClient for JwtSessionClient {
    async fn current_user(&self) -> VaultResult<Option<SessionUser>> {
        let Some(token) = self.token.as_deref() else {
            return Ok(None);
        };

        match self.session.verify(token) {
            Ok(claims) => Ok(Some(claims.user())),
            Err(e) => {
                debug!("Ignoring session token: {}", e);
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> VaultResult<()> {
        if let Some(token) = self.token.as_deref() {
            if let Ok(claims) = self.session.verify(token) {
                self.session.revoke(&claims);
                info!("Revoked session token for user {}", claims.sub);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    SignedOut,
    SignedIn(SessionUser),
    Failed(String),
}

/// Single source of truth for the current identity. Every consumer reads the
/// same instance and observes changes through [`SessionSubscription`].
pub struct SessionProvider {
    client: Arc<dyn SessionClient>,
    state: watch::Sender<SessionState>,
}

impl SessionProvider {
    pub fn new(client: Arc<dyn SessionClient>) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self { client, state }
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Fetches the identity from the client. Errors end in `Failed`, so the
    /// state never stays `Loading` after this returns.
    pub async fn load(&self) -> SessionState {
        let next = match self.client.current_user().await {
            Ok(Some(user)) => SessionState::SignedIn(user),
            Ok(None) => SessionState::SignedOut,
            Err(e) => {
                error!("Failed to fetch current user: {}", e);
                SessionState::Failed(e.to_string())
            }
        };
        self.state.send_replace(next.clone());
        next
    }

    /// Cached user, loading first if nothing has been fetched yet.
    pub async fn resolve_user(&self) -> VaultResult<Option<SessionUser>> {
        let state = match self.current() {
            SessionState::Loading => self.load().await,
            state => state,
        };

        match state {
            SessionState::SignedIn(user) => Ok(Some(user)),
            SessionState::SignedOut | SessionState::Loading => Ok(None),
            SessionState::Failed(message) => Err(VaultError::Session(message)),
        }
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            receiver: self.state.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.receiver_count()
    }

    /// Pushes a new identity to every subscriber.
    pub fn publish(&self, user: Option<SessionUser>) {
        let next = match user {
            Some(user) => SessionState::SignedIn(user),
            None => SessionState::SignedOut,
        };
        self.state.send_replace(next);
    }

    /// Signs out through the client; subscribers see `SignedOut` once it succeeds.
    pub async fn sign_out(&self) -> VaultResult<()> {
        self.client.sign_out().await?;
        info!("Session signed out");
        self.publish(None);
        Ok(())
    }
}

/// Live view of session changes. Dropping it unsubscribes.
pub struct SessionSubscription {
    receiver: watch::Receiver<SessionState>,
}

impl SessionSubscription {
    /// Waits for the next change. `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Treats the current state as already observed.
    pub fn mark_seen(&mut self) {
        self.receiver.borrow_and_update();
    }
}

/// Per-request session provider built from the presented token.
pub struct RequestSession(pub Arc<SessionProvider>);

impl FromRequest for RequestSession {
    type Error = VaultError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = req
            .app_data::<web::Data<JwtSession>>()
            .map(|session| {
                let client = JwtSessionClient::new(session.get_ref().clone(), token_from_request(req));
                RequestSession(Arc::new(SessionProvider::new(Arc::new(client))))
            })
            .ok_or_else(|| VaultError::Internal("session keys are not configured".into()));
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticSession;

    fn ada() -> SessionUser {
        SessionUser {
            id: "1".into(),
            email: None,
        }
    }

    #[tokio::test]
    async fn load_resolves_signed_in_user() {
        let provider = SessionProvider::new(Arc::new(StaticSession::signed_in(ada())));
        assert_eq!(provider.current(), SessionState::Loading);
        assert_eq!(provider.load().await, SessionState::SignedIn(ada()));
        assert_eq!(provider.resolve_user().await.unwrap(), Some(ada()));
    }

    #[tokio::test]
    async fn client_failure_leaves_loading_for_failed() {
        let provider = SessionProvider::new(Arc::new(StaticSession::failing()));
        assert!(matches!(provider.load().await, SessionState::Failed(_)));
        assert!(matches!(
            provider.resolve_user().await,
            Err(VaultError::Session(_))
        ));
    }

    #[tokio::test]
    async fn resolve_user_reuses_cached_state() {
        let client = Arc::new(StaticSession::signed_in(ada()));
        let provider = SessionProvider::new(client.clone());
        provider.resolve_user().await.unwrap();
        provider.resolve_user().await.unwrap();
        assert_eq!(client.fetches(), 1);
    }

    #[tokio::test]
    async fn sign_out_notifies_subscribers() {
        let client = Arc::new(StaticSession::signed_in(ada()));
        let provider = SessionProvider::new(client.clone());
        provider.load().await;

        let mut subscription = provider.subscribe();
        provider.sign_out().await.unwrap();

        assert_eq!(subscription.changed().await, Some(SessionState::SignedOut));
        assert_eq!(client.sign_outs(), 1);
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let provider = SessionProvider::new(Arc::new(StaticSession::signed_out()));
        let first = provider.subscribe();
        let second = provider.subscribe();
        assert_eq!(provider.subscriber_count(), 2);
        drop(first);
        drop(second);
        assert_eq!(provider.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn jwt_client_treats_revoked_token_as_signed_out() {
        let session = JwtSession::new("secret", 1);
        let token = session.create_jwt(&ada()).unwrap();
        let client = JwtSessionClient::new(session.clone(), Some(token));

        assert_eq!(client.current_user().await.unwrap(), Some(ada()));
        client.sign_out().await.unwrap();
        assert_eq!(client.current_user().await.unwrap(), None);
    }
}
