use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{HttpRequest, HttpResponse, web};
use log::{error, info};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl, basic::BasicClient, reqwest::async_http_client,
};
use serde::Deserialize;

use crate::auth::JwtSession;
use crate::config::{AUTH_COOKIE, ConfigError, GoogleConfig};
use crate::database::DbPool;
use crate::error::{VaultError, VaultResult};
use crate::models::{NewUser, SessionUser};
use crate::repositories::users::find_or_create_user;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Cookie carrying the `state` sent to Google, checked on the callback.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

/// Subset of Google's OpenID userinfo response.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

pub struct GoogleOAuthClient {
    pub client: BasicClient,
}

impl GoogleOAuthClient {
    pub fn new(config: &GoogleConfig) -> Result<Self, ConfigError> {
        let invalid = |name: &'static str, value: &str| ConfigError::Invalid {
            name,
            value: value.to_string(),
        };

        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())
                .map_err(|_| invalid("AUTH_URL", GOOGLE_AUTH_URL))?,
            Some(
                TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
                    .map_err(|_| invalid("TOKEN_URL", GOOGLE_TOKEN_URL))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_uri.clone())
                .map_err(|_| invalid("REDIRECT_URI", &config.redirect_uri))?,
        );

        Ok(GoogleOAuthClient { client })
    }
}

/// GET /auth/google
/// Redirects the user to Google's OAuth 2.0 authorization endpoint.
pub async fn google_auth(oauth_client: web::Data<GoogleOAuthClient>) -> HttpResponse {
    let (auth_url, csrf_token) = oauth_client
        .client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .url();

    info!("Redirecting to Google OAuth URL: {}", auth_url);

    HttpResponse::Found()
        .append_header(("Location", auth_url.to_string()))
        .cookie(state_cookie(csrf_token.secret().clone()))
        .finish()
}

/// GET /auth/google/callback
/// Exchanges the authorization code, registers the user on first sign-in and
/// starts a session cookie.
pub async fn google_callback(
    req: HttpRequest,
    query: web::Query<OAuthCallbackQuery>,
    oauth_client: web::Data<GoogleOAuthClient>,
    db_pool: web::Data<DbPool>,
    session: web::Data<JwtSession>,
) -> VaultResult<HttpResponse> {
    verify_state(&req, query.state.as_deref())?;

    let auth_code = match (&query.code, &query.error) {
        (Some(code), None) => code.clone(),
        (None, Some(err)) => {
            error!("OAuth error received: {}", err);
            return Ok(redirect_with_error(err));
        }
        _ => {
            error!("Invalid OAuth callback request");
            return Ok(redirect_with_error("invalid_request"));
        }
    };

    let token_response = oauth_client
        .client
        .exchange_code(AuthorizationCode::new(auth_code))
        .request_async(async_http_client)
        .await
        .map_err(|e| {
            error!("Token exchange failed: {:?}", e);
            VaultError::Session("token exchange failed".into())
        })?;

    let user_info: GoogleUserInfo = reqwest::Client::new()
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token_response.access_token().secret())
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            error!("Failed to fetch user info: {:?}", e);
            VaultError::Session("failed to fetch user info".into())
        })?
        .json()
        .await
        .map_err(|e| {
            error!("Failed to parse user info: {:?}", e);
            VaultError::Session("failed to parse user info".into())
        })?;

    let new_user = NewUser {
        oauth_provider: "google".to_string(),
        oauth_user_id: user_info.sub,
        email: user_info.email,
        username: user_info.name,
        avatar_url: user_info.picture,
    };

    let pool = db_pool.into_inner();
    let (user, created) = web::block(move || find_or_create_user(&pool, &new_user)).await??;
    if created {
        info!("Registered new user id={}", user.id);
    }

    let jwt = session.create_jwt(&SessionUser::from(&user))?;
    info!("Session started for user_id={}", user.id);

    Ok(HttpResponse::Found()
        .append_header(("Location", "/"))
        .cookie(session_cookie(jwt))
        .cookie(expired_state_cookie())
        .finish())
}

/// Rejects callbacks whose `state` does not match the one this browser was sent with.
fn verify_state(req: &HttpRequest, state: Option<&str>) -> VaultResult<()> {
    let expected = req.cookie(OAUTH_STATE_COOKIE);
    match (expected, state) {
        (Some(cookie), Some(state)) if !state.is_empty() && cookie.value() == state => Ok(()),
        _ => {
            error!("OAuth callback state mismatch");
            Err(VaultError::Unauthorized("oauth state mismatch".into()))
        }
    }
}

fn state_cookie(state: String) -> Cookie<'static> {
    Cookie::build(OAUTH_STATE_COOKIE, state)
        .http_only(true)
        .secure(false)
        .path("/auth")
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::minutes(OAUTH_STATE_TTL_MINUTES))
        .finish()
}

fn expired_state_cookie() -> Cookie<'static> {
    let mut cookie = state_cookie(String::new());
    cookie.make_removal();
    cookie
}

fn session_cookie(jwt: String) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, jwt)
        .http_only(true)
        .secure(false) // should be true in production with HTTPS
        .path("/")
        .same_site(SameSite::Lax)
        .finish()
}

fn redirect_with_error(err: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", format!("/?auth_error={}", err)))
        .finish()
}
