use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use actix_web::HttpRequest;
use actix_web::http::header;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AUTH_COOKIE;
use crate::error::{VaultError, VaultResult};
use crate::models::SessionUser;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user(&self) -> SessionUser {
        SessionUser {
            id: self.sub.clone(),
            email: self.email.clone(),
        }
    }
}

/// Token ids signed out before their expiry, with that expiry.
#[derive(Clone, Default)]
pub struct RevokedTokens(Arc<Mutex<HashMap<String, i64>>>);

impl RevokedTokens {
    pub fn revoke(&self, jti: &str, exp: i64) {
        let mut revoked = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now().timestamp();
        revoked.retain(|_, until| *until > now);
        revoked.insert(jti.to_string(), exp);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(jti)
    }
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct JwtSession {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    revoked: RevokedTokens,
}

impl JwtSession {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
            revoked: RevokedTokens::default(),
        }
    }

    pub fn create_jwt(&self, user: &SessionUser) -> VaultResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| VaultError::Session(format!("JWT creation failed: {}", e)))
    }

    pub fn verify(&self, token: &str) -> VaultResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| VaultError::Unauthorized(e.to_string()))?;

        if self.revoked.is_revoked(&data.claims.jti) {
            return Err(VaultError::Unauthorized("token has been signed out".into()));
        }
        Ok(data.claims)
    }

    pub fn revoke(&self, claims: &Claims) {
        self.revoked.revoke(&claims.jti, claims.exp);
    }
}

/// Session token from the `auth_token` cookie, falling back to a bearer header.
pub fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(AUTH_COOKIE) {
        return Some(cookie.value().to_string());
    }

    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}
