// SPDX-License-Identifier: MIT

//! Local session authority: issues and verifies the service's own
//! access/refresh token pairs.
//!
//! Tokens are HS256 JWTs over a shared secret. Verification is pure: any
//! structural, signature, type-tag, or expiry failure collapses into the
//! single `Unauthorized` outcome so callers cannot learn which check failed.

use crate::error::AppError;
use crate::models::User;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Which of the two token flavors a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Subject (username)
    pub sub: String,
    /// User id
    pub uid: String,
    /// Token id, unique per issued token
    pub jti: String,
    /// Type tag distinguishing access from refresh tokens
    pub token_use: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Issues and verifies session tokens. Pure functions over configuration.
#[derive(Clone)]
pub struct SessionAuthority {
    secret: Vec<u8>,
    access_ttl_minutes: i64,
    refresh_ttl_days: i64,
}

impl SessionAuthority {
    pub fn new(secret: Vec<u8>, access_ttl_minutes: i64, refresh_ttl_days: i64) -> Self {
        Self {
            secret,
            access_ttl_minutes,
            refresh_ttl_days,
        }
    }

    /// Access token lifetime in seconds (for `expires_in` responses).
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_minutes * 60
    }

    /// Refresh token lifetime in seconds (for cookie Max-Age).
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_days * 24 * 60 * 60
    }

    /// Issue a short-lived access token for a user.
    pub fn issue_access_token(&self, user: &User) -> Result<String, AppError> {
        self.issue(user, TokenKind::Access, self.access_ttl_secs())
    }

    /// Issue a longer-lived refresh token for a user.
    pub fn issue_refresh_token(&self, user: &User) -> Result<String, AppError> {
        self.issue(user, TokenKind::Refresh, self.refresh_ttl_secs())
    }

    fn issue(&self, user: &User, kind: TokenKind, ttl_secs: i64) -> Result<String, AppError> {
        let now = now_unix_secs();

        let claims = SessionClaims {
            sub: user.username.clone(),
            uid: user.id.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            token_use: kind,
            iat: now,
            exp: (now as i64 + ttl_secs).max(0) as usize,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Token encoding failed: {}", e)))
    }

    /// Verify a token of the expected kind and return its claims.
    ///
    /// Expiry is checked against the decoded claims in addition to the
    /// library validation, so a stale token is rejected even if the library's
    /// leeway would let it pass.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<SessionClaims, AppError> {
        let key = DecodingKey::from_secret(&self.secret);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<SessionClaims>(token, &key, &validation)
            .map_err(|_| AppError::Unauthorized)?;

        let claims = token_data.claims;

        if claims.token_use != expected {
            return Err(AppError::Unauthorized);
        }

        if claims.exp < now_unix_secs() {
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }
}

fn now_unix_secs() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize
}
