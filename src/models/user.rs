// SPDX-License-Identifier: MIT

//! User identity root and per-provider credential blobs.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Publishing/identity platform. Closed enumeration; an unrecognized tag is a
/// caller error, not a server fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Google,
    Facebook,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Google => write!(f, "google"),
            Platform::Facebook => write!(f, "facebook"),
        }
    }
}

impl FromStr for Platform {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Platform::Google),
            "facebook" => Ok(Platform::Facebook),
            other => Err(AppError::BadRequest(format!("unknown platform: {other}"))),
        }
    }
}

/// User profile stored in the credential store, keyed by username.
///
/// `social_credentials` holds at most one blob per provider; a blob is only
/// ever replaced whole, never partially mutated from outside its adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque unique identifier, assigned at creation
    pub id: String,
    /// Unique, 3-50 chars, alphanumeric + underscore
    pub username: String,
    /// Argon2id hash; social-only accounts get a random unusable password
    pub password_hash: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    /// Profile picture URL
    pub avatar: Option<String>,
    #[serde(default)]
    pub social_credentials: HashMap<Platform, SocialCredential>,
    /// When the account was created (ISO 8601)
    pub created_at: String,
}

impl User {
    pub fn credential(&self, platform: Platform) -> Option<&SocialCredential> {
        self.social_credentials.get(&platform)
    }
}

/// Provider-specific credential blob, tagged so only the owning adapter
/// interprets its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", content = "data", rename_all = "lowercase")]
pub enum SocialCredential {
    Google(GoogleCredential),
    Facebook(FacebookCredential),
}

/// Serialized Google OAuth2 credential set, sufficient to reconstruct an
/// authorized client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleCredential {
    pub access_token: String,
    /// Absent if Google did not issue one (it always should, given
    /// `access_type=offline&prompt=consent`)
    pub refresh_token: Option<String>,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    pub scopes: Vec<String>,
}

/// Facebook long-lived user token plus the managed Pages it can publish to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookCredential {
    pub access_token: String,
    /// The provider's numeric identity for this user
    pub facebook_id: String,
    pub pages: Vec<FacebookPage>,
}

impl FacebookCredential {
    /// Look up a managed Page by id.
    pub fn page(&self, page_id: &str) -> Option<&FacebookPage> {
        self.pages.iter().find(|p| p.id == page_id)
    }
}

/// A managed Facebook Page with its own page-scoped access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookPage {
    pub id: String,
    pub name: String,
    pub access_token: String,
}

/// Identity attributes verified against the provider during code exchange.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parse_roundtrip() {
        assert_eq!("google".parse::<Platform>().unwrap(), Platform::Google);
        assert_eq!("facebook".parse::<Platform>().unwrap(), Platform::Facebook);
        assert!("tiktok".parse::<Platform>().is_err());
        assert!("Google".parse::<Platform>().is_err());
    }

    #[test]
    fn credential_blob_is_tagged() {
        let blob = SocialCredential::Google(GoogleCredential {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: "2026-01-01T00:00:00Z".into(),
            scopes: vec!["openid".into()],
        });

        let json = serde_json::to_value(&blob).unwrap();
        assert_eq!(json["provider"], "google");
        assert_eq!(json["data"]["access_token"], "at");
    }

    #[test]
    fn facebook_page_lookup() {
        let cred = FacebookCredential {
            access_token: "token".into(),
            facebook_id: "123".into(),
            pages: vec![FacebookPage {
                id: "p1".into(),
                name: "My Page".into(),
                access_token: "page-token".into(),
            }],
        };

        assert_eq!(cred.page("p1").unwrap().name, "My Page");
        assert!(cred.page("p2").is_none());
    }
}
