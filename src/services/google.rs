// SPDX-License-Identifier: MIT

//! Google OAuth adapter.
//!
//! Handles:
//! - Authorization URL construction (offline access, forced consent)
//! - Code exchange with cryptographic ID-token verification
//! - Silent refresh of expired access tokens

use crate::error::AppError;
use crate::models::{GoogleCredential, Platform, VerifiedIdentity};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Margin before access-token expiration when we proactively refresh.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Fixed scope set requested from Google.
const SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/youtube.upload",
    "https://www.googleapis.com/auth/youtube.readonly",
];

const ALLOWED_ISSUERS: &[&str] = &["https://accounts.google.com", "accounts.google.com"];

#[derive(Clone)]
enum VerifierMode {
    /// Production: RS256 keys discovered from Google's JWKS endpoint and cached.
    Jwks,
    /// Deterministic local/integration tests with a fixed key and algorithm.
    StaticKey {
        kid: String,
        algorithm: Algorithm,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Google OAuth adapter.
pub struct GoogleOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    jwks_url: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    jwks_refresh_lock: Mutex<()>,
}

impl GoogleOAuth {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            http: http_client(),
            client_id,
            client_secret,
            redirect_uri,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            mode: VerifierMode::Jwks,
            jwks_cache: RwLock::new(None),
            jwks_refresh_lock: Mutex::new(()),
        }
    }

    /// Point the adapter at alternate endpoints (for tests against a mock
    /// server).
    pub fn with_endpoints(mut self, token_url: String, jwks_url: String) -> Self {
        self.token_url = token_url;
        self.jwks_url = jwks_url;
        self
    }

    /// Use a fixed key for ID-token verification instead of the JWKS
    /// endpoint. For deterministic tests, which may sign with a symmetric key.
    pub fn with_static_key(
        mut self,
        kid: impl Into<String>,
        algorithm: Algorithm,
        decoding_key: DecodingKey,
    ) -> Self {
        self.mode = VerifierMode::StaticKey {
            kid: kid.into(),
            algorithm,
            decoding_key: Arc::new(decoding_key),
        };
        self
    }

    // ─── Authorization URL ───────────────────────────────────────────────────

    /// Build the consent URL. `access_type=offline` + `prompt=consent` so a
    /// refresh token is always issued.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            state,
        )
    }

    // ─── Code Exchange ───────────────────────────────────────────────────────

    /// Exchange an authorization code for a verified identity and a
    /// credential blob.
    ///
    /// The returned ID token is verified (signature, issuer, audience) before
    /// any of its claims are trusted.
    pub async fn exchange_code(
        &self,
        code: &str,
    ) -> Result<(VerifiedIdentity, GoogleCredential), AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Google token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Google code exchange rejected");

            if status.is_client_error() {
                return Err(AppError::BadRequest(
                    "Invalid Google authorization code".to_string(),
                ));
            }
            return Err(AppError::Upstream(format!(
                "Google token endpoint returned {}",
                status
            )));
        }

        let tokens: CodeExchangeResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid Google token response: {}", e)))?;

        let claims = self.verify_id_token(&tokens.id_token).await?;

        let identity = VerifiedIdentity {
            email: claims.email,
            name: claims.name,
            avatar: claims.picture,
        };

        let expires_at = Utc::now() + ChronoDuration::seconds(tokens.expires_in);
        let scopes = tokens
            .scope
            .as_deref()
            .map(|s| s.split(' ').map(str::to_string).collect())
            .unwrap_or_else(|| SCOPES.iter().map(|s| s.to_string()).collect());

        let credential = GoogleCredential {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: expires_at.to_rfc3339(),
            scopes,
        };

        tracing::info!(
            has_refresh_token = credential.refresh_token.is_some(),
            "Google code exchange complete"
        );

        Ok((identity, credential))
    }

    // ─── Validate / Refresh ──────────────────────────────────────────────────

    /// Return a credential with a currently valid access token, refreshing it
    /// when expired.
    ///
    /// The second element is true when the blob changed and must be persisted
    /// by the caller before the dependent API call proceeds.
    pub async fn validate_or_refresh(
        &self,
        credential: &GoogleCredential,
    ) -> Result<(GoogleCredential, bool), AppError> {
        let expires_at = DateTime::parse_from_rfc3339(&credential.expires_at)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse expiry: {}", e)))?
            .with_timezone(&Utc);

        let margin = ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        if Utc::now() + margin < expires_at {
            return Ok((credential.clone(), false));
        }

        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            // Nothing to refresh with; only a fresh OAuth round-trip helps.
            return Err(AppError::ReAuthenticationRequired(Platform::Google));
        };

        tracing::info!("Google access token expired, refreshing");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Google token refresh failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            // Revoked or invalid refresh token: the stored credential is dead.
            if status.is_client_error() && body.contains("invalid_grant") {
                tracing::warn!("Google refresh token revoked or invalid");
                return Err(AppError::ReAuthenticationRequired(Platform::Google));
            }

            return Err(AppError::Upstream(format!(
                "Google refresh endpoint returned {}: {}",
                status, body
            )));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid Google refresh response: {}", e)))?;

        let expires_at = Utc::now() + ChronoDuration::seconds(refreshed.expires_in);

        let updated = GoogleCredential {
            access_token: refreshed.access_token,
            // Google only re-sends the refresh token on the original consent.
            refresh_token: refreshed
                .refresh_token
                .or_else(|| credential.refresh_token.clone()),
            expires_at: expires_at.to_rfc3339(),
            scopes: credential.scopes.clone(),
        };

        tracing::info!("Google access token refreshed");
        Ok((updated, true))
    }

    // ─── ID Token Verification ───────────────────────────────────────────────

    /// Verify an ID token's signature, issuer, and audience.
    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdTokenClaims, AppError> {
        let header = decode_header(id_token)
            .map_err(|e| AppError::BadRequest(format!("Invalid Google ID token header: {e}")))?;

        let expected_alg = match &self.mode {
            VerifierMode::Jwks => Algorithm::RS256,
            VerifierMode::StaticKey { algorithm, .. } => *algorithm,
        };

        if header.alg != expected_alg {
            return Err(AppError::BadRequest(format!(
                "Unexpected Google ID token alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AppError::BadRequest("Missing Google ID token kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(expected_alg);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(ALLOWED_ISSUERS);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<GoogleIdTokenClaims>(id_token, decoding_key.as_ref(), &validation)
            .map_err(|e| AppError::BadRequest(format!("Google ID token validation failed: {e}")))?;

        let claims = token_data.claims;

        // An unexpected issuer is rejected regardless of signature validity.
        if !ALLOWED_ISSUERS.contains(&claims.iss.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Unexpected Google ID token issuer: {}",
                claims.iss
            )));
        }

        Ok(claims)
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AppError> {
        if let VerifierMode::StaticKey {
            kid: static_kid,
            decoding_key,
            ..
        } = &self.mode
        {
            if kid == static_kid {
                return Ok(decoding_key.clone());
            }
            return Err(AppError::BadRequest(format!(
                "Unknown ID token kid for static verifier: {kid}"
            )));
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(AppError::BadRequest(format!(
            "ID token kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), AppError> {
        let _guard = self.jwks_refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_url = %self.jwks_url, "Refreshing Google JWKS cache");

        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_JWKS_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid JWKS JSON: {e}")))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
                continue;
            }

            if let Some(alg) = &jwk.alg {
                if alg != "RS256" {
                    continue;
                }
            }

            if let Some(use_) = &jwk.use_ {
                if use_ != "sig" {
                    continue;
                }
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(AppError::Upstream(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let entry = JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        };

        *self.jwks_cache.write().await = Some(entry);

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(())
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    id_token: String,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

/// Claims from a verified Google ID token.
#[derive(Debug, Deserialize)]
pub struct GoogleIdTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub exp: usize,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    let Some(max_age) = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
    else {
        return fallback;
    };

    Duration::from_secs(max_age)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn authorization_url_requests_offline_access() {
        let google = GoogleOAuth::new(
            "client-id".into(),
            "secret".into(),
            "http://localhost:8080/auth/google/callback".into(),
        );

        let url = google.authorization_url("signed-state");
        assert!(url.starts_with(AUTH_URL));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("youtube.upload"));
        assert!(url.contains("state=signed-state"));
    }

    #[tokio::test]
    async fn fresh_credential_is_not_refreshed() {
        let google = GoogleOAuth::new("id".into(), "secret".into(), "uri".into());

        let credential = GoogleCredential {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: (Utc::now() + ChronoDuration::hours(1)).to_rfc3339(),
            scopes: vec![],
        };

        let (updated, refreshed) = google.validate_or_refresh(&credential).await.unwrap();
        assert!(!refreshed);
        assert_eq!(updated.access_token, "at");
    }

    const ID_TOKEN_SECRET: &[u8] = b"id-token-signing-secret";

    fn mocked_google(token_url: String) -> GoogleOAuth {
        GoogleOAuth::new(
            "client-id".into(),
            "secret".into(),
            "http://localhost:8080/auth/google/callback".into(),
        )
        .with_endpoints(token_url, "http://127.0.0.1:1/jwks".into())
        .with_static_key(
            "test-kid",
            Algorithm::HS256,
            DecodingKey::from_secret(ID_TOKEN_SECRET),
        )
    }

    /// Sign an ID token with the key the static verifier trusts.
    fn make_id_token(iss: &str) -> String {
        let mut header = jsonwebtoken::Header::new(Algorithm::HS256);
        header.kid = Some("test-kid".to_string());

        let claims = serde_json::json!({
            "iss": iss,
            "aud": "client-id",
            "sub": "google-user-1",
            "exp": (Utc::now() + ChronoDuration::hours(1)).timestamp(),
            "email": "alice@example.com",
            "email_verified": true,
            "name": "Alice Example",
            "picture": "https://example.com/alice.png",
        });

        jsonwebtoken::encode(
            &header,
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(ID_TOKEN_SECRET),
        )
        .unwrap()
    }

    fn token_endpoint_body(id_token: &str) -> String {
        serde_json::json!({
            "access_token": "ya29.fresh",
            "refresh_token": "1//refresh",
            "expires_in": 3600,
            "id_token": id_token,
            "scope": "openid email",
            "token_type": "Bearer",
        })
        .to_string()
    }

    #[tokio::test]
    async fn exchange_code_verifies_id_token_and_builds_credential() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_endpoint_body(&make_id_token("https://accounts.google.com")))
            .create_async()
            .await;

        let google = mocked_google(format!("{}/token", server.url()));
        let (identity, credential) = google.exchange_code("auth-code").await.unwrap();

        assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
        assert_eq!(identity.name.as_deref(), Some("Alice Example"));
        assert_eq!(credential.access_token, "ya29.fresh");
        assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(credential.scopes, vec!["openid", "email"]);
    }

    #[tokio::test]
    async fn exchange_code_rejects_wrong_issuer_despite_valid_signature() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(token_endpoint_body(&make_id_token("https://idp.example.net")))
            .create_async()
            .await;

        let google = mocked_google(format!("{}/token", server.url()));
        let err = google.exchange_code("auth-code").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn refresh_invalid_grant_requires_reauthentication() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"Token has been revoked."}"#)
            .create_async()
            .await;

        let google = GoogleOAuth::new("client-id".into(), "secret".into(), "uri".into())
            .with_endpoints(format!("{}/token", server.url()), "http://127.0.0.1:1/jwks".into());

        let credential = GoogleCredential {
            access_token: "ya29.stale".into(),
            refresh_token: Some("1//revoked".into()),
            expires_at: (Utc::now() - ChronoDuration::hours(1)).to_rfc3339(),
            scopes: vec![],
        };

        let err = google.validate_or_refresh(&credential).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::ReAuthenticationRequired(Platform::Google)
        ));
    }

    #[tokio::test]
    async fn expired_credential_without_refresh_token_needs_reauth() {
        let google = GoogleOAuth::new("id".into(), "secret".into(), "uri".into());

        let credential = GoogleCredential {
            access_token: "at".into(),
            refresh_token: None,
            expires_at: (Utc::now() - ChronoDuration::hours(1)).to_rfc3339(),
            scopes: vec![],
        };

        let err = google.validate_or_refresh(&credential).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::ReAuthenticationRequired(Platform::Google)
        ));
    }
}
