//! Bearer token verification
//!
//! Signature, issuer, audience and expiry checks are delegated to
//! `jsonwebtoken`. The [`TokenVerifier`] seam lets each identity provider plug
//! in a JWKS-backed verifier while tests use a fixed key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::context::VerifiedClaims;
use super::error::AuthError;

/// JWKS documents are cached for one hour
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Minimum spacing between JWKS fetches, whatever `kid` callers present
const JWKS_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Clock skew tolerance for `exp` / `nbf`
const LEEWAY_SECONDS: u64 = 60;

/// Turns a bearer token into verified claims or rejects it
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError>;
}

/// Standard validation for an OIDC access token
pub fn oidc_validation(issuer: &str, audience: &str) -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation.leeway = LEEWAY_SECONDS;
    validation
}

fn decode_verified(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<VerifiedClaims, AuthError> {
    let data = decode::<Map<String, Value>>(token, key, validation)?;
    Ok(VerifiedClaims::new(data.claims))
}

/// Decode the payload segment WITHOUT verifying it.
///
/// Only for operator diagnostics after a failed verification.
pub fn decode_unverified_claims(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Verifier with a fixed key (shared secret deployments and tests)
pub struct StaticKeyVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl StaticKeyVerifier {
    pub fn new(key: DecodingKey, validation: Validation) -> Self {
        Self { key, validation }
    }

    /// HS256 shared-secret verifier checking issuer and audience
    pub fn hs256(secret: &[u8], issuer: &str, audience: &str) -> Self {
        let mut validation = oidc_validation(issuer, audience);
        validation.algorithms = vec![Algorithm::HS256];
        Self::new(DecodingKey::from_secret(secret), validation)
    }
}

#[async_trait]
impl TokenVerifier for StaticKeyVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        decode_verified(token, &self.key, &self.validation)
    }
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// RS256 verifier backed by the provider's JWKS endpoint
pub struct JwksVerifier {
    jwks_uri: String,
    validation: Validation,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
    /// Held while fetching; stores when the last fetch was attempted
    last_refresh: Mutex<Option<Instant>>,
}

impl JwksVerifier {
    pub fn new(jwks_uri: impl Into<String>, validation: Validation) -> Self {
        Self::with_client(jwks_uri, validation, reqwest::Client::new())
    }

    pub fn with_client(
        jwks_uri: impl Into<String>,
        validation: Validation,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            validation,
            http_client,
            cache: RwLock::new(None),
            last_refresh: Mutex::new(None),
        }
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    fn cached_key(&self, kid: &str) -> Option<Result<DecodingKey, AuthError>> {
        let cache = self.cache.read();
        let entry = cache.as_ref()?;
        if entry.fetched_at.elapsed() > JWKS_CACHE_TTL {
            return None;
        }
        let jwk = entry.jwks.find(kid)?;
        Some(DecodingKey::from_jwk(jwk).map_err(AuthError::from))
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        debug!("[Auth] Fetching JWKS from {}", self.jwks_uri);
        let response = self
            .http_client
            .get(&self.jwks_uri)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthError::Upstream(format!("JWKS request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::Upstream(format!(
                "JWKS request failed: HTTP {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::Upstream(format!("Invalid JWKS document: {}", e)))?;

        info!("[Auth] JWKS refreshed ({} keys)", jwks.keys.len());
        *self.cache.write() = Some(CachedJwks {
            jwks,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.cached_key(kid) {
            return key;
        }

        // Unknown kid or stale cache: the provider may have rotated keys.
        // One fetch at a time; waiters reuse its result.
        let mut last_refresh = self.last_refresh.lock().await;
        if let Some(key) = self.cached_key(kid) {
            return key;
        }

        let cache_usable = self
            .cache
            .read()
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() <= JWKS_CACHE_TTL);
        let throttled = last_refresh.is_some_and(|at| at.elapsed() < JWKS_MIN_REFRESH_INTERVAL);

        if throttled {
            if !cache_usable {
                return Err(AuthError::Upstream(
                    "JWKS unavailable, refresh throttled".to_string(),
                ));
            }
            debug!("[Auth] Unknown signing key '{}', JWKS refresh throttled", kid);
            return Err(untrusted_key(kid));
        }

        *last_refresh = Some(Instant::now());
        self.refresh().await?;

        match self.cached_key(kid) {
            Some(key) => key,
            None => {
                warn!("[Auth] Signing key '{}' not present in JWKS", kid);
                Err(untrusted_key(kid))
            }
        }
    }
}

fn untrusted_key(kid: &str) -> AuthError {
    AuthError::invalid_token(format!("Signing key '{}' is not trusted", kid))
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::invalid_token("Token header has no key id"))?;
        let key = self.decoding_key(&kid).await?;
        decode_verified(token, &key, &self.validation)
    }
}
