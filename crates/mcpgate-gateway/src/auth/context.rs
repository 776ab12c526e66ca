//! Canonical authorization context
//!
//! Every identity provider hands out differently shaped claims. This module
//! owns the provider-independent [`AuthContext`] and the pure mapping from
//! verified claims into it.

use std::fmt;

use serde_json::{Map, Value};

/// Claims that passed signature, issuer, audience and expiry checks.
///
/// Only a [`TokenVerifier`](super::TokenVerifier) can construct this type, so an
/// [`AuthContext`] can never be built from unverified input.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims(Map<String, Value>);

impl VerifiedClaims {
    pub(crate) fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String claim, treating empty strings as absent
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// How a provider names the claims the gateway cares about
#[derive(Debug, Clone, Copy)]
pub struct ClaimMapping {
    /// Candidate client id claims, highest priority first
    pub client_id_claims: &'static [&'static str],
    /// Claim holding the space-delimited scope list
    pub scope_claim: &'static str,
    /// Provider claims copied into `extra` next to `sub`
    pub extra_claims: &'static [&'static str],
}

/// Authenticated caller, independent of the identity provider that issued the token
#[derive(Clone, PartialEq)]
pub struct AuthContext {
    token: String,
    client_id: String,
    scopes: Vec<String>,
    expires_at: Option<i64>,
    extra: Map<String, Value>,
}

impl AuthContext {
    /// Raw bearer token. Never log this.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Subject identifier, if the provider issued one
    pub fn subject(&self) -> Option<&str> {
        self.extra.get("sub").and_then(Value::as_str)
    }

    /// Short client id for logging (first 12 chars or "anon")
    pub fn short_client(&self) -> &str {
        if self.client_id.is_empty() {
            return "anon";
        }
        let end = self
            .client_id
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.client_id.len());
        &self.client_id[..end]
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Map verified claims onto an [`AuthContext`].
///
/// Pure and total: missing or mistyped claims degrade to empty values.
pub fn normalize_claims(mapping: &ClaimMapping, token: &str, claims: &VerifiedClaims) -> AuthContext {
    let client_id = mapping
        .client_id_claims
        .iter()
        .find_map(|name| claims.get_str(name))
        .unwrap_or_default()
        .to_string();

    let scopes = claims
        .get(mapping.scope_claim)
        .and_then(Value::as_str)
        .map(|s| s.split_whitespace().map(String::from).collect())
        .unwrap_or_default();

    let expires_at = claims
        .get("exp")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));

    let mut extra = Map::new();
    for name in std::iter::once(&"sub").chain(mapping.extra_claims.iter()) {
        if let Some(value) = claims.get(name) {
            extra.insert((*name).to_string(), value.clone());
        }
    }
    extra.insert("claims".to_string(), Value::Object(claims.as_map().clone()));

    AuthContext {
        token: token.to_string(),
        client_id,
        scopes,
        expires_at,
        extra,
    }
}
