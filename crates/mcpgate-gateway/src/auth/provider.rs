//! Identity provider abstraction
//!
//! One capability set {verify, normalize, describe resource, describe
//! authorization server} with a concrete implementation per provider. The
//! provider is chosen once at startup and shared immutably by every request.

use std::sync::Arc;

use async_trait::async_trait;
use mcpgate_core::{branding, ProviderConfig, ProviderKind};

use super::context::{normalize_claims, AuthContext, ClaimMapping, VerifiedClaims};
use super::error::AuthError;
use super::{Auth0Provider, EntraProvider, ProxiedProvider};
use crate::oauth::{strings, AuthorizationServerMetadata, ProtectedResourceMetadata};

#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Claim names this provider uses for client id, scopes and extras
    fn claim_mapping(&self) -> &ClaimMapping;

    /// Verify signature, issuer, audience and expiry of a bearer token
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError>;

    /// Issuer URLs trusted for this resource
    fn authorization_servers(&self) -> Vec<String>;

    /// RFC 8414 document describing the provider
    async fn authorization_server_metadata(&self) -> Result<AuthorizationServerMetadata, AuthError>;

    fn scopes_supported(&self) -> Vec<String> {
        strings(branding::DEFAULT_SCOPES)
    }

    fn normalize(&self, token: &str, claims: &VerifiedClaims) -> AuthContext {
        normalize_claims(self.claim_mapping(), token, claims)
    }

    /// Verify then normalize
    async fn authenticate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = self.verify(token).await?;
        Ok(self.normalize(token, &claims))
    }

    /// RFC 9728 document for the resource reachable at `origin`
    fn protected_resource_metadata(&self, origin: &str) -> ProtectedResourceMetadata {
        ProtectedResourceMetadata {
            resource: origin.to_string(),
            authorization_servers: self.authorization_servers(),
            bearer_methods_supported: strings(&["header"]),
            scopes_supported: self.scopes_supported(),
        }
    }
}

/// Build the configured provider with its production (JWKS) verifier
pub fn build_provider(config: &ProviderConfig) -> Arc<dyn AuthProvider> {
    match config {
        ProviderConfig::Auth0 { domain, audience } => Arc::new(Auth0Provider::new(domain, audience)),
        ProviderConfig::Entra {
            tenant_id,
            tenant_name,
            client_id,
        } => Arc::new(EntraProvider::new(tenant_id, tenant_name, client_id)),
        ProviderConfig::Proxied {
            issuer_url,
            internal_url,
            audience,
        } => Arc::new(ProxiedProvider::new(
            issuer_url.clone(),
            internal_url.clone(),
            audience,
        )),
    }
}
