//! Auth0 (standard OIDC provider)

use std::sync::Arc;

use async_trait::async_trait;
use mcpgate_core::ProviderKind;

use super::context::{ClaimMapping, VerifiedClaims};
use super::error::AuthError;
use super::provider::AuthProvider;
use super::verifier::{oidc_validation, JwksVerifier, TokenVerifier};
use crate::oauth::{strings, AuthorizationServerMetadata};

/// Auth0 access tokens carry `scope`; machine clients use `azp` or `client_id`
const CLAIMS: ClaimMapping = ClaimMapping {
    client_id_claims: &["azp", "client_id", "sub"],
    scope_claim: "scope",
    extra_claims: &[],
};

pub struct Auth0Provider {
    domain: String,
    verifier: Arc<dyn TokenVerifier>,
}

impl Auth0Provider {
    pub fn new(domain: &str, audience: &str) -> Self {
        let issuer = format!("https://{}/", domain);
        let verifier = JwksVerifier::new(
            format!("https://{}/.well-known/jwks.json", domain),
            oidc_validation(&issuer, audience),
        );
        Self::with_verifier(domain, Arc::new(verifier))
    }

    pub fn with_verifier(domain: &str, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            domain: domain.to_string(),
            verifier,
        }
    }

    /// Issuer as it appears in Auth0 tokens (trailing slash included)
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain)
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.domain, path)
    }
}

#[async_trait]
impl AuthProvider for Auth0Provider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Auth0
    }

    fn claim_mapping(&self) -> &ClaimMapping {
        &CLAIMS
    }

    async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        self.verifier.verify(token).await
    }

    fn authorization_servers(&self) -> Vec<String> {
        vec![format!("https://{}", self.domain)]
    }

    async fn authorization_server_metadata(&self) -> Result<AuthorizationServerMetadata, AuthError> {
        let mut metadata = AuthorizationServerMetadata::with_defaults(
            self.issuer(),
            self.url("/authorize"),
            self.url("/oauth/token"),
            self.url("/.well-known/jwks.json"),
        );
        // Auth0 supports dynamic client registration and public clients
        metadata.registration_endpoint = Some(self.url("/oidc/register"));
        metadata.token_endpoint_auth_methods_supported =
            strings(&["client_secret_post", "client_secret_basic", "none"]);
        Ok(metadata)
    }
}
