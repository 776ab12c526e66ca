//! Fronted authority (e.g. Keycloak behind an ingress)
//!
//! The gateway reaches the authority on an internal base URL while clients
//! know it by its public issuer URL. Discovery is read once from the internal
//! base and every advertised endpoint is rewritten onto the public base.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mcpgate_core::ProviderKind;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use url::Url;

use super::context::{ClaimMapping, VerifiedClaims};
use super::error::AuthError;
use super::provider::AuthProvider;
use super::verifier::{oidc_validation, JwksVerifier, TokenVerifier};
use crate::oauth::AuthorizationServerMetadata;

const CLAIMS: ClaimMapping = ClaimMapping {
    client_id_claims: &["azp", "client_id", "sub"],
    scope_claim: "scope",
    extra_claims: &[],
};

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ProxiedProvider {
    public_base: String,
    internal_base: String,
    audience: String,
    http_client: reqwest::Client,
    /// Upstream discovery document exactly as the authority served it
    discovery: OnceCell<AuthorizationServerMetadata>,
    verifier: OnceCell<Arc<dyn TokenVerifier>>,
}

impl ProxiedProvider {
    pub fn new(issuer_url: Url, internal_url: Url, audience: &str) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(DISCOVERY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            public_base: trim_base(&issuer_url),
            internal_base: trim_base(&internal_url),
            audience: audience.to_string(),
            http_client,
            discovery: OnceCell::new(),
            verifier: OnceCell::new(),
        }
    }

    /// Provider with a fixed verifier; discovery is still fetched upstream
    pub fn with_verifier(
        issuer_url: Url,
        internal_url: Url,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        let mut provider = Self::new(issuer_url, internal_url, "");
        provider.verifier = OnceCell::from(verifier);
        provider
    }

    pub fn issuer(&self) -> &str {
        &self.public_base
    }

    fn discovery_url(&self) -> String {
        format!("{}{}", self.internal_base, DISCOVERY_PATH)
    }

    async fn discovery(&self) -> Result<&AuthorizationServerMetadata, AuthError> {
        self.discovery
            .get_or_try_init(|| async {
                let url = self.discovery_url();
                info!("[Auth] Fetching authority discovery from {}", url);

                let response = self
                    .http_client
                    .get(&url)
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .map_err(|e| {
                        warn!("[Auth] Discovery request failed: {}", e);
                        AuthError::Upstream(format!("Discovery request failed: {}", e))
                    })?;

                if !response.status().is_success() {
                    warn!("[Auth] Discovery returned HTTP {}", response.status());
                    return Err(AuthError::Upstream(format!(
                        "Discovery request failed: HTTP {}",
                        response.status()
                    )));
                }

                response
                    .json::<AuthorizationServerMetadata>()
                    .await
                    .map_err(|e| AuthError::Upstream(format!("Invalid discovery document: {}", e)))
            })
            .await
    }

    async fn verifier(&self) -> Result<&Arc<dyn TokenVerifier>, AuthError> {
        self.verifier
            .get_or_try_init(|| async {
                let discovery = self.discovery().await?;
                let jwks_uri = discovery.jwks_uri.as_deref().ok_or_else(|| {
                    AuthError::Upstream("Discovery document has no jwks_uri".to_string())
                })?;
                // The gateway must fetch keys over the internal route
                let jwks_uri = rebase(jwks_uri, &self.public_base, &self.internal_base);

                let public_with_slash = format!("{}/", self.public_base);
                let mut validation = oidc_validation(&self.public_base, &self.audience);
                validation.set_issuer(&[self.public_base.as_str(), public_with_slash.as_str()]);

                let verifier: Arc<dyn TokenVerifier> = Arc::new(JwksVerifier::with_client(
                    jwks_uri,
                    validation,
                    self.http_client.clone(),
                ));
                Ok(verifier)
            })
            .await
    }

    /// Upstream document with every internal URL moved onto the public base
    fn publish(&self, upstream: &AuthorizationServerMetadata) -> AuthorizationServerMetadata {
        let public = |url: &str| rebase(url, &self.internal_base, &self.public_base);

        let mut metadata = AuthorizationServerMetadata::with_defaults(
            public(&upstream.issuer),
            public(&upstream.authorization_endpoint),
            public(&upstream.token_endpoint),
            "",
        );
        metadata.jwks_uri = upstream.jwks_uri.as_deref().map(public);
        metadata.registration_endpoint = upstream.registration_endpoint.as_deref().map(public);
        // The authority's own capability lists win; defaults only fill gaps
        let advertised = |list: &Vec<String>, fallback: &mut Vec<String>| {
            if !list.is_empty() {
                *fallback = list.clone();
            }
        };
        advertised(
            &upstream.response_types_supported,
            &mut metadata.response_types_supported,
        );
        advertised(
            &upstream.grant_types_supported,
            &mut metadata.grant_types_supported,
        );
        advertised(
            &upstream.token_endpoint_auth_methods_supported,
            &mut metadata.token_endpoint_auth_methods_supported,
        );
        advertised(
            &upstream.code_challenge_methods_supported,
            &mut metadata.code_challenge_methods_supported,
        );
        advertised(&upstream.scopes_supported, &mut metadata.scopes_supported);
        metadata
    }
}

fn trim_base(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

/// Swap the `from` prefix of `url` for `to`; other URLs pass through
fn rebase(url: &str, from: &str, to: &str) -> String {
    match url.strip_prefix(from) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => {
            format!("{}{}", to, rest)
        }
        _ => url.to_string(),
    }
}

#[async_trait]
impl AuthProvider for ProxiedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Proxied
    }

    fn claim_mapping(&self) -> &ClaimMapping {
        &CLAIMS
    }

    async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        self.verifier().await?.verify(token).await
    }

    fn authorization_servers(&self) -> Vec<String> {
        vec![self.public_base.clone()]
    }

    async fn authorization_server_metadata(&self) -> Result<AuthorizationServerMetadata, AuthError> {
        let upstream = self.discovery().await?;
        Ok(self.publish(upstream))
    }
}
