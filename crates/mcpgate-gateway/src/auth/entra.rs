//! Microsoft Entra External ID (CIAM)
//!
//! Endpoints are templated from the tenant name and id instead of being
//! fetched from a discovery document. Entra does not offer dynamic client
//! registration, so no registration endpoint is advertised.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::Validation;
use mcpgate_core::ProviderKind;

use super::context::{ClaimMapping, VerifiedClaims};
use super::error::AuthError;
use super::provider::AuthProvider;
use super::verifier::{oidc_validation, JwksVerifier, TokenVerifier};
use crate::oauth::AuthorizationServerMetadata;

/// Entra puts delegated scopes in `scp` and the calling app in `azp`/`appid`
const CLAIMS: ClaimMapping = ClaimMapping {
    client_id_claims: &["azp", "appid", "sub"],
    scope_claim: "scp",
    extra_claims: &["oid"],
};

pub struct EntraProvider {
    tenant_id: String,
    tenant_name: String,
    verifier: Arc<dyn TokenVerifier>,
}

impl EntraProvider {
    pub fn new(tenant_id: &str, tenant_name: &str, client_id: &str) -> Self {
        let base = base_url(tenant_name, tenant_id);
        let verifier = JwksVerifier::new(
            format!("{}/discovery/v2.0/keys", base),
            validation(tenant_id, &format!("{}/v2.0", base), client_id),
        );
        Self::with_verifier(tenant_id, tenant_name, Arc::new(verifier))
    }

    pub fn with_verifier(
        tenant_id: &str,
        tenant_name: &str,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            tenant_name: tenant_name.to_string(),
            verifier,
        }
    }

    fn base(&self) -> String {
        base_url(&self.tenant_name, &self.tenant_id)
    }

    /// CIAM authority, advertised as the issuer
    pub fn authority(&self) -> String {
        format!("{}/v2.0", self.base())
    }

    pub fn jwks_uri(&self) -> String {
        format!("{}/discovery/v2.0/keys", self.base())
    }
}

fn base_url(tenant_name: &str, tenant_id: &str) -> String {
    format!("https://{}.ciamlogin.com/{}", tenant_name, tenant_id)
}

/// v2 access tokens are issued by the tenant-id host; the named authority
/// is accepted as well
fn validation(tenant_id: &str, authority: &str, client_id: &str) -> Validation {
    let tenant_issuer = format!("https://{0}.ciamlogin.com/{0}/v2.0", tenant_id);
    let mut validation = oidc_validation(&tenant_issuer, client_id);
    validation.set_issuer(&[tenant_issuer.as_str(), authority]);
    validation
}

#[async_trait]
impl AuthProvider for EntraProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Entra
    }

    fn claim_mapping(&self) -> &ClaimMapping {
        &CLAIMS
    }

    async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        self.verifier.verify(token).await
    }

    fn authorization_servers(&self) -> Vec<String> {
        vec![self.authority()]
    }

    async fn authorization_server_metadata(&self) -> Result<AuthorizationServerMetadata, AuthError> {
        Ok(AuthorizationServerMetadata::with_defaults(
            self.authority(),
            format!("{}/oauth2/v2.0/authorize", self.base()),
            format!("{}/oauth2/v2.0/token", self.base()),
            self.jwks_uri(),
        ))
    }
}
