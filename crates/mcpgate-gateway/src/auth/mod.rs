//! Bearer authentication for the MCP endpoint
//!
//! Tokens are verified by the configured [`AuthProvider`] and normalized into
//! an [`AuthContext`] that handlers read from request extensions. Requests
//! that fail verification never reach the session registry.

mod auth0;
mod context;
mod entra;
mod error;
mod provider;
mod proxied;
mod verifier;

pub use auth0::Auth0Provider;
pub use context::{normalize_claims, AuthContext, ClaimMapping, VerifiedClaims};
pub use entra::EntraProvider;
pub use error::{AuthError, INVALID_REQUEST, INVALID_TOKEN};
pub use provider::{build_provider, AuthProvider};
pub use proxied::ProxiedProvider;
pub use verifier::{
    decode_unverified_claims, oidc_validation, JwksVerifier, StaticKeyVerifier, TokenVerifier,
};

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use mcpgate_core::branding;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::logging::TraceContext;
use crate::oauth::request_origin;

/// Pull the bearer token out of the `Authorization` header
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(AuthError::invalid_token("Missing access token"));
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::invalid_request("Invalid Authorization header format"))?;

    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::invalid_request(
            "Authorization header must use Bearer scheme",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::invalid_request("Bearer token is empty"));
    }
    Ok(token)
}

/// Authentication middleware for MCP endpoints.
///
/// Extracts Bearer token → verifies with the provider → injects AuthContext
pub async fn mcp_auth_middleware(
    State(provider): State<Arc<dyn AuthProvider>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Skip auth for OPTIONS (CORS preflight)
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let trace_id = TraceContext::id_of(&request);
    let origin = request_origin(request.headers());

    let token = match extract_bearer(request.headers()) {
        Ok(token) => token.to_string(),
        Err(err) => {
            info!(trace_id = %trace_id, "[Auth] Rejected: {}", err);
            return auth_error_response(&err, &origin);
        }
    };

    match provider.authenticate(&token).await {
        Ok(ctx) => {
            debug!(
                trace_id = %trace_id,
                client = %ctx.short_client(),
                scopes = ctx.scopes().len(),
                "[Auth] Token accepted"
            );
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(err) => {
            // Unverified claims only; the token itself is never logged
            let claims = decode_unverified_claims(&token)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "<undecodable>".to_string());
            warn!(
                trace_id = %trace_id,
                provider = %provider.kind(),
                unverified_claims = %claims,
                "[Auth] Token rejected: {}", err
            );
            auth_error_response(&err, &origin)
        }
    }
}

/// Map an authentication failure to its HTTP response.
///
/// Unauthenticated → 401 with RFC 9728 `resource_metadata`; upstream
/// failure → 502.
pub fn auth_error_response(err: &AuthError, origin: &str) -> Response {
    match err {
        AuthError::Unauthenticated { code, message } => {
            unauthorized_response_with_url(origin, code, message)
        }
        AuthError::Upstream(_) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": err.code(),
                "error_description": err.description(),
            })),
        )
            .into_response(),
    }
}

/// Generate 401 Unauthorized response with OAuth metadata.
///
/// Per RFC 9728, the WWW-Authenticate header should include `resource_metadata`
/// parameter pointing to the OAuth Protected Resource Metadata endpoint.
pub fn unauthorized_response_with_url(origin: &str, error: &str, description: &str) -> Response {
    let resource_metadata_url = branding::resource_metadata_url(origin);

    let www_authenticate = format!(
        r#"Bearer realm="{}", error="{}", error_description="{}", resource_metadata="{}""#,
        branding::auth_realm(),
        error,
        description.replace('"', "'"),
        resource_metadata_url
    );

    let body = json!({
        "error": error,
        "error_description": description,
        "resource_metadata": resource_metadata_url,
    });

    debug!(
        "[Auth] Returning 401 with resource_metadata={}",
        resource_metadata_url
    );

    match www_authenticate.parse::<header::HeaderValue>() {
        Ok(value) => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, value)],
            Json(body),
        )
            .into_response(),
        Err(_) => (StatusCode::UNAUTHORIZED, Json(body)).into_response(),
    }
}
