//! OAuth discovery support
//!
//! Discovery documents and the helpers needed to describe this resource
//! server correctly behind a reverse proxy.

mod metadata;

pub use metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata};
pub(crate) use metadata::strings;

use axum::http::{header, HeaderMap};

/// Externally reachable origin of this gateway for the current request.
///
/// Honors `X-Forwarded-Proto` / `X-Forwarded-Host` so the advertised resource
/// is correct behind ingress controllers and reverse proxies.
pub fn request_origin(headers: &HeaderMap) -> String {
    let forwarded = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let proto = forwarded("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = forwarded("x-forwarded-host")
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .unwrap_or_else(|| "localhost".to_string());

    format!("{}://{}", proto, host)
}
