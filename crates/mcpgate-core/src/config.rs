//! Gateway configuration
//!
//! Everything is read from environment variables once at startup. Parsing goes
//! through [`GatewaySettings::from_lookup`] so it can be exercised without
//! touching the process environment.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `HOST`, `PORT` | Listen address (default `0.0.0.0:3000`) |
//! | `MCP_PATH` | Streamable HTTP endpoint path (default `/mcp`) |
//! | `ENABLE_CORS` | Permissive CORS layer (default `true`) |
//! | `LOG_DIR` | Directory for rotated log files (default `./logs`) |
//! | `AUTH_PROVIDER` | `auth0`, `entra` or `proxied` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::branding;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("AUTH_PROVIDER is not set. Must be one of: auth0, entra, proxied")]
    MissingProvider,

    #[error("Unknown AUTH_PROVIDER: '{0}'. Must be one of: auth0, entra, proxied")]
    UnknownProvider(String),

    #[error("AUTH_PROVIDER={provider} requires {}", .missing.join(", "))]
    MissingVariables {
        provider: ProviderKind,
        missing: Vec<&'static str>,
    },

    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} has an invalid value '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Identity provider selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Standard OIDC provider serving its own discovery document (Auth0)
    Auth0,
    /// Microsoft Entra External ID (CIAM) tenant with templated endpoints
    Entra,
    /// Authority fronted by this resource server through an internal base URL
    Proxied,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth0 => "auth0",
            Self::Entra => "entra",
            Self::Proxied => "proxied",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth0" => Ok(Self::Auth0),
            "entra" => Ok(Self::Entra),
            "proxied" => Ok(Self::Proxied),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Per-variant identity provider parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Auth0 {
        /// Tenant domain, e.g. `example.us.auth0.com`
        domain: String,
        audience: String,
    },
    Entra {
        tenant_id: String,
        tenant_name: String,
        /// Application (client) id, used as the token audience
        client_id: String,
    },
    Proxied {
        /// Externally reachable authority base; also the expected `iss`
        issuer_url: Url,
        /// Base URL the gateway uses to reach the authority
        internal_url: Url,
        audience: String,
    },
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Auth0 { .. } => ProviderKind::Auth0,
            Self::Entra { .. } => ProviderKind::Entra,
            Self::Proxied { .. } => ProviderKind::Proxied,
        }
    }

    /// Parse the provider section using `lookup` to read variables
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let kind: ProviderKind = read("AUTH_PROVIDER")
            .ok_or(ConfigError::MissingProvider)?
            .parse()?;

        let mut missing = Vec::new();
        let mut require = |name: &'static str| {
            let value = read(name);
            if value.is_none() {
                missing.push(name);
            }
            value.unwrap_or_default()
        };

        let config = match kind {
            ProviderKind::Auth0 => {
                let domain = require("AUTH0_DOMAIN");
                let audience = require("AUTH0_AUDIENCE");
                let domain = if domain.is_empty() {
                    domain
                } else {
                    parse_domain("AUTH0_DOMAIN", &domain)?
                };
                Self::Auth0 { domain, audience }
            }
            ProviderKind::Entra => Self::Entra {
                tenant_id: require("ENTRA_TENANT_ID"),
                tenant_name: require("ENTRA_TENANT_NAME"),
                client_id: require("ENTRA_CLIENT_ID"),
            },
            ProviderKind::Proxied => {
                let issuer = require("PROXY_ISSUER_URL");
                let internal = require("PROXY_INTERNAL_URL");
                let audience = require("PROXY_AUDIENCE");
                if !missing.is_empty() {
                    return Err(ConfigError::MissingVariables {
                        provider: kind,
                        missing,
                    });
                }
                Self::Proxied {
                    issuer_url: parse_http_url("PROXY_ISSUER_URL", &issuer)?,
                    internal_url: parse_http_url("PROXY_INTERNAL_URL", &internal)?,
                    audience,
                }
            }
        };

        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables {
                provider: kind,
                missing,
            });
        }

        debug!("[Config] Identity provider: {}", kind);
        Ok(config)
    }
}

/// Bare host name; a leading `http(s)://` and trailing `/` are tolerated
fn parse_domain(name: &'static str, value: &str) -> Result<String, ConfigError> {
    let host = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(value)
        .trim_end_matches('/');

    if host.is_empty() || host.contains(['/', ':', ' ']) {
        return Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        });
    }
    Ok(host.to_string())
}

fn parse_http_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

/// Normalize the MCP endpoint path: leading slash, no trailing slash (except root)
fn normalize_mcp_path(value: &str) -> Result<String, ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::InvalidValue {
            name: "MCP_PATH",
            value: value.to_string(),
        });
    }
    let trimmed = value.trim_end_matches('/');
    if trimmed.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

/// Complete gateway settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub host: String,
    pub port: u16,
    pub mcp_path: String,
    pub enable_cors: bool,
    pub log_dir: String,
    pub provider: ProviderConfig,
}

impl GatewaySettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match read("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: raw,
            })?,
            None => branding::DEFAULT_GATEWAY_PORT,
        };

        let mcp_path = match read("MCP_PATH") {
            Some(raw) => normalize_mcp_path(&raw)?,
            None => branding::DEFAULT_MCP_PATH.to_string(),
        };

        let enable_cors = match read("ENABLE_CORS") {
            Some(raw) => parse_bool("ENABLE_CORS", &raw)?,
            None => true,
        };

        Ok(Self {
            host: read("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            mcp_path,
            enable_cors,
            log_dir: read("LOG_DIR").unwrap_or_else(|| branding::DEFAULT_LOG_DIR.to_string()),
            provider: ProviderConfig::from_lookup(&lookup)?,
        })
    }
}
