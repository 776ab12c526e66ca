//! Authentication errors

use thiserror::Error;

/// RFC 6750 error codes
pub const INVALID_REQUEST: &str = "invalid_request";
pub const INVALID_TOKEN: &str = "invalid_token";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Missing, malformed, expired or untrusted bearer token
    #[error("{code}: {message}")]
    Unauthenticated { code: &'static str, message: String },

    /// The identity provider could not be reached (JWKS or discovery fetch)
    #[error("authority unavailable: {0}")]
    Upstream(String),
}

impl AuthError {
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            code: INVALID_TOKEN,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            code: INVALID_REQUEST,
            message: message.into(),
        }
    }

    /// Diagnostic code surfaced to the caller
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated { code, .. } => code,
            Self::Upstream(_) => "temporarily_unavailable",
        }
    }

    /// Human readable diagnostic surfaced to the caller
    pub fn description(&self) -> String {
        match self {
            Self::Unauthenticated { message, .. } => message.clone(),
            Self::Upstream(reason) => reason.clone(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        let message = match err.kind() {
            ErrorKind::ExpiredSignature => "Token has expired".to_string(),
            ErrorKind::ImmatureSignature => "Token is not valid yet".to_string(),
            ErrorKind::InvalidSignature => "Token signature is invalid".to_string(),
            ErrorKind::InvalidIssuer => "Token issuer is not trusted".to_string(),
            ErrorKind::InvalidAudience => "Token audience does not match this resource".to_string(),
            ErrorKind::InvalidAlgorithm => "Token signing algorithm is not allowed".to_string(),
            ErrorKind::MissingRequiredClaim(claim) => {
                format!("Token is missing required claim '{}'", claim)
            }
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => "Token is malformed".to_string(),
            other => format!("Token verification failed: {:?}", other),
        };
        Self::invalid_token(message)
    }
}
