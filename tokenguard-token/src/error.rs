use thiserror::Error;

/// Errors produced while verifying or issuing tokens.
///
/// Every variant is a rejected request, never a reason to stop the process.
/// Messages carry enough context to debug a rejection (key identifiers,
/// algorithm names, claim names) but never key material or signature bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token is not three base64url segments with JSON header and payload
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("token header has no 'kid'")]
    MissingKeyId,

    #[error("unknown 'kid': {0}")]
    UnknownKeyId(String),

    /// The header declares an algorithm outside the pinned RSA family
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("token signature verification failed")]
    InvalidSignature,

    /// A temporal claim is present but is not a numeric date
    #[error("invalid claim '{claim}': {reason}")]
    InvalidClaims { claim: String, reason: String },

    #[error("token expired ({claim})")]
    TokenExpired { claim: &'static str },

    /// The token carries an `nbf` that is still in the future
    #[error("token not valid yet ('nbf' is in the future)")]
    NotYetValid,

    #[error("invalid token, neither 'exp' nor 'iat' is present")]
    MissingTemporalClaim,

    #[error("failed to serialize claims: {0}")]
    ClaimSerialization(String),

    #[error("failed to sign token: {0}")]
    SigningFailed(String),

    /// A key could not be loaded or parsed
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl TokenError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        TokenError::MalformedToken(msg.into())
    }

    pub fn invalid_claim(claim: impl Into<String>, reason: impl Into<String>) -> Self {
        TokenError::InvalidClaims {
            claim: claim.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        TokenError::InvalidKey(msg.into())
    }

    pub fn signing_failed(msg: impl Into<String>) -> Self {
        TokenError::SigningFailed(msg.into())
    }

    /// Prefixes the message of a key loading error with where the key came from.
    pub(crate) fn with_context(self, context: &str) -> Self {
        match self {
            TokenError::InvalidKey(msg) => TokenError::InvalidKey(format!("{context}: {msg}")),
            other => other,
        }
    }

    /// Whether the token was rejected because of its age rather than its content.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::TokenExpired { .. })
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(error: serde_json::Error) -> Self {
        TokenError::ClaimSerialization(error.to_string())
    }
}
