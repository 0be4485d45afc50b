//! # Tokenguard
//!
//! Verification and issuance of RS-family JSON Web Tokens for services that
//! trust a fixed set of signing keys.
//!
//! A token is accepted only if:
//!
//! - its header names a key id (`kid`) that resolves to a trusted public key,
//! - its algorithm is one of RS256, RS384 or RS512,
//! - its signature checks out against that key, and
//! - it is within its validity period: not before `nbf` when present, and
//!   before `exp` when present, otherwise no older than the grace window
//!   (30 seconds by default) measured from `iat`.
//!
//! Tokens carrying neither `exp` nor `iat` are rejected. Accepted claims are
//! handed back as canonical JSON bytes with the original key order intact.
//!
//! ## Feature Flags
//!
//! - `toml`: Enables configuration loading from TOML files (on by default)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use serde::Deserialize;
//! use tokenguard::{GuardConfig, TokenGuard};
//!
//! #[derive(Deserialize)]
//! struct Session {
//!     sub: String,
//!     role: String,
//! }
//!
//! # fn main() -> Result<(), tokenguard::GuardError> {
//! let config = GuardConfig::builder()
//!     .public_key("prod-2024", std::fs::read_to_string("keys/prod-2024.pem")?)
//!     .build()?;
//! let guard = TokenGuard::from_config(&config)?;
//!
//! let session: Session = guard.verify_as("eyJhbGciOi...")?;
//! println!("{} acting as {}", session.sub, session.role);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! When using `GuardConfig::from_env(prefix)`, the following variables are read:
//!
//! ```text
//! ${PREFIX}_PUBLIC_KEYS        - JSON object mapping key id to PEM public key
//! ${PREFIX}_PUBLIC_KEYS_DIR    - Directory of <kid>.pem files
//! ${PREFIX}_GRACE_WINDOW_SECS  - Optional grace window for iat-only tokens
//! ${PREFIX}_SIGNING_KEY        - Optional PEM private key for issuing
//! ${PREFIX}_SIGNING_KEY_FILE   - Optional path to the PEM private key
//! ${PREFIX}_SIGNING_KEY_ID     - Optional kid written into issued tokens
//! ```
//!
//! The lower-level building blocks ([`Verifier`], [`Issuer`],
//! [`TrustedKeyStore`], [`KeyResolver`]) are re-exported for services that
//! manage keys themselves, for example rotating them at runtime behind a
//! `RwLock`.

use thiserror::Error;

mod guard;
pub mod lifecycle;
pub mod telemetry;

pub use guard::TokenGuard;

pub use tokenguard_config::{
    get_default_config, set_default_config, ConfigError, GuardConfig, GuardConfigBuilder,
};
pub use tokenguard_token::{
    decode_claims_json, inspect_header, issue_token, verify_token, Algorithm, ClaimSet, Issuer,
    KeyResolver, PrivateKey, PublicKey, ResolveFn, TokenError, TokenHeader, TokenTimeConfig,
    TrustedKeyStore, VerifiedClaims, Verifier, DEFAULT_GRACE_WINDOW_SECS,
};

/// Errors that can occur in Tokenguard
#[derive(Error, Debug)]
pub enum GuardError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Token error
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required environment variable is unset
    #[error("Environment variable {name} is required: {reason}")]
    MissingEnv { name: String, reason: String },

    /// `issue` was called on a guard built without a signing key
    #[error("No signing key configured")]
    SigningNotConfigured,

    /// Logging could not be initialized
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// Generic error
    #[error("{0}")]
    Generic(String),
}
