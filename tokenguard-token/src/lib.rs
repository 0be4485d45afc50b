//! # Tokenguard Token
//!
//! Core verification and issuance of RSA-signed bearer tokens.
//!
//! Tokens use the compact JWS format (`header.payload.signature`, each part
//! base64url). Verification resolves the signing key from the `kid` header
//! through a caller supplied [`KeyResolver`], accepts only the RSA
//! PKCS#1 v1.5 family (RS256, RS384, RS512), and enforces a validity policy:
//!
//! - with `exp`: the token is valid until `exp`
//! - without `exp` but with `iat`: the token is valid for a short grace
//!   window (30 seconds by default) after `iat`
//! - with neither: the token is rejected
//!
//! Verified claims come back as canonical JSON, ready to be deserialized
//! into the application's own claim type.
//!
//! ## Usage
//!
//! ```no_run
//! use serde::Deserialize;
//! use tokenguard_token::{
//!     verify_token, ClaimSet, Issuer, PrivateKey, PublicKey, TokenTimeConfig, TrustedKeyStore,
//! };
//!
//! #[derive(Deserialize)]
//! struct AppClaims {
//!     sub: String,
//!     role: String,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let private_key = PrivateKey::from_rsa_pem(&std::fs::read("keys/private_key.pem")?)?;
//!     let public_key = PublicKey::from_rsa_pem(&std::fs::read("keys/public_key.pem")?)?;
//!     let keys = TrustedKeyStore::new().with_key("foo", public_key);
//!
//!     let claims = ClaimSet::new()
//!         .with("sub", "1234567890")
//!         .with("role", "admin")
//!         .with_time_config(TokenTimeConfig::default());
//!     let token = Issuer::new(private_key).with_key_id("foo").issue(&claims)?;
//!
//!     let claims: AppClaims = verify_token(&token, &keys)?.deserialize()?;
//!     println!("{} is {}", claims.sub, claims.role);
//!     Ok(())
//! }
//! ```

mod algorithm;
mod claims;
mod error;
mod keys;
mod mint;
mod token;
mod utils;
mod verify;

pub use algorithm::{is_pinned, pinned_algorithm, DEFAULT_ALGORITHM, PINNED_ALGORITHMS};
pub use claims::{ClaimSet, TokenTimeConfig, VerifiedClaims, EXPIRATION, ISSUED_AT, NOT_BEFORE};
pub use error::TokenError;
pub use keys::{KeyResolver, PrivateKey, PublicKey, ResolveFn, TrustedKeyStore};
pub use mint::Issuer;
pub use token::{decode_claims_json, inspect_header, issue_token, verify_token};
pub use utils::{decode_segment, encode_segment, private_key_from_pem_file, public_key_from_pem_file};
pub use verify::{TokenHeader, Verifier, DEFAULT_GRACE_WINDOW_SECS};

// Re-export the algorithm type that appears in the public API
pub use jsonwebtoken::Algorithm;
