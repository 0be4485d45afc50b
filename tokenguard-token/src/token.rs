use serde::Serialize;

use crate::claims::VerifiedClaims;
use crate::error::TokenError;
use crate::keys::{KeyResolver, PrivateKey};
use crate::mint::Issuer;
use crate::verify::{parse_token, TokenHeader, Verifier};

/// Verify a compact token string with the default policy
///
/// This is a convenience function that calls [`Verifier::verify`] with a
/// 30 second grace window for tokens that carry `iat` but no `exp`.
///
/// # Arguments
///
/// * `token_string` - Compact token (`header.payload.signature`)
/// * `keys` - Trusted public keys by key identifier
///
/// # Returns
///
/// * `Ok(VerifiedClaims)` - If every check passed
/// * `Err(TokenError)` - The first check that failed
pub fn verify_token<R>(token_string: &str, keys: &R) -> Result<VerifiedClaims, TokenError>
where
    R: KeyResolver + ?Sized,
{
    Verifier::new().verify(token_string, keys)
}

/// Verify a token and return its claims as canonical JSON bytes
///
/// The bytes can be deserialized into any application defined claim type.
/// A mismatch between the token's claims and that type is reported by the
/// deserializer, not here.
pub fn decode_claims_json<R>(token_string: &str, keys: &R) -> Result<Vec<u8>, TokenError>
where
    R: KeyResolver + ?Sized,
{
    verify_token(token_string, keys).map(VerifiedClaims::into_bytes)
}

/// Sign claims with an RSA private key using RS256 and no `kid`
///
/// Use [`Issuer`] directly to set a key identifier or another RSA algorithm.
pub fn issue_token<C>(claims: &C, private_key: &PrivateKey) -> Result<String, TokenError>
where
    C: Serialize + ?Sized,
{
    Issuer::new(private_key.clone()).issue(claims)
}

/// Reads the header of a token WITHOUT verifying anything
///
/// Useful for logging or routing a token before verification. Nothing in the
/// returned header may be trusted.
pub fn inspect_header(token_string: &str) -> Result<TokenHeader, TokenError> {
    parse_token(token_string).map(|parsed| parsed.header)
}
