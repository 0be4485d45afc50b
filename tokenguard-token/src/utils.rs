use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::fs::read;
use std::path::Path;

use crate::error::TokenError;
use crate::keys::{PrivateKey, PublicKey};

/// Encode bytes as an unpadded base64url token segment
pub fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode an unpadded base64url token segment
///
/// # Arguments
///
/// * `segment` - One of the dot separated parts of a compact token
/// * `name` - Segment name used in the error message
pub fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::malformed(format!("{name} is not valid base64url: {e}")))
}

/// Read an RSA public key from a PEM file
pub fn public_key_from_pem_file(path: impl AsRef<Path>) -> Result<PublicKey, TokenError> {
    let path = path.as_ref();
    let pem = read(path).map_err(|e| {
        TokenError::invalid_key(format!("failed to read {}: {e}", path.display()))
    })?;
    PublicKey::from_rsa_pem(&pem)
        .map_err(|e| e.with_context(&path.display().to_string()))
}

/// Read an RSA private key from a PEM file
pub fn private_key_from_pem_file(path: impl AsRef<Path>) -> Result<PrivateKey, TokenError> {
    let path = path.as_ref();
    let pem = read(path).map_err(|e| {
        TokenError::invalid_key(format!("failed to read {}: {e}", path.display()))
    })?;
    PrivateKey::from_rsa_pem(&pem)
        .map_err(|e| e.with_context(&path.display().to_string()))
}
