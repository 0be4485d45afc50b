//! Key types and key resolution.
//!
//! The verifier never owns keys. It asks a [`KeyResolver`] for the public key
//! registered under the `kid` a token asserts, once per verification.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use jsonwebtoken::{DecodingKey, EncodingKey};
use sha2::{Digest, Sha256};

use crate::error::TokenError;

fn fingerprint(encoded: &[u8]) -> String {
    let digest = Sha256::digest(encoded);
    hex::encode(&digest[..8])
}

/// An RSA public key used to verify token signatures.
///
/// Cloning is cheap. `Debug` shows a fingerprint of the encoded key, never the key.
#[derive(Clone)]
pub struct PublicKey {
    key: Arc<DecodingKey>,
    fingerprint: String,
}

impl PublicKey {
    /// Parses a PEM encoded RSA public key (PKCS#1 or SubjectPublicKeyInfo).
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, TokenError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| TokenError::invalid_key(format!("failed to parse RSA public key PEM: {e}")))?;
        Ok(Self {
            key: Arc::new(key),
            fingerprint: fingerprint(pem),
        })
    }

    /// Wraps a PKCS#1 DER encoded RSA public key. The encoding is checked when
    /// the key is first used, so a bad key shows up as a failed signature check.
    pub fn from_rsa_der(der: &[u8]) -> Self {
        Self {
            key: Arc::new(DecodingKey::from_rsa_der(der)),
            fingerprint: fingerprint(der),
        }
    }

    /// Builds a key from the base64url encoded modulus and exponent of a JWK.
    pub fn from_rsa_components(modulus: &str, exponent: &str) -> Result<Self, TokenError> {
        let key = DecodingKey::from_rsa_components(modulus, exponent)
            .map_err(|e| TokenError::invalid_key(format!("invalid RSA key components: {e}")))?;
        Ok(Self {
            key: Arc::new(key),
            fingerprint: fingerprint(format!("{modulus}.{exponent}").as_bytes()),
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// An RSA private key used to sign tokens.
#[derive(Clone)]
pub struct PrivateKey {
    key: EncodingKey,
}

impl PrivateKey {
    /// Parses a PEM encoded RSA private key (PKCS#1 or PKCS#8).
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, TokenError> {
        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| TokenError::invalid_key(format!("failed to parse RSA private key PEM: {e}")))?;
        Ok(Self { key })
    }

    /// Wraps a PKCS#1 DER encoded RSA private key without checking it.
    /// A malformed key makes signing fail with [`TokenError::SigningFailed`].
    pub fn from_rsa_der(der: &[u8]) -> Self {
        Self {
            key: EncodingKey::from_rsa_der(der),
        }
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.key
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Resolves the key identifier asserted by a token to a trusted public key.
///
/// Implementations are consulted exactly once per verification, so a store
/// that is rotated concurrently only needs to return a consistent answer for
/// that single lookup. Returning `None` rejects the token.
pub trait KeyResolver {
    fn resolve(&self, kid: &str) -> Option<PublicKey>;
}

impl KeyResolver for HashMap<String, PublicKey> {
    fn resolve(&self, kid: &str) -> Option<PublicKey> {
        self.get(kid).cloned()
    }
}

impl KeyResolver for BTreeMap<String, PublicKey> {
    fn resolve(&self, kid: &str) -> Option<PublicKey> {
        self.get(kid).cloned()
    }
}

impl<R: KeyResolver + ?Sized> KeyResolver for &R {
    fn resolve(&self, kid: &str) -> Option<PublicKey> {
        (**self).resolve(kid)
    }
}

impl<R: KeyResolver + ?Sized> KeyResolver for Arc<R> {
    fn resolve(&self, kid: &str) -> Option<PublicKey> {
        (**self).resolve(kid)
    }
}

/// A poisoned lock resolves nothing.
impl<R: KeyResolver> KeyResolver for RwLock<R> {
    fn resolve(&self, kid: &str) -> Option<PublicKey> {
        self.read().ok()?.resolve(kid)
    }
}

/// Adapts a closure into a [`KeyResolver`].
///
/// ```
/// use tokenguard_token::{KeyResolver, PublicKey, ResolveFn};
///
/// let resolver = ResolveFn(|_kid: &str| -> Option<PublicKey> { None });
/// assert!(resolver.resolve("anything").is_none());
/// ```
pub struct ResolveFn<F>(pub F);

impl<F> KeyResolver for ResolveFn<F>
where
    F: Fn(&str) -> Option<PublicKey>,
{
    fn resolve(&self, kid: &str) -> Option<PublicKey> {
        (self.0)(kid)
    }
}

/// An in-memory mapping from key identifier to trusted public key.
#[derive(Clone, Debug, Default)]
pub struct TrustedKeyStore {
    keys: BTreeMap<String, PublicKey>,
}

impl TrustedKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from `(kid, PEM)` pairs. Fails on the first key that does not parse.
    pub fn from_pem_map<I, K, P>(entries: I) -> Result<Self, TokenError>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: AsRef<[u8]>,
    {
        let mut store = Self::new();
        for (kid, pem) in entries {
            let kid = kid.into();
            let key = PublicKey::from_rsa_pem(pem.as_ref())
                .map_err(|e| e.with_context(&format!("key '{kid}'")))?;
            store.insert(kid, key);
        }
        Ok(store)
    }

    /// Loads every `<kid>.pem` file in `dir`. Other files are ignored.
    pub fn from_pem_dir(dir: impl AsRef<Path>) -> Result<Self, TokenError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| {
            TokenError::invalid_key(format!("failed to read key directory {}: {e}", dir.display()))
        })?;

        let mut store = Self::new();
        for entry in entries {
            let path = entry
                .map_err(|e| TokenError::invalid_key(format!("failed to read key directory entry: {e}")))?
                .path();
            if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("pem") {
                continue;
            }
            let Some(kid) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let kid = kid.to_string();
            let key = crate::utils::public_key_from_pem_file(&path)?;
            tracing::debug!(kid = %kid, fingerprint = %key.fingerprint(), "loaded trusted key");
            store.insert(kid, key);
        }
        Ok(store)
    }

    pub fn insert(&mut self, kid: impl Into<String>, key: PublicKey) -> Option<PublicKey> {
        self.keys.insert(kid.into(), key)
    }

    pub fn with_key(mut self, kid: impl Into<String>, key: PublicKey) -> Self {
        self.insert(kid, key);
        self
    }

    pub fn remove(&mut self, kid: &str) -> Option<PublicKey> {
        self.keys.remove(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

impl KeyResolver for TrustedKeyStore {
    fn resolve(&self, kid: &str) -> Option<PublicKey> {
        self.keys.get(kid).cloned()
    }
}

impl FromIterator<(String, PublicKey)> for TrustedKeyStore {
    fn from_iter<T: IntoIterator<Item = (String, PublicKey)>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}
