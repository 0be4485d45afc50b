use jsonwebtoken::{encode, Algorithm, Header};
use serde::Serialize;
use tracing::debug;

use crate::algorithm::{is_pinned, DEFAULT_ALGORITHM};
use crate::claims::ClaimSet;
use crate::error::TokenError;
use crate::keys::PrivateKey;

/// Signs claim sets into compact tokens.
///
/// The issuer embeds the claims exactly as given. It never adds `exp` or
/// `iat`; use [`ClaimSet::with_time_config`] or set them yourself so the
/// token satisfies the verifier's validity policy. A `kid` is only written to
/// the header when one is configured with [`Issuer::with_key_id`].
///
/// # Example
///
/// ```no_run
/// use tokenguard_token::{ClaimSet, Issuer, PrivateKey, TokenTimeConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let key = PrivateKey::from_rsa_pem(&std::fs::read("keys/private_key.pem")?)?;
/// let claims = ClaimSet::new()
///     .with("sub", "1234567890")
///     .with_time_config(TokenTimeConfig::default());
///
/// let token = Issuer::new(key).with_key_id("foo").issue(&claims)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Issuer {
    key: PrivateKey,
    algorithm: Algorithm,
    key_id: Option<String>,
}

impl Issuer {
    pub fn new(key: PrivateKey) -> Self {
        Self {
            key,
            algorithm: DEFAULT_ALGORITHM,
            key_id: None,
        }
    }

    /// Selects another member of the pinned RSA family.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::UnsupportedAlgorithm`] for algorithms outside the family.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Result<Self, TokenError> {
        if !is_pinned(algorithm) {
            return Err(TokenError::UnsupportedAlgorithm(format!("{algorithm:?}")));
        }
        self.algorithm = algorithm;
        Ok(self)
    }

    /// Writes `kid` into the header of every issued token.
    pub fn with_key_id(mut self, kid: impl Into<String>) -> Self {
        self.key_id = Some(kid.into());
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Signs `claims` and returns the compact token.
    ///
    /// # Errors
    ///
    /// - [`TokenError::ClaimSerialization`] if the claims are not a JSON object
    /// - [`TokenError::SigningFailed`] if the private key cannot produce a signature
    pub fn issue<C: Serialize + ?Sized>(&self, claims: &C) -> Result<String, TokenError> {
        let claims = ClaimSet::from_serializable(claims)?;

        let mut header = Header::new(self.algorithm);
        header.kid = self.key_id.clone();

        let token = encode(&header, &claims, self.key.encoding_key())
            .map_err(|e| TokenError::signing_failed(e.to_string()))?;

        debug!(kid = ?self.key_id, alg = ?self.algorithm, "issued token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::TokenTimeConfig;
    use crate::keys::{PublicKey, TrustedKeyStore};
    use crate::verify::Verifier;
    use serde_json::json;

    const PRIVATE_PEM: &[u8] = include_bytes!("../tests/fixtures/private_key.pem");
    const PUBLIC_PEM: &[u8] = include_bytes!("../tests/fixtures/public_key.pem");

    fn issuer() -> Issuer {
        Issuer::new(PrivateKey::from_rsa_pem(PRIVATE_PEM).unwrap())
    }

    #[test]
    fn test_issue_does_not_inject_claims() {
        let claims = ClaimSet::new().with("sub", "test@test.com");
        let token = issuer().issue(&claims).unwrap();

        let parsed = crate::verify::parse_token(&token).unwrap();
        assert_eq!(parsed.claims, claims);
        assert_eq!(parsed.header.alg, "RS256");
        assert_eq!(parsed.header.kid, None);
    }

    #[test]
    fn test_issue_writes_configured_kid() {
        let token = issuer()
            .with_key_id("foo")
            .issue(&json!({"sub": "1", "iat": 1}))
            .unwrap();
        let parsed = crate::verify::parse_token(&token).unwrap();
        assert_eq!(parsed.header.kid.as_deref(), Some("foo"));
    }

    #[test]
    fn test_every_family_member_round_trips() {
        let keys = TrustedKeyStore::new().with_key("foo", PublicKey::from_rsa_pem(PUBLIC_PEM).unwrap());
        let claims = ClaimSet::new()
            .with("sub", "test@test.com")
            .with_time_config(TokenTimeConfig::default());

        for algorithm in crate::algorithm::PINNED_ALGORITHMS {
            let token = issuer()
                .with_algorithm(algorithm)
                .unwrap()
                .with_key_id("foo")
                .issue(&claims)
                .unwrap();
            let verified = Verifier::new().verify(&token, &keys).unwrap();
            assert_eq!(verified.claims(), &claims);
        }
    }

    #[test]
    fn test_algorithms_outside_the_family_are_refused() {
        for algorithm in [Algorithm::HS256, Algorithm::PS256, Algorithm::ES256, Algorithm::EdDSA] {
            assert!(matches!(
                issuer().with_algorithm(algorithm),
                Err(TokenError::UnsupportedAlgorithm(_))
            ));
        }
    }

    #[test]
    fn test_non_object_claims_are_refused() {
        assert!(matches!(
            issuer().issue(&"plain string"),
            Err(TokenError::ClaimSerialization(_))
        ));
    }

    #[test]
    fn test_malformed_key_fails_signing() {
        let issuer = Issuer::new(PrivateKey::from_rsa_der(b"definitely not a key"));
        let err = issuer
            .issue(&json!({"sub": "1", "exp": 4_102_444_800_i64}))
            .unwrap_err();
        assert!(matches!(err, TokenError::SigningFailed(_)));
    }
}
