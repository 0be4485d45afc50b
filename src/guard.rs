use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use tokenguard_config::GuardConfig;
use tokenguard_token::{Issuer, PrivateKey, TrustedKeyStore, VerifiedClaims, Verifier};

use crate::GuardError;

/// Everything a service needs to accept (and optionally mint) tokens.
///
/// Built once at startup from a [`GuardConfig`]; afterwards it is read-only
/// and can be shared between request handlers behind an `Arc`.
///
/// # Example
///
/// ```no_run
/// use serde::Deserialize;
/// use tokenguard::{GuardConfig, TokenGuard};
///
/// #[derive(Deserialize)]
/// struct AppClaims {
///     sub: String,
/// }
///
/// # fn main() -> Result<(), tokenguard::GuardError> {
/// let config = GuardConfig::from_env("AUTH")?;
/// let guard = TokenGuard::from_config(&config)?;
///
/// let claims: AppClaims = guard.verify_as("eyJhbGciOi...")?;
/// println!("request from {}", claims.sub);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TokenGuard {
    keys: TrustedKeyStore,
    verifier: Verifier,
    issuer: Option<Issuer>,
}

impl TokenGuard {
    pub fn new(keys: TrustedKeyStore, verifier: Verifier) -> Self {
        Self {
            keys,
            verifier,
            issuer: None,
        }
    }

    /// Parses every configured key and builds the verifier and issuer.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or any key does not parse.
    pub fn from_config(config: &GuardConfig) -> Result<Self, GuardError> {
        config.validate()?;

        let keys = TrustedKeyStore::from_pem_map(
            config
                .public_keys
                .iter()
                .map(|(kid, pem)| (kid.as_str(), pem.as_bytes())),
        )?;
        let verifier =
            Verifier::new().with_grace_window(Duration::from_secs(config.grace_window_secs));

        let issuer = match &config.signing_key {
            Some(pem) => {
                let issuer = Issuer::new(PrivateKey::from_rsa_pem(pem.as_bytes())?);
                Some(match &config.signing_key_id {
                    Some(kid) => issuer.with_key_id(kid.as_str()),
                    None => issuer,
                })
            }
            None => None,
        };

        info!(
            keys = keys.len(),
            grace_window_secs = config.grace_window_secs,
            signing = issuer.is_some(),
            "token guard ready"
        );
        Ok(Self {
            keys,
            verifier,
            issuer,
        })
    }

    pub fn with_issuer(mut self, issuer: Issuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Verifies `token` against the configured keys.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, GuardError> {
        Ok(self.verifier.verify(token, &self.keys)?)
    }

    /// Verifies `token` and deserializes its claims into `T`.
    ///
    /// # Errors
    ///
    /// [`GuardError::Token`] when verification fails, [`GuardError::Json`]
    /// when the verified claims do not fit `T`.
    pub fn verify_as<T: DeserializeOwned>(&self, token: &str) -> Result<T, GuardError> {
        Ok(self.verify(token)?.deserialize()?)
    }

    /// Signs `claims` with the configured signing key.
    ///
    /// # Errors
    ///
    /// [`GuardError::SigningNotConfigured`] when no signing key was configured.
    pub fn issue<C: Serialize + ?Sized>(&self, claims: &C) -> Result<String, GuardError> {
        let issuer = self.issuer.as_ref().ok_or(GuardError::SigningNotConfigured)?;
        Ok(issuer.issue(claims)?)
    }

    pub fn keys(&self) -> &TrustedKeyStore {
        &self.keys
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn issuer(&self) -> Option<&Issuer> {
        self.issuer.as_ref()
    }
}
