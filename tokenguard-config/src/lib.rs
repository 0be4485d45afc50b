//! # Tokenguard Config
//!
//! Configuration for services that verify (and optionally issue) tokens.
//!
//! A [`GuardConfig`] names the trusted public keys by key identifier, the
//! grace window applied to tokens that carry `iat` but no `exp`, and an
//! optional signing key. It can be built in code, read from JSON or TOML
//! files, or loaded from environment variables.
//!
//! ## Loading from environment variables
//!
//! ```no_run
//! use tokenguard_config::GuardConfig;
//!
//! // Assuming the following environment variables are set:
//! // AUTH_PUBLIC_KEYS_DIR=/etc/auth/keys        (one <kid>.pem per key)
//! // AUTH_GRACE_WINDOW_SECS=30
//! // AUTH_SIGNING_KEY_FILE=/etc/auth/signing.pem
//! // AUTH_SIGNING_KEY_ID=primary
//! let config = GuardConfig::from_env("AUTH")
//!     .expect("Failed to load configuration from environment");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// Default grace window, in seconds, for tokens with `iat` but no `exp`.
pub const DEFAULT_GRACE_WINDOW_SECS: u64 = 30;
/// Largest accepted grace window, in seconds.
pub const MAX_GRACE_WINDOW_SECS: u64 = 3600;

/// Configuration for token verification and issuance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Trusted public keys in PEM format, by key identifier
    #[serde(default)]
    pub public_keys: BTreeMap<String, String>,
    /// How long a token without `exp` is accepted after its `iat`
    #[serde(default = "default_grace_window_secs")]
    pub grace_window_secs: u64,
    /// RSA private key in PEM format, for services that also issue tokens
    #[serde(default)]
    pub signing_key: Option<String>,
    /// Key identifier written into the header of issued tokens
    #[serde(default)]
    pub signing_key_id: Option<String>,
}

fn default_grace_window_secs() -> u64 {
    DEFAULT_GRACE_WINDOW_SECS
}

/// Builder for GuardConfig
///
/// # Examples
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use tokenguard_config::GuardConfigBuilder;
///
/// let config = GuardConfigBuilder::new()
///     .public_key("primary", std::fs::read_to_string("keys/primary.pem")?)
///     .grace_window_secs(10)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default, Debug)]
pub struct GuardConfigBuilder {
    public_keys: BTreeMap<String, String>,
    grace_window_secs: Option<u64>,
    signing_key: Option<String>,
    signing_key_id: Option<String>,
}

impl GuardConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder from an existing GuardConfig
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            public_keys: config.public_keys.clone(),
            grace_window_secs: Some(config.grace_window_secs),
            signing_key: config.signing_key.clone(),
            signing_key_id: config.signing_key_id.clone(),
        }
    }

    /// Trust `pem` for tokens whose header carries `kid`
    pub fn public_key(mut self, kid: impl Into<String>, pem: impl Into<String>) -> Self {
        self.public_keys.insert(kid.into(), pem.into());
        self
    }

    pub fn grace_window_secs(mut self, secs: u64) -> Self {
        self.grace_window_secs = Some(secs);
        self
    }

    pub fn signing_key(mut self, pem: impl Into<String>) -> Self {
        self.signing_key = Some(pem.into());
        self
    }

    pub fn signing_key_id(mut self, kid: impl Into<String>) -> Self {
        self.signing_key_id = Some(kid.into());
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any required field is missing or invalid
    pub fn build(self) -> Result<GuardConfig, ConfigError> {
        let config = GuardConfig {
            public_keys: self.public_keys,
            grace_window_secs: self.grace_window_secs.unwrap_or(DEFAULT_GRACE_WINDOW_SECS),
            signing_key: self.signing_key,
            signing_key_id: self.signing_key_id,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Errors that can occur when working with configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("at least one trusted public key is required")]
    MissingPublicKeys,

    #[error("key identifiers must not be empty")]
    EmptyKeyId,

    #[error("invalid PEM for '{0}': expected a '-----BEGIN' block")]
    InvalidPem(String),

    #[error("grace window must be between 1 and 3600 seconds, got {0}")]
    InvalidGraceWindow(u64),

    #[error("signing_key_id is set but no signing_key is configured")]
    SigningKeyIdWithoutKey,

    #[error("I/O error while reading configuration: {0}")]
    IOError(String),

    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("global configuration has already been initialized")]
    AlreadyInitialized,

    #[error("environment variable {name}: {reason}")]
    EnvVarError { name: String, reason: String },
}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

/// Reads an optional variable. Unset is `None`; set but not unicode is an error.
fn optional_var(name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::EnvVarError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn read_file(path: impl AsRef<Path>, what: &str) -> Result<String, ConfigError> {
    let path = path.as_ref();
    fs::read_to_string(path)
        .map_err(|e| ConfigError::IOError(format!("failed to read {what} {}: {e}", path.display())))
}

/// Reads every `<kid>.pem` file in `dir`.
fn read_pem_dir(dir: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut keys = BTreeMap::new();
    let entries = fs::read_dir(dir)
        .map_err(|e| ConfigError::IOError(format!("failed to read key directory {}: {e}", dir.display())))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("pem") {
            continue;
        }
        if let Some(kid) = path.file_stem().and_then(|stem| stem.to_str()) {
            keys.insert(kid.to_string(), read_file(&path, "public key")?);
        }
    }
    Ok(keys)
}

impl GuardConfig {
    /// Create a configuration trusting the given `(kid, PEM)` pairs with default settings
    pub fn new<I, K, P>(public_keys: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<String>,
    {
        GuardConfig {
            public_keys: public_keys
                .into_iter()
                .map(|(kid, pem)| (kid.into(), pem.into()))
                .collect(),
            grace_window_secs: DEFAULT_GRACE_WINDOW_SECS,
            signing_key: None,
            signing_key_id: None,
        }
    }

    pub fn builder() -> GuardConfigBuilder {
        GuardConfigBuilder::new()
    }

    /// Convert this configuration to a builder for modification
    pub fn to_builder(&self) -> GuardConfigBuilder {
        GuardConfigBuilder::from_config(self)
    }

    /// Create a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: GuardConfig = serde_json::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from a TOML file
    #[cfg(feature = "toml")]
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: GuardConfig = toml::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration from environment variables
    ///
    /// The variables are named with the given prefix followed by:
    /// - `_PUBLIC_KEYS`: JSON object mapping key identifiers to PEM keys
    /// - `_PUBLIC_KEYS_DIR`: directory holding one `<kid>.pem` file per key
    /// - `_GRACE_WINDOW_SECS`: optional grace window (default 30)
    /// - `_SIGNING_KEY` or `_SIGNING_KEY_FILE`: optional PEM private key
    /// - `_SIGNING_KEY_ID`: optional key identifier for issued tokens
    ///
    /// Keys from `_PUBLIC_KEYS` and `_PUBLIC_KEYS_DIR` are merged; on a
    /// duplicate key identifier the inline JSON wins.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a variable or file is unreadable or the
    /// resulting configuration is invalid.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let mut public_keys = BTreeMap::new();

        if let Some(dir) = optional_var(&format!("{prefix}_PUBLIC_KEYS_DIR"))? {
            public_keys.extend(read_pem_dir(Path::new(&dir))?);
        }

        let inline_name = format!("{prefix}_PUBLIC_KEYS");
        if let Some(json) = optional_var(&inline_name)? {
            let inline: BTreeMap<String, String> =
                serde_json::from_str(&json).map_err(|e| ConfigError::EnvVarError {
                    name: inline_name.clone(),
                    reason: format!("expected a JSON object of kid to PEM: {e}"),
                })?;
            public_keys.extend(inline);
        }

        let grace_name = format!("{prefix}_GRACE_WINDOW_SECS");
        let grace_window_secs = match optional_var(&grace_name)? {
            Some(value) => value.trim().parse::<u64>().map_err(|e| ConfigError::EnvVarError {
                name: grace_name.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_GRACE_WINDOW_SECS,
        };

        // Try to get the signing key from file or directly
        let signing_key = match optional_var(&format!("{prefix}_SIGNING_KEY_FILE"))? {
            Some(path) => Some(read_file(path, "signing key")?),
            None => optional_var(&format!("{prefix}_SIGNING_KEY"))?,
        };
        let signing_key_id = optional_var(&format!("{prefix}_SIGNING_KEY_ID"))?;

        let config = GuardConfig {
            public_keys,
            grace_window_secs,
            signing_key,
            signing_key_id,
        };

        config.validate()?;
        tracing::debug!(
            prefix = prefix,
            keys = config.public_keys.len(),
            grace_window_secs = config.grace_window_secs,
            signing = config.signing_key.is_some(),
            "loaded configuration from environment"
        );
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks that at least one key is trusted, that every key looks like a
    /// PEM block and that the grace window is within bounds. Keys are only
    /// parsed when the configuration is turned into a verifier.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.public_keys.is_empty() {
            return Err(ConfigError::MissingPublicKeys);
        }

        for (kid, pem) in &self.public_keys {
            if kid.is_empty() {
                return Err(ConfigError::EmptyKeyId);
            }
            if !looks_like_pem(pem) {
                return Err(ConfigError::InvalidPem(kid.clone()));
            }
        }

        if self.grace_window_secs == 0 || self.grace_window_secs > MAX_GRACE_WINDOW_SECS {
            return Err(ConfigError::InvalidGraceWindow(self.grace_window_secs));
        }

        match (&self.signing_key, &self.signing_key_id) {
            (Some(pem), _) if !looks_like_pem(pem) => {
                Err(ConfigError::InvalidPem("signing_key".to_string()))
            }
            (None, Some(_)) => Err(ConfigError::SigningKeyIdWithoutKey),
            (_, Some(kid)) if kid.is_empty() => Err(ConfigError::EmptyKeyId),
            _ => Ok(()),
        }
    }
}

fn looks_like_pem(pem: &str) -> bool {
    let pem = pem.trim();
    pem.starts_with("-----BEGIN") && pem.contains("-----END")
}

static DEFAULT_CONFIG: OnceLock<GuardConfig> = OnceLock::new();

/// Set the process wide default configuration
///
/// # Errors
///
/// Returns [`ConfigError::AlreadyInitialized`] if a default was already set
pub fn set_default_config(config: GuardConfig) -> Result<(), ConfigError> {
    DEFAULT_CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)
}

/// Get the process wide default configuration, if one was set
pub fn get_default_config() -> Option<&'static GuardConfig> {
    DEFAULT_CONFIG.get()
}
