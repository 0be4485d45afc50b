//! Claim sets and their re-serialization.
//!
//! Claims travel as a generic, order-preserving JSON object. The verifier
//! returns them as canonical JSON bytes which the caller deserializes into its
//! own claim structure. Shape errors at that last step (a numeric `role`
//! where the application expects a string, for example) are the caller's to
//! handle: they surface as a `serde_json::Error` from
//! [`VerifiedClaims::deserialize`], not as a [`TokenError`].

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TokenError;

/// Expiration instant claim name.
pub const EXPIRATION: &str = "exp";
/// Issued-at instant claim name.
pub const ISSUED_AT: &str = "iat";
/// Not-before instant claim name.
pub const NOT_BEFORE: &str = "nbf";

/// TokenTimeConfig allows control over token creation times and durations
#[derive(Debug, Clone, Copy)]
pub struct TokenTimeConfig {
    /// Optional custom start time (now time override)
    pub start_time: Option<i64>,
    /// Duration in seconds (default: 300 seconds = 5 minutes)
    pub duration: i64,
}

impl Default for TokenTimeConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            duration: 300, // 5 minutes in seconds
        }
    }
}

/// A mapping from claim name to JSON value.
///
/// Insertion order is kept, and unknown claims pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet {
    claims: Map<String, Value>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts any serializable value into a claim set.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::ClaimSerialization`] if the value does not
    /// serialize to a JSON object.
    pub fn from_serializable<T: Serialize + ?Sized>(claims: &T) -> Result<Self, TokenError> {
        match serde_json::to_value(claims)? {
            Value::Object(claims) => Ok(Self { claims }),
            other => Err(TokenError::ClaimSerialization(format!(
                "claims must serialize to a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Adds a claim, replacing any previous value under the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.claims.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.claims.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    /// The raw `exp` claim, if present. Not validated.
    pub fn expiration(&self) -> Option<&Value> {
        self.get(EXPIRATION)
    }

    /// The raw `iat` claim, if present. Not validated.
    pub fn issued_at(&self) -> Option<&Value> {
        self.get(ISSUED_AT)
    }

    /// The raw `nbf` claim, if present. Not validated.
    pub fn not_before(&self) -> Option<&Value> {
        self.get(NOT_BEFORE)
    }

    /// Sets `iat` to the configured start time and `exp` to start plus duration.
    pub fn with_time_config(self, time_config: TokenTimeConfig) -> Self {
        let start_time = time_config
            .start_time
            .unwrap_or_else(|| Utc::now().timestamp());
        let expiration = start_time + time_config.duration;
        self.with(ISSUED_AT, start_time).with(EXPIRATION, expiration)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.claims.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.claims
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(claims: Map<String, Value>) -> Self {
        Self { claims }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ClaimSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            claims: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Claims that passed every verification check.
///
/// Holds the canonical JSON encoding alongside the decoded claim set. Nothing
/// about how the token was validated is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    claims: ClaimSet,
    json: Vec<u8>,
}

impl VerifiedClaims {
    pub(crate) fn new(claims: ClaimSet) -> Result<Self, TokenError> {
        let json = serde_json::to_vec(&claims)
            .map_err(|e| TokenError::ClaimSerialization(e.to_string()))?;
        Ok(Self { claims, json })
    }

    /// Canonical JSON of the claim set.
    pub fn as_bytes(&self) -> &[u8] {
        &self.json
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.json
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn into_claims(self) -> ClaimSet {
        self.claims
    }

    /// Deserializes the claims into an application defined structure.
    ///
    /// # Errors
    ///
    /// Fails when the claims do not match the shape of `T`. This is a caller
    /// side schema mismatch, not a verification failure.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.json)
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
