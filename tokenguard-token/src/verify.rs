use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::crypto;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::algorithm::pinned_algorithm;
use crate::claims::{json_type, ClaimSet, VerifiedClaims, EXPIRATION, ISSUED_AT, NOT_BEFORE};
use crate::error::TokenError;
use crate::keys::{KeyResolver, PublicKey};
use crate::utils::decode_segment;

/// How long a token carrying only `iat` is trusted after it was issued.
pub const DEFAULT_GRACE_WINDOW_SECS: i64 = 30;

/// Header fields read before the signature is checked.
///
/// `alg` is kept as the raw string so an algorithm this crate has never heard
/// of is still reported by name. Other header fields are ignored whatever
/// their type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub typ: Option<String>,
}

/// A token split into its parts. Nothing in here is trusted yet.
#[derive(Debug)]
pub(crate) struct ParsedToken<'a> {
    pub header: TokenHeader,
    pub claims: ClaimSet,
    /// `header.payload`, the bytes the signature covers.
    pub signing_input: &'a str,
    pub signature: &'a str,
}

pub(crate) fn parse_token(token: &str) -> Result<ParsedToken<'_>, TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::malformed(
            "expected three dot separated segments",
        ));
    };
    if signature.is_empty() {
        return Err(TokenError::malformed("signature segment is empty"));
    }
    decode_segment(signature, "signature")?;

    let header_bytes = decode_segment(header, "header")?;
    let header: TokenHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| TokenError::malformed(format!("header is not a valid JSON object: {e}")))?;

    let payload_bytes = decode_segment(payload, "payload")?;
    let claims: Map<String, Value> = serde_json::from_slice(&payload_bytes)
        .map_err(|e| TokenError::malformed(format!("payload is not a JSON object: {e}")))?;

    Ok(ParsedToken {
        header,
        claims: claims.into(),
        signing_input: &token[..token.len() - signature.len() - 1],
        signature,
    })
}

/// Verifies signed tokens against a set of trusted keys.
///
/// The verifier only carries policy. Keys are supplied per call through a
/// [`KeyResolver`], so one verifier can be shared freely between threads.
///
/// Checks run in a fixed order and stop at the first failure:
///
/// 1. the token parses into header, claims and signature
/// 2. the header names a key (`kid`)
/// 3. the resolver knows that key
/// 4. the header algorithm belongs to the pinned RSA family
/// 5. the signature verifies with the resolved key
/// 6. the token is within its validity period: a present `nbf` must not be
///    in the future, `exp` must be in the future, or, without `exp`, `iat`
///    must be no older than the grace window. A token with neither `exp`
///    nor `iat` is rejected.
/// 7. the claims are re-encoded as canonical JSON
///
/// # Example
///
/// ```no_run
/// use tokenguard_token::{PublicKey, TrustedKeyStore, Verifier};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let key = PublicKey::from_rsa_pem(&std::fs::read("keys/public_key.pem")?)?;
/// let keys = TrustedKeyStore::new().with_key("foo", key);
///
/// let verified = Verifier::new().verify("eyJhbGciOi...", &keys)?;
/// println!("{}", String::from_utf8_lossy(verified.as_bytes()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Verifier {
    grace_window: Duration,
    now: Option<DateTime<Utc>>,
}

impl Default for Verifier {
    fn default() -> Self {
        Self {
            grace_window: Duration::seconds(DEFAULT_GRACE_WINDOW_SECS),
            now: None,
        }
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long a token without `exp` is accepted after its `iat`.
    pub fn with_grace_window(mut self, grace_window: std::time::Duration) -> Self {
        self.grace_window = Duration::from_std(grace_window).unwrap_or(Duration::MAX);
        self
    }

    /// Evaluates temporal claims against a fixed instant instead of the clock.
    pub fn at_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn grace_window(&self) -> Duration {
        self.grace_window
    }

    /// Verifies `token` and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns the [`TokenError`] of the first check that fails. See the type
    /// level documentation for the order.
    pub fn verify<R>(&self, token: &str, keys: &R) -> Result<VerifiedClaims, TokenError>
    where
        R: KeyResolver + ?Sized,
    {
        let parsed = parse_token(token).inspect_err(|e| debug!(error = %e, "rejected token"))?;

        let kid = match parsed.header.kid.as_deref() {
            Some(kid) if !kid.is_empty() => kid,
            _ => {
                debug!(alg = %parsed.header.alg, "rejected token without kid");
                return Err(TokenError::MissingKeyId);
            }
        };

        let Some(key) = keys.resolve(kid) else {
            debug!(kid = %kid, "rejected token with unknown kid");
            return Err(TokenError::UnknownKeyId(kid.to_string()));
        };

        let Some(algorithm) = pinned_algorithm(&parsed.header.alg) else {
            warn!(
                kid = %kid,
                alg = %parsed.header.alg,
                "rejected token signed with an algorithm outside the pinned family"
            );
            return Err(TokenError::UnsupportedAlgorithm(parsed.header.alg));
        };

        verify_signature(&parsed, &key, algorithm).inspect_err(|e| {
            warn!(
                kid = %kid,
                alg = ?algorithm,
                fingerprint = %key.fingerprint(),
                error = %e,
                "token signature rejected"
            )
        })?;

        let now = self.now.unwrap_or_else(Utc::now);
        self.check_validity_period(&parsed.claims, now)
            .inspect_err(|e| debug!(kid = %kid, error = %e, "rejected token outside its validity period"))?;

        let verified = VerifiedClaims::new(parsed.claims)?;
        debug!(kid = %kid, alg = ?algorithm, "token verified");
        Ok(verified)
    }

    fn check_validity_period(&self, claims: &ClaimSet, now: DateTime<Utc>) -> Result<(), TokenError> {
        if let Some(value) = claims.not_before() {
            if now < numeric_date(NOT_BEFORE, value)? {
                return Err(TokenError::NotYetValid);
            }
        }

        if let Some(value) = claims.expiration() {
            let expires_at = numeric_date(EXPIRATION, value)?;
            if expires_at <= now {
                return Err(TokenError::TokenExpired { claim: EXPIRATION });
            }
            return Ok(());
        }

        if let Some(value) = claims.issued_at() {
            let issued_at = numeric_date(ISSUED_AT, value)?;
            let oldest_accepted = now
                .checked_sub_signed(self.grace_window)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            if issued_at < oldest_accepted {
                return Err(TokenError::TokenExpired { claim: ISSUED_AT });
            }
            return Ok(());
        }

        Err(TokenError::MissingTemporalClaim)
    }
}

fn verify_signature(
    parsed: &ParsedToken<'_>,
    key: &PublicKey,
    algorithm: Algorithm,
) -> Result<(), TokenError> {
    // Only the signature is checked here; header and claims were decoded while parsing.
    match crypto::verify(
        parsed.signature,
        parsed.signing_input.as_bytes(),
        key.decoding_key(),
        algorithm,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => Err(TokenError::InvalidSignature),
        Err(e) => match e.kind() {
            ErrorKind::Base64(_) => Err(TokenError::malformed(format!("signature segment: {e}"))),
            // A key that cannot check this signature is as good as a wrong key.
            _ => Err(TokenError::InvalidSignature),
        },
    }
}

/// Parses a JWT NumericDate: seconds since the epoch, possibly fractional.
fn numeric_date(claim: &str, value: &Value) -> Result<DateTime<Utc>, TokenError> {
    let Value::Number(number) = value else {
        return Err(TokenError::invalid_claim(
            claim,
            format!("expected a numeric date, got {}", json_type(value)),
        ));
    };
    let seconds = number
        .as_f64()
        .ok_or_else(|| TokenError::invalid_claim(claim, "not a finite number"))?;
    let millis = seconds * 1000.0;
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return Err(TokenError::invalid_claim(claim, "numeric date out of range"));
    }
    DateTime::from_timestamp_millis(millis as i64)
        .ok_or_else(|| TokenError::invalid_claim(claim, "numeric date out of range"))
}
