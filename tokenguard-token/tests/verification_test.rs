use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokenguard_token::{
    decode_claims_json, encode_segment, inspect_header, issue_token, verify_token, Algorithm,
    ClaimSet, Issuer, PrivateKey, PublicKey, TokenError, TrustedKeyStore, Verifier,
};

const PRIVATE_PEM: &[u8] = include_bytes!("fixtures/private_key.pem");
const PUBLIC_PEM: &[u8] = include_bytes!("fixtures/public_key.pem");
const OTHER_PRIVATE_PEM: &[u8] = include_bytes!("fixtures/other_private_key.pem");
const JWK: &str = include_str!("fixtures/public_key.jwk.json");

#[derive(Debug, Deserialize)]
struct CustomClaims {
    sub: String,
    name: String,
    role: String,
    #[allow(dead_code)]
    exp: Option<i64>,
}

fn trusted_keys() -> TrustedKeyStore {
    TrustedKeyStore::new().with_key("foo", PublicKey::from_rsa_pem(PUBLIC_PEM).unwrap())
}

fn sign(kid: Option<&str>, claims: &Value) -> String {
    let key = PrivateKey::from_rsa_pem(PRIVATE_PEM).unwrap();
    let issuer = Issuer::new(key);
    let issuer = match kid {
        Some(kid) => issuer.with_key_id(kid),
        None => issuer,
    };
    issuer.issue(claims).unwrap()
}

fn sign_with(algorithm: Algorithm, key: &EncodingKey, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(algorithm);
    header.kid = Some(kid.to_string());
    encode(&header, claims, key).unwrap()
}

fn in_a_day() -> i64 {
    (Utc::now() + Duration::hours(24)).timestamp()
}

#[test]
fn test_round_trip_returns_the_issued_claims() {
    let claims = ClaimSet::new()
        .with("sub", "1234567890")
        .with("name", "John Doe")
        .with("admin", true)
        .with("scopes", json!(["read", "write"]))
        .with("profile", json!({"locale": "it", "age": 42}))
        .with("exp", in_a_day());

    let token = Issuer::new(PrivateKey::from_rsa_pem(PRIVATE_PEM).unwrap())
        .with_key_id("foo")
        .issue(&claims)
        .unwrap();

    let verified = verify_token(&token, &trusted_keys()).unwrap();
    assert_eq!(verified.claims(), &claims);

    let bytes = decode_claims_json(&token, &trusted_keys()).unwrap();
    let decoded: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(decoded, serde_json::to_value(&claims).unwrap());
}

#[test]
fn test_unknown_kid_is_rejected() {
    let token = sign(
        Some("bar"),
        &json!({"sub": "1234567890", "name": "John Doe", "admin": true, "exp": in_a_day()}),
    );
    assert_eq!(
        verify_token(&token, &trusted_keys()),
        Err(TokenError::UnknownKeyId("bar".to_string()))
    );
}

#[test]
fn test_unknown_kid_wins_over_a_bad_signature() {
    let other = EncodingKey::from_rsa_pem(OTHER_PRIVATE_PEM).unwrap();
    let token = sign_with(Algorithm::RS256, &other, "bar", &json!({"exp": in_a_day()}));
    assert!(matches!(
        verify_token(&token, &trusted_keys()),
        Err(TokenError::UnknownKeyId(_))
    ));
}

#[test]
fn test_missing_kid_is_rejected() {
    let token = sign(None, &json!({"sub": "1", "exp": in_a_day()}));
    assert_eq!(verify_token(&token, &trusted_keys()), Err(TokenError::MissingKeyId));

    let token = sign(Some(""), &json!({"sub": "1", "exp": in_a_day()}));
    assert_eq!(verify_token(&token, &trusted_keys()), Err(TokenError::MissingKeyId));
}

#[test]
fn test_symmetric_algorithm_is_rejected_even_with_a_known_kid() {
    // Classic confusion: HMAC keyed with the public key bytes.
    let forged_key = EncodingKey::from_secret(PUBLIC_PEM);
    let token = sign_with(Algorithm::HS256, &forged_key, "foo", &json!({"exp": in_a_day()}));

    assert_eq!(
        verify_token(&token, &trusted_keys()),
        Err(TokenError::UnsupportedAlgorithm("HS256".to_string()))
    );
}

#[test]
fn test_rsa_pss_is_outside_the_pinned_family() {
    let key = EncodingKey::from_rsa_pem(PRIVATE_PEM).unwrap();
    let token = sign_with(Algorithm::PS256, &key, "foo", &json!({"exp": in_a_day()}));
    assert_eq!(
        verify_token(&token, &trusted_keys()),
        Err(TokenError::UnsupportedAlgorithm("PS256".to_string()))
    );
}

#[test]
fn test_unsigned_token_is_rejected() {
    let header = encode_segment(br#"{"alg":"none","kid":"foo"}"#);
    let payload = encode_segment(format!(r#"{{"exp":{}}}"#, in_a_day()).as_bytes());
    let token = format!("{header}.{payload}.AAAA");

    assert_eq!(
        verify_token(&token, &trusted_keys()),
        Err(TokenError::UnsupportedAlgorithm("none".to_string()))
    );
}

#[test]
fn test_signature_from_an_untrusted_key_is_rejected() {
    let other = EncodingKey::from_rsa_pem(OTHER_PRIVATE_PEM).unwrap();
    let token = sign_with(Algorithm::RS256, &other, "foo", &json!({"exp": in_a_day()}));
    assert_eq!(verify_token(&token, &trusted_keys()), Err(TokenError::InvalidSignature));
}

#[test]
fn test_tampered_payload_is_rejected() {
    let token = sign(Some("foo"), &json!({"sub": "alice", "exp": in_a_day()}));
    let parts: Vec<&str> = token.split('.').collect();
    let forged_payload = encode_segment(format!(r#"{{"sub":"root","exp":{}}}"#, in_a_day()).as_bytes());
    let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

    assert_eq!(verify_token(&forged, &trusted_keys()), Err(TokenError::InvalidSignature));
}

#[test]
fn test_signature_is_checked_before_expiry() {
    let other = EncodingKey::from_rsa_pem(OTHER_PRIVATE_PEM).unwrap();
    let expired = (Utc::now() - Duration::hours(24)).timestamp();
    let token = sign_with(Algorithm::RS256, &other, "foo", &json!({"exp": expired}));
    assert_eq!(verify_token(&token, &trusted_keys()), Err(TokenError::InvalidSignature));
}

#[test]
fn test_expired_exp_is_rejected() {
    let token = sign(
        Some("foo"),
        &json!({
            "sub": "1234567890",
            "name": "John Doe",
            "admin": true,
            "exp": (Utc::now() - Duration::hours(24)).timestamp(),
        }),
    );
    let err = verify_token(&token, &trusted_keys()).unwrap_err();
    assert_eq!(err, TokenError::TokenExpired { claim: "exp" });
    assert!(err.to_string().contains("expired"));
}

#[test]
fn test_iat_only_tokens_live_for_the_grace_window() {
    let now = Utc::now();
    let verifier = Verifier::new().at_time(now);

    let stale = sign(Some("foo"), &json!({"sub": "1", "iat": (now - Duration::seconds(31)).timestamp()}));
    assert_eq!(
        verifier.verify(&stale, &trusted_keys()),
        Err(TokenError::TokenExpired { claim: "iat" })
    );

    let fresh = sign(Some("foo"), &json!({"sub": "1", "iat": (now - Duration::seconds(10)).timestamp()}));
    assert!(verifier.verify(&fresh, &trusted_keys()).is_ok());

    let old = sign(Some("foo"), &json!({"sub": "1", "iat": (now - Duration::hours(24)).timestamp()}));
    assert!(verify_token(&old, &trusted_keys()).unwrap_err().is_expired());
}

#[test]
fn test_token_without_exp_and_iat_is_rejected() {
    let token = sign(
        Some("foo"),
        &json!({"sub": "1234567890", "name": "John Doe", "admin": true}),
    );
    let err = verify_token(&token, &trusted_keys()).unwrap_err();
    assert_eq!(err, TokenError::MissingTemporalClaim);
    assert!(err.to_string().contains("neither 'exp' nor 'iat'"));
}

#[test]
fn test_future_nbf_is_not_yet_valid() {
    let now = Utc::now();
    let verifier = Verifier::new().at_time(now);

    let early = sign(
        Some("foo"),
        &json!({"sub": "1", "exp": in_a_day(), "nbf": (now + Duration::hours(1)).timestamp()}),
    );
    let err = verifier.verify(&early, &trusted_keys()).unwrap_err();
    assert_eq!(err, TokenError::NotYetValid);
    assert!(!err.is_expired());

    let started = sign(
        Some("foo"),
        &json!({"sub": "1", "exp": in_a_day(), "nbf": (now - Duration::hours(1)).timestamp()}),
    );
    assert!(verifier.verify(&started, &trusted_keys()).is_ok());
}

#[test]
fn test_unparsable_nbf_is_invalid_claims() {
    let token = sign(Some("foo"), &json!({"sub": "1", "exp": in_a_day(), "nbf": "x"}));
    assert!(matches!(
        verify_token(&token, &trusted_keys()),
        Err(TokenError::InvalidClaims { claim, .. }) if claim == "nbf"
    ));
}

#[test]
fn test_header_fields_of_any_type_are_accepted() {
    let key = EncodingKey::from_rsa_pem(PRIVATE_PEM).unwrap();
    let header = encode_segment(br#"{"alg":"RS256","kid":"foo","typ":"JWT","ver":1,"b64":true}"#);
    let payload = encode_segment(json!({"sub": "1", "exp": in_a_day()}).to_string().as_bytes());
    let signing_input = format!("{header}.{payload}");
    let signature =
        jsonwebtoken::crypto::sign(signing_input.as_bytes(), &key, Algorithm::RS256).unwrap();
    let token = format!("{signing_input}.{signature}");

    let verified = verify_token(&token, &trusted_keys()).unwrap();
    assert_eq!(verified.claims().get("sub"), Some(&json!("1")));

    // Same header, signature from a key the store does not trust.
    let other = EncodingKey::from_rsa_pem(OTHER_PRIVATE_PEM).unwrap();
    let forged_signature =
        jsonwebtoken::crypto::sign(signing_input.as_bytes(), &other, Algorithm::RS256).unwrap();
    let forged = format!("{signing_input}.{forged_signature}");
    assert_eq!(verify_token(&forged, &trusted_keys()), Err(TokenError::InvalidSignature));
}

#[test]
fn test_signature_that_is_not_base64_is_malformed() {
    let token = sign(Some("foo"), &json!({"sub": "1", "exp": in_a_day()}));
    let (signing_input, _) = token.rsplit_once('.').unwrap();
    let token = format!("{signing_input}.!!not-base64!!");
    assert!(matches!(
        verify_token(&token, &trusted_keys()),
        Err(TokenError::MalformedToken(_))
    ));
}

#[test]
fn test_unparsable_exp_is_invalid_claims() {
    let token = sign(Some("foo"), &json!({"sub": "1", "exp": "tomorrow"}));
    assert!(matches!(
        verify_token(&token, &trusted_keys()),
        Err(TokenError::InvalidClaims { claim, .. }) if claim == "exp"
    ));
}

#[test]
fn test_malformed_tokens() {
    for token in ["", "not-a-token", "a.b", "a.b.c.d", "!!!.???.sig"] {
        assert!(
            matches!(verify_token(token, &trusted_keys()), Err(TokenError::MalformedToken(_))),
            "{token:?}"
        );
    }
}

#[test]
fn test_claim_shape_is_the_callers_concern() {
    let token = sign(
        Some("foo"),
        &json!({
            "sub": "1234567890",
            "name": "John Doe",
            "role": 10,
            "exp": in_a_day(),
        }),
    );

    let verified = verify_token(&token, &trusted_keys()).unwrap();
    let err = verified.deserialize::<CustomClaims>().unwrap_err();
    assert!(err.to_string().contains("invalid type"));
}

#[test]
fn test_typed_claims_round_trip() {
    let token = sign(
        Some("foo"),
        &json!({
            "sub": "1234567890",
            "name": "John Doe",
            "role": "admin",
            "exp": in_a_day(),
        }),
    );

    let raw = decode_claims_json(&token, &trusted_keys()).unwrap();
    let claims: CustomClaims = serde_json::from_slice(&raw).unwrap();
    assert_eq!(claims.sub, "1234567890");
    assert_eq!(claims.name, "John Doe");
    assert_eq!(claims.role, "admin");
}

#[test]
fn test_jwk_components_verify_tokens() {
    let jwk: Value = serde_json::from_str(JWK).unwrap();
    let key = PublicKey::from_rsa_components(jwk["n"].as_str().unwrap(), jwk["e"].as_str().unwrap()).unwrap();
    let keys = TrustedKeyStore::new().with_key(jwk["kid"].as_str().unwrap(), key);

    let token = sign(Some("foo"), &json!({"sub": "1", "exp": in_a_day()}));
    assert!(verify_token(&token, &keys).is_ok());
}

#[test]
fn test_issue_token_and_inspect_header() {
    let key = PrivateKey::from_rsa_pem(PRIVATE_PEM).unwrap();
    let token = issue_token(&json!({"sub": "1", "exp": in_a_day()}), &key).unwrap();

    let header = inspect_header(&token).unwrap();
    assert_eq!(header.alg, "RS256");
    assert_eq!(header.typ.as_deref(), Some("JWT"));
    assert_eq!(header.kid, None);
}

#[test]
fn test_concurrent_verification_shares_keys_and_verifier() {
    let keys = Arc::new(trusted_keys());
    let verifier = Verifier::new();
    let token = sign(Some("foo"), &json!({"sub": "1", "exp": in_a_day()}));

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let keys = Arc::clone(&keys);
            let verifier = &verifier;
            let token = &token;
            scope.spawn(move || {
                assert!(verifier.verify(token, &keys).is_ok());
            });
        }
    });
}
