//! The single signing algorithm family accepted by this crate.
//!
//! Tokens are signed with RSASSA-PKCS1-v1_5. Every other algorithm is
//! rejected before any cryptographic work happens, including symmetric
//! algorithms that would otherwise be verified against what the caller
//! believes is an RSA public key.

use jsonwebtoken::Algorithm;

/// Algorithms in the pinned RSA family.
pub const PINNED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Algorithm used by the issuer unless configured otherwise.
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Maps a header `alg` value to a member of the pinned family.
///
/// Matching is exact and case-sensitive, as the JOSE registry defines it.
pub fn pinned_algorithm(name: &str) -> Option<Algorithm> {
    match name {
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        _ => None,
    }
}

pub fn is_pinned(algorithm: Algorithm) -> bool {
    PINNED_ALGORITHMS.contains(&algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsa_family_is_accepted() {
        assert_eq!(pinned_algorithm("RS256"), Some(Algorithm::RS256));
        assert_eq!(pinned_algorithm("RS384"), Some(Algorithm::RS384));
        assert_eq!(pinned_algorithm("RS512"), Some(Algorithm::RS512));
        assert!(is_pinned(DEFAULT_ALGORITHM));
    }

    #[test]
    fn test_other_algorithms_are_rejected() {
        for name in ["none", "HS256", "HS512", "PS256", "ES256", "EdDSA", "rs256", ""] {
            assert_eq!(pinned_algorithm(name), None, "{name} must not be accepted");
        }
        assert!(!is_pinned(Algorithm::HS256));
        assert!(!is_pinned(Algorithm::PS256));
        assert!(!is_pinned(Algorithm::ES256));
    }
}
