//! Session tokens: Ed25519-signed, time-bounded principal credentials
//!
//! Minting happens in the external auth service ([`AuthIssuer`] is the
//! reference implementation it and the tests share); the relay itself
//! only ever verifies. Expiry is always compared against the relay's own
//! clock — a client-supplied timestamp can't extend a token's life.
//!
//! Wire form: `base64url(claims_json).base64url(signature)`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use rz_core::types::PrincipalId;

use crate::error::{RelayError, RelayResult};

/// What a token asserts: a principal bound to an issuance/expiry window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub principal: PrincipalId,
    /// Unix seconds
    pub issued_at: u64,
    /// Unix seconds; the token is invalid at and after this instant
    pub expires_at: u64,
}

/// A decoded (not yet verified) token.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub claims: TokenClaims,
    claims_bytes: Vec<u8>,
    signature: Signature,
}

impl SessionToken {
    /// Split and decode the wire form without verifying anything.
    pub fn decode(token: &str) -> RelayResult<Self> {
        let (claims_b64, sig_b64) = token
            .split_once('.')
            .ok_or_else(|| RelayError::Authentication("malformed token".into()))?;

        let claims_bytes = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|e| RelayError::Authentication(format!("token claims base64: {e}")))?;
        let claims: TokenClaims = serde_json::from_slice(&claims_bytes)
            .map_err(|e| RelayError::Authentication(format!("token claims json: {e}")))?;

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|e| RelayError::Authentication(format!("token signature base64: {e}")))?;
        let sig_array: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| RelayError::Authentication("token signature length".into()))?;

        Ok(Self { claims, claims_bytes, signature: Signature::from_bytes(&sig_array) })
    }
}

/// Token minting. Lives with the auth collaborator, not the relay.
pub struct AuthIssuer {
    signing_key: SigningKey,
}

impl AuthIssuer {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn generate() -> Self {
        Self { signing_key: SigningKey::generate(&mut rand::rngs::OsRng) }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Mint a token for `principal`, valid for `ttl_secs` from `now`.
    pub fn mint(&self, principal: &PrincipalId, now: u64, ttl_secs: u64) -> RelayResult<String> {
        let claims = TokenClaims {
            principal: principal.clone(),
            issued_at: now,
            expires_at: now.saturating_add(ttl_secs),
        };
        let claims_bytes = serde_json::to_vec(&claims)
            .map_err(|e| RelayError::Authentication(format!("encoding claims: {e}")))?;
        let signature = self.signing_key.sign(&claims_bytes);

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&claims_bytes),
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

/// Token verification. This is the relay's entire trust anchor.
#[derive(Clone)]
pub struct TokenVerifier {
    verifying_key: VerifyingKey,
}

impl TokenVerifier {
    pub fn new(verifying_key: VerifyingKey) -> Self {
        Self { verifying_key }
    }

    /// Build a verifier from the auth service's hex-encoded public key
    /// (as carried in relay config).
    pub fn from_hex(hex: &str) -> RelayResult<Self> {
        if hex.len() != 64 {
            return Err(RelayError::Authentication(format!(
                "verifying key must be 64 hex chars, got {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk)
                .map_err(|_| RelayError::Authentication("verifying key hex".into()))?;
            bytes[i] = u8::from_str_radix(s, 16)
                .map_err(|_| RelayError::Authentication("verifying key hex".into()))?;
        }
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| RelayError::Authentication(format!("verifying key: {e}")))?;
        Ok(Self::new(key))
    }

    /// Verify signature and expiry, returning the claims on success.
    ///
    /// `now` must come from the server clock.
    pub fn verify(&self, token: &str, now: u64) -> RelayResult<TokenClaims> {
        let decoded = SessionToken::decode(token)?;

        self.verifying_key
            .verify(&decoded.claims_bytes, &decoded.signature)
            .map_err(|_| RelayError::Authentication("bad token signature".into()))?;

        if now >= decoded.claims.expires_at {
            return Err(RelayError::Authentication("token expired".into()));
        }

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> PrincipalId {
        PrincipalId::new("alice")
    }

    #[test]
    fn test_mint_and_verify() {
        let issuer = AuthIssuer::generate();
        let verifier = TokenVerifier::new(issuer.verifying_key());

        let token = issuer.mint(&alice(), 1000, 3600).unwrap();
        let claims = verifier.verify(&token, 2000).unwrap();

        assert_eq!(claims.principal, alice());
        assert_eq!(claims.issued_at, 1000);
        assert_eq!(claims.expires_at, 4600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = AuthIssuer::generate();
        let verifier = TokenVerifier::new(issuer.verifying_key());

        let token = issuer.mint(&alice(), 1000, 3600).unwrap();
        let result = verifier.verify(&token, 4600);

        assert!(matches!(result, Err(RelayError::Authentication(_))));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let issuer = AuthIssuer::generate();
        let other = AuthIssuer::generate();
        let verifier = TokenVerifier::new(other.verifying_key());

        let token = issuer.mint(&alice(), 1000, 3600).unwrap();
        assert!(matches!(verifier.verify(&token, 2000), Err(RelayError::Authentication(_))));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let issuer = AuthIssuer::generate();
        let verifier = TokenVerifier::new(issuer.verifying_key());

        let token = issuer.mint(&alice(), 1000, 3600).unwrap();

        // Re-encode the claims with a different principal, keep the signature.
        let (_, sig) = token.split_once('.').unwrap();
        let forged_claims = serde_json::to_vec(&TokenClaims {
            principal: PrincipalId::new("mallory"),
            issued_at: 1000,
            expires_at: 4600,
        })
        .unwrap();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(&forged_claims), sig);

        assert!(matches!(verifier.verify(&forged, 2000), Err(RelayError::Authentication(_))));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let verifier = TokenVerifier::new(AuthIssuer::generate().verifying_key());
        assert!(verifier.verify("not-a-token", 0).is_err());
        assert!(verifier.verify("a.b", 0).is_err());
    }

    #[test]
    fn test_verifier_from_hex_roundtrip() {
        let issuer = AuthIssuer::generate();
        let hex: String =
            issuer.verifying_key().to_bytes().iter().map(|b| format!("{b:02x}")).collect();

        let verifier = TokenVerifier::from_hex(&hex).unwrap();
        let token = issuer.mint(&alice(), 0, 60).unwrap();
        assert!(verifier.verify(&token, 30).is_ok());
    }
}
