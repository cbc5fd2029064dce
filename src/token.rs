//! Session token minting and validation.
//!
//! Tokens are opaque signed strings: `base64url(claims JSON) "." base64url(
//! HMAC-SHA256 tag)`. They are stateless to verify — any instance holding the
//! shared secret can validate one without a store round-trip — but a
//! still-valid token can be invalidated early by deleting its store mapping,
//! which is how explicit release works.
//!
//! The read path never errors: malformed input, a bad signature, and an
//! expired `exp_ms` all collapse to `None`, which callers treat as an
//! authentication failure.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use crate::error::SessionError;
use crate::model::SessionKey;
use crate::util::now_ms;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owning user id.
    pub sub: Uuid,
    /// Target resource id.
    pub resource_id: Uuid,
    /// Session kind discriminator.
    pub kind: String,
    pub iat_ms: u64,
    pub exp_ms: u64,
    /// Unique per mint, so a renewed token always differs from the one it
    /// replaces even within the same millisecond.
    pub jti: Uuid,
}

impl Claims {
    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            owner_user_id: self.sub,
            resource_id: self.resource_id,
            kind: self.kind.clone(),
        }
    }
}

/// A freshly minted token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at_ms: u64,
    pub expires_at_ms: u64,
}

/// Mints and validates signed session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: std::sync::Arc<[u8]>,
    ttl_ms: u64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_ms: u64) -> Self {
        Self {
            secret: secret.as_bytes().into(),
            ttl_ms,
        }
    }

    /// Mint a token for `key`. The expiry is `now + ttl`.
    pub fn generate(&self, key: &SessionKey) -> Result<IssuedToken, SessionError> {
        let issued_at_ms = now_ms();
        let claims = Claims {
            sub: key.owner_user_id,
            resource_id: key.resource_id,
            kind: key.kind.clone(),
            iat_ms: issued_at_ms,
            exp_ms: issued_at_ms + self.ttl_ms,
            jti: Uuid::new_v4(),
        };
        let payload = serde_json::to_vec(&claims).map_err(|e| SessionError::Token(e.to_string()))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
        let tag = self.sign(payload_b64.as_bytes())?;
        let tag_b64 = URL_SAFE_NO_PAD.encode(tag);
        Ok(IssuedToken {
            token: format!("{payload_b64}.{tag_b64}"),
            issued_at_ms,
            expires_at_ms: claims.exp_ms,
        })
    }

    /// Validate `token` and return its claims, or `None` if the token is
    /// malformed, carries a bad signature, or has expired.
    pub fn claims(&self, token: &str) -> Option<Claims> {
        let (payload_b64, tag_b64) = token.split_once('.')?;
        let presented_tag = URL_SAFE_NO_PAD.decode(tag_b64).ok()?;
        let expected_tag = self.sign(payload_b64.as_bytes()).ok()?;
        if !constant_time_eq(&expected_tag, &presented_tag) {
            debug!("Token signature mismatch");
            return None;
        }
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let claims: Claims = serde_json::from_slice(&payload).ok()?;
        if claims.exp_ms <= now_ms() {
            debug!("Token expired at {}", claims.exp_ms);
            return None;
        }
        Some(claims)
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SessionError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SessionError::Token(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
///
/// Always iterates over the full length of `expected` regardless of `provided`
/// length, so response times leak nothing about the tag.
fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mut diff = u8::from(expected.len() != provided.len());
    for i in 0..expected.len() {
        let p = if i < provided.len() {
            provided[i]
        } else {
            0xff
        };
        diff |= expected[i] ^ p;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("unit-test-secret", 60_000)
    }

    fn key() -> SessionKey {
        SessionKey::ssh(Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn generate_then_validate_round_trips_claims() {
        let issuer = issuer();
        let key = key();
        let issued = issuer.generate(&key).unwrap();

        let claims = issuer.claims(&issued.token).expect("token should validate");
        assert_eq!(claims.sub, key.owner_user_id);
        assert_eq!(claims.resource_id, key.resource_id);
        assert_eq!(claims.kind, "SSH");
        assert_eq!(claims.session_key(), key);
        assert_eq!(claims.exp_ms, issued.expires_at_ms);
    }

    #[test]
    fn every_mint_is_unique() {
        let issuer = issuer();
        let key = key();
        let a = issuer.generate(&key).unwrap();
        let b = issuer.generate(&key).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn malformed_tokens_yield_no_claims() {
        let issuer = issuer();
        assert!(issuer.claims("").is_none());
        assert!(issuer.claims("no-dot-here").is_none());
        assert!(issuer.claims("a.b.c").is_none());
        assert!(issuer.claims("!!!.###").is_none());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let issuer = issuer();
        let issued = issuer.generate(&key()).unwrap();
        let (payload, tag) = issued.token.split_once('.').unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(payload).unwrap();
        bytes[0] ^= 0x01;
        let forged = format!("{}.{tag}", URL_SAFE_NO_PAD.encode(&bytes));
        assert!(issuer.claims(&forged).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issued = issuer().generate(&key()).unwrap();
        let other = TokenIssuer::new("different-secret", 60_000);
        assert!(other.claims(&issued.token).is_none());
    }

    #[test]
    fn expired_token_yields_no_claims() {
        let issuer = TokenIssuer::new("unit-test-secret", 0);
        let issued = issuer.generate(&key()).unwrap();
        assert!(issuer.claims(&issued.token).is_none());
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
