//! Random API/session keys and HS256-signed one-time links.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header as JwtHeader, Validation};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use super::errors::AuthError;

/// 40 lowercase hex characters.
pub fn generate_token_key() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 32 lowercase hex characters.
pub fn generate_session_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPurpose {
    PasswordReset,
    EmailVerification,
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkClaims {
    sub: String,
    purpose: LinkPurpose,
    /// Password-hash fingerprint for resets, the address for verification.
    bind: String,
    exp: usize,
}

/// Decoded link contents after signature, expiry and purpose checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedLink {
    pub user_id: i32,
    pub bind: String,
}

#[derive(Clone)]
pub struct LinkSigner {
    secret: String,
    reset_ttl: Duration,
    verify_ttl: Duration,
}

impl LinkSigner {
    pub fn new(secret: impl Into<String>, reset_ttl: Duration, verify_ttl: Duration) -> Self {
        Self { secret: secret.into(), reset_ttl, verify_ttl }
    }

    pub fn sign(&self, purpose: LinkPurpose, user_id: i32, bind: &str) -> Result<String, AuthError> {
        let ttl = match purpose {
            LinkPurpose::PasswordReset => self.reset_ttl,
            LinkPurpose::EmailVerification => self.verify_ttl,
        };
        let exp = (Utc::now() + ttl).timestamp().max(0) as usize;
        let claims = LinkClaims { sub: user_id.to_string(), purpose, bind: bind.to_string(), exp };
        encode(&JwtHeader::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| AuthError::TokenError(e.to_string()))
    }

    /// `None` for a bad signature, an expired link or the wrong purpose.
    pub fn verify(&self, purpose: LinkPurpose, token: &str) -> Option<VerifiedLink> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<LinkClaims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation).ok()?;
        if data.claims.purpose != purpose {
            return None;
        }
        let user_id = data.claims.sub.parse().ok()?;
        Some(VerifiedLink { user_id, bind: data.claims.bind })
    }
}
