//! Argon2 hashing and the password strength rules applied on every password write.

use argon2::{
    password_hash::{PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, PasswordHash, Version,
};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::Sha256;

use super::errors::AuthError;

pub const ALGORITHM: &str = "argon2id";
pub const MIN_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "12345678", "123456789", "1234567890", "qwertyuiop",
    "iloveyou", "sunshine", "princess", "football", "baseball", "welcome1",
    "letmein1", "abc12345", "trustno1", "superman", "11111111", "00000000",
];

/// Argon2 cost knobs; tests use the minimum to stay fast.
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for HashCost {
    fn default() -> Self { Self { memory_kib: Params::DEFAULT_M_COST, iterations: Params::DEFAULT_T_COST } }
}

fn hasher(cost: HashCost) -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(cost.memory_kib, cost.iterations, 1, None)
        .map_err(|e| AuthError::HashError(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(cost: HashCost, plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(hasher(cost)?
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AuthError::HashError(e.to_string()))?
        .to_string())
}

/// Parameters are read back from the PHC string, so any cost verifies.
pub fn verify_password(hash: &str, plain: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::HashError(e.to_string()))?;
    Ok(Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok())
}

/// Bytes of HMAC output kept in a fingerprint.
const FINGERPRINT_BYTES: usize = 16;

/// Keyed digest of the stored hash, embedded in reset links so they die once the password changes.
///
/// Link claims are readable by anyone holding the link, so nothing of the hash itself is exposed.
pub fn fingerprint(secret: &str, hash: &str) -> Result<String, AuthError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|e| AuthError::HashError(e.to_string()))?;
    mac.update(hash.as_bytes());
    let digest = mac.finalize().into_bytes();
    Ok(hex::encode(&digest[..FINGERPRINT_BYTES]))
}

/// Strength problems with `plain`; empty when acceptable.
pub fn validate_strength(plain: &str, username: Option<&str>) -> Vec<String> {
    let mut problems = Vec::new();
    if let Some(name) = username {
        let lower = plain.to_lowercase();
        let name = name.to_lowercase();
        if !name.is_empty() && (lower == name || (name.len() >= 3 && lower.contains(&name))) {
            problems.push("The password is too similar to the username.".to_string());
        }
    }
    if plain.chars().count() < MIN_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_LENGTH} characters."
        ));
    }
    if COMMON_PASSWORDS.contains(&plain.to_lowercase().as_str()) {
        problems.push("This password is too common.".to_string());
    }
    if !plain.is_empty() && plain.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: HashCost = HashCost { memory_kib: 8, iterations: 1 };

    #[test]
    fn hash_then_verify() {
        let h = hash_password(FAST, "Correct-Horse-9").unwrap();
        assert!(h.starts_with("$argon2id$"));
        assert!(verify_password(&h, "Correct-Horse-9").unwrap());
        assert!(!verify_password(&h, "wrong").unwrap());
    }

    #[test]
    fn fingerprint_changes_with_salt() {
        let a = hash_password(FAST, "same-password-1").unwrap();
        let b = hash_password(FAST, "same-password-1").unwrap();
        assert_eq!(fingerprint("k", &a).unwrap().len(), 32);
        assert_eq!(fingerprint("k", &a).unwrap(), fingerprint("k", &a).unwrap());
        assert_ne!(fingerprint("k", &a).unwrap(), fingerprint("k", &b).unwrap());
    }

    #[test]
    fn fingerprint_is_keyed_and_hides_hash() {
        let h = hash_password(FAST, "same-password-1").unwrap();
        let fp = fingerprint("secret-one", &h).unwrap();
        assert_ne!(fp, fingerprint("secret-two", &h).unwrap());
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        let raw = h.rsplit('$').next().unwrap();
        assert!(!raw.contains(&fp[..8]));
        assert!(!fp.contains(&raw[..8]));
    }

    #[test]
    fn strength_rules() {
        assert!(validate_strength("Tr1cky-pass", Some("alice")).is_empty());
        assert_eq!(validate_strength("short", None).len(), 1);
        let numeric = validate_strength("12345678", None);
        assert!(numeric.contains(&"This password is entirely numeric.".to_string()));
        assert!(numeric.contains(&"This password is too common.".to_string()));
        assert_eq!(
            validate_strength("alice-rocks", Some("alice")),
            vec!["The password is too similar to the username.".to_string()]
        );
    }
}
