//! Member password policy and argon2 hashing.

use argon2::password_hash::{rand_core::OsRng, Error as HashError, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

pub const MIN_PASSWORD_CHARS: usize = 8;
pub const MAX_PASSWORD_CHARS: usize = 128;

/// Why a candidate password was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordWeakness {
    Length,
    NoLetter,
    NoDigit,
}

impl PasswordWeakness {
    /// Code reported in validation error details.
    pub fn code(self) -> &'static str {
        match self {
            PasswordWeakness::Length => "password_invalid_length",
            PasswordWeakness::NoLetter | PasswordWeakness::NoDigit => "password_too_weak",
        }
    }
}

/// 8-128 characters with at least one letter and one digit.
pub fn check_strength(password: &str) -> Result<(), PasswordWeakness> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&len) {
        return Err(PasswordWeakness::Length);
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err(PasswordWeakness::NoLetter);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordWeakness::NoDigit);
    }
    Ok(())
}

/// PHC-format argon2id hash with a fresh salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow::anyhow!("Failed to hash password: {}", err))
}

/// `Ok(false)` on a mismatch; `Err` only when the stored hash is unusable.
pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| anyhow::anyhow!("Stored password hash is malformed: {}", err))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(err) => Err(anyhow::anyhow!("Password verification error: {}", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_reports_the_first_failing_rule() {
        assert_eq!(check_strength("a1b2"), Err(PasswordWeakness::Length));
        assert_eq!(check_strength(&"a1".repeat(65)), Err(PasswordWeakness::Length));
        assert_eq!(check_strength("1234567890"), Err(PasswordWeakness::NoLetter));
        assert_eq!(check_strength("clubhouse!"), Err(PasswordWeakness::NoDigit));
        assert_eq!(check_strength("club2026pass"), Ok(()));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert_eq!(check_strength("ñññññññ1"), Ok(()));
    }

    #[test]
    fn stored_hash_verifies_only_the_original_password() {
        let hash = hash_password("club2026pass").expect("hash");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("club2026pass", &hash).expect("verify"));
        assert!(!verify_password("club2027pass", &hash).expect("verify"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("club2026pass", "not-a-phc-string").is_err());
    }
}
