//! Password hashing and strength scoring

use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use serde::Serialize;

/// Shortest password accepted at sign-up and password change
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Lowest strength score accepted for new passwords
pub const MIN_PASSWORD_SCORE: u8 = 3;

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{};':\"\\|,.<>/?";

/// Which strength requirements a password satisfies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordRequirements {
    pub length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub number: bool,
    pub special: bool,
}

/// Password strength: number of satisfied requirements plus a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub score: u8,
    pub label: &'static str,
    pub requirements: PasswordRequirements,
}

impl PasswordStrength {
    pub fn is_acceptable(&self) -> bool {
        self.score >= MIN_PASSWORD_SCORE
    }
}

/// Score a password against the five requirements
pub fn password_strength(password: &str) -> PasswordStrength {
    let requirements = PasswordRequirements {
        length: password.chars().count() >= 8,
        uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
        lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
        number: password.chars().any(|c| c.is_ascii_digit()),
        special: password.chars().any(|c| SPECIAL_CHARS.contains(c)),
    };

    let score = [
        requirements.length,
        requirements.uppercase,
        requirements.lowercase,
        requirements.number,
        requirements.special,
    ]
    .iter()
    .filter(|met| **met)
    .count() as u8;

    let label = match score {
        0 | 1 => "Very Weak",
        2 => "Weak",
        3 => "Fair",
        4 => "Good",
        _ => "Strong",
    };

    PasswordStrength {
        score,
        label,
        requirements,
    }
}

/// Hash a password into a PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Check a password against a stored PHC string.
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is not a valid PHC string");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_labels() {
        assert_eq!(password_strength("").label, "Very Weak");
        assert_eq!(password_strength("").score, 0);
        assert_eq!(password_strength("abc").score, 1);
        assert_eq!(password_strength("abc1").label, "Weak");
        assert_eq!(password_strength("abcdefg1").label, "Fair");
        assert_eq!(password_strength("Abcdefg1").label, "Good");
        assert_eq!(password_strength("Abcdefg1!").label, "Strong");
        assert_eq!(password_strength("Abcdefg1!").score, 5);
    }

    #[test]
    fn test_strength_requirements() {
        let s = password_strength("a\\b");
        assert!(s.requirements.special);
        assert!(s.requirements.lowercase);
        assert!(!s.requirements.uppercase);
        assert!(!s.requirements.number);
        assert!(!s.requirements.length);
    }

    #[test]
    fn test_acceptable_threshold() {
        assert!(!password_strength("test").is_acceptable());
        assert!(password_strength("abc123!").is_acceptable());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret!Pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret!Pass", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
