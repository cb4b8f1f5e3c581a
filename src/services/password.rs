//! Password hashing
//!
//! bcrypt with a configurable work factor. Hashes are stored in the modular
//! crypt format (`$2b$<cost>$...`), so the cost travels with each hash and
//! changing the configured cost only affects new passwords.

use anyhow::{Context, Result};

/// Hash a password with bcrypt at the given cost (4..=31).
///
/// ```ignore
/// use iykelib::services::password::hash_password;
///
/// let hash = hash_password("my_secure_password", 10)?;
/// assert!(hash.starts_with("$2b$10$"));
/// ```
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).context("Password hashing failed")
}

/// Verify a password against a stored hash.
///
/// A mismatch is `Ok(false)`; a malformed hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).context("Failed to verify password hash")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse", TEST_COST).unwrap();

        assert!(hash.starts_with("$2b$04$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same", TEST_COST).unwrap();
        let b = hash_password("same", TEST_COST).unwrap();

        assert_ne!(a, b);
        assert!(verify_password("same", &a).unwrap());
        assert!(verify_password("same", &b).unwrap());
    }

    #[test]
    fn test_invalid_hash_is_error() {
        assert!(verify_password("password", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn test_invalid_cost_is_error() {
        assert!(hash_password("password", 2).is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(8))]

            #[test]
            fn hash_verifies_only_original(password in "[ -~]{1,40}", other in "[ -~]{1,40}") {
                let hash = hash_password(&password, TEST_COST).unwrap();
                prop_assert!(verify_password(&password, &hash).unwrap());
                prop_assert_eq!(verify_password(&other, &hash).unwrap(), other == password);
            }
        }
    }
}
