// Salted password hashes stored as `<salt>$<sha512 hex>`

use sha2::{Digest, Sha512};
use uuid::Uuid;

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest(&salt, password))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match hash.split_once('$') {
        Some((salt, expected)) => digest(salt, password) == expected,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_salted() {
        let first = hash_password("secret");
        let second = hash_password("secret");
        assert_ne!(first, second);
        assert!(verify_password("secret", &first));
        assert!(verify_password("secret", &second));
    }

    #[test]
    fn test_wrong_password() {
        let hash = hash_password("secret");
        assert!(!verify_password("Secret", &hash));
        assert!(!verify_password("secret", "no-separator"));
    }
}
