//! Password hashing.
//!
//! The stored token is `salt ++ base64(digest)`: a 32-character salt drawn
//! from a fixed alphanumeric alphabet, followed by the unpadded base64 of a
//! 32-byte Argon2id digest. Both halves are printable, so the token can
//! live in a plain string field. Verification splits on the known encoded
//! digest width and compares in constant time.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use rand::{rngs::OsRng, Rng};
use subtle::ConstantTimeEq;

use crate::error::Error;

const SALT_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SALT_LEN: usize = 32;
const DIGEST_LEN: usize = 32;
/// Unpadded base64 length of a 32-byte digest.
const ENCODED_DIGEST_LEN: usize = 43;

/// Argon2id hasher with fixed parameters (t=2, m=64 MiB, p=1).
///
/// Tokens are only comparable within one deployment; changing the
/// parameters invalidates every stored password.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    pub fn new() -> Self {
        let params = Params::new(64 * 1024, 2, 1, Some(DIGEST_LEN)).unwrap_or_default();
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hash `password` under a fresh random salt, returning the opaque
    /// stored token.
    pub fn hash(&self, password: &str) -> Result<String, Error> {
        let salt = generate_salt();
        let digest = self.digest(password, salt.as_bytes())?;

        let mut stored = salt;
        stored.push_str(&STANDARD_NO_PAD.encode(digest));
        Ok(stored)
    }

    /// Check `password` against a token produced by [`hash`](Self::hash).
    /// Malformed tokens verify as false.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        if stored.len() <= ENCODED_DIGEST_LEN {
            return false;
        }
        let (salt, encoded_digest) = stored.split_at(stored.len() - ENCODED_DIGEST_LEN);

        let Ok(expected) = STANDARD_NO_PAD.decode(encoded_digest) else {
            return false;
        };
        let Ok(computed) = self.digest(password, salt.as_bytes()) else {
            return false;
        };

        computed.ct_eq(expected.as_slice()).into()
    }

    fn digest(&self, password: &str, salt: &[u8]) -> Result<[u8; DIGEST_LEN], Error> {
        let mut out = [0u8; DIGEST_LEN];
        self.argon2
            .hash_password_into(password.as_bytes(), salt, &mut out)
            .map_err(|err| Error::Hash(err.to_string()))?;
        Ok(out)
    }
}

/// 32 printable characters from the fixed alphabet, drawn from the OS
/// cryptographic RNG.
fn generate_salt() -> String {
    let mut rng = OsRng;
    (0..SALT_LEN)
        .map(|_| SALT_ALPHABET[rng.gen_range(0..SALT_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_verifies() {
        let hasher = PasswordHasher::new();
        let stored = hasher.hash("correct horse").unwrap();
        assert!(hasher.verify("correct horse", &stored));
    }

    #[test]
    fn wrong_password_fails() {
        let hasher = PasswordHasher::new();
        let stored = hasher.hash("correct horse").unwrap();
        assert!(!hasher.verify("battery staple", &stored));
        assert!(!hasher.verify("", &stored));
    }

    #[test]
    fn token_is_printable_and_salted() {
        let hasher = PasswordHasher::new();
        let a = hasher.hash("pw").unwrap();
        let b = hasher.hash("pw").unwrap();
        assert_eq!(a.len(), SALT_LEN + ENCODED_DIGEST_LEN);
        assert!(a.chars().all(|c| c.is_ascii_graphic()));
        // Fresh salt per call.
        assert_ne!(a, b);
        assert!(hasher.verify("pw", &a));
        assert!(hasher.verify("pw", &b));
    }

    #[test]
    fn malformed_tokens_verify_false() {
        let hasher = PasswordHasher::new();
        assert!(!hasher.verify("pw", ""));
        assert!(!hasher.verify("pw", "short"));
        assert!(!hasher.verify("pw", &"!".repeat(SALT_LEN + ENCODED_DIGEST_LEN)));
    }

    #[test]
    fn tampered_digest_fails() {
        let hasher = PasswordHasher::new();
        let mut stored = hasher.hash("pw").unwrap();
        let flipped = if stored.ends_with('A') { 'B' } else { 'A' };
        stored.pop();
        stored.push(flipped);
        assert!(!hasher.verify("pw", &stored));
    }
}
