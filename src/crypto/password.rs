//! Master password verification hashes.
//!
//! The hash answers "is this the right master password" without
//! decrypting a real payload. It uses the same KDF as encryption with an
//! independent salt.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use super::kdf::derive_key;

/// A stored password verifier. Both fields are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
}

/// Hash `password`, generating a salt unless one is supplied.
pub fn hash_password(password: &str, salt: Option<&[u8]>) -> PasswordHash {
    let (key, salt) = derive_key(password, salt);
    PasswordHash {
        hash: STANDARD.encode(key.as_bytes()),
        salt: STANDARD.encode(salt),
    }
}

/// Check `password` against a stored hash and salt.
///
/// Malformed base64 verifies as false.
pub fn verify_password(password: &str, hash: &str, salt: &str) -> bool {
    let (Ok(expected), Ok(salt)) = (STANDARD.decode(hash), STANDARD.decode(salt)) else {
        return false;
    };

    let (key, _) = derive_key(password, Some(&salt));
    constant_time_eq(key.as_bytes(), &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
