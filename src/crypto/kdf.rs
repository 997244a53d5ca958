//! Password-based key derivation (PBKDF2-HMAC-SHA256).

use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// PBKDF2 iteration count.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Salt length in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Derived key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// A 256-bit key derived from a password. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Generate a random salt from the OS CSPRNG.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a key from `password`.
///
/// Uses `salt` when given, otherwise a fresh random one. Returns the key
/// together with the salt that produced it. Deterministic for a fixed
/// `(password, salt)` pair.
pub fn derive_key(password: &str, salt: Option<&[u8]>) -> (DerivedKey, Vec<u8>) {
    let salt = match salt {
        Some(salt) => salt.to_vec(),
        None => generate_salt().to_vec(),
    };

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, KDF_ITERATIONS, &mut key);

    (DerivedKey(key), salt)
}
