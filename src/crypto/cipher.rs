//! AES-256-GCM authenticated encryption.
//!
//! Ciphertext carries the 16-byte tag appended by `aes-gcm`. The 96-bit
//! IV travels separately in the package.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};

use super::kdf::DerivedKey;
use crate::error::DataError;

/// IV length in bytes (96 bits).
pub const IV_LEN: usize = 12;

/// Authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key` with a fresh random IV.
///
/// Returns `(iv, ciphertext || tag)`.
pub fn seal(key: &DerivedKey, plaintext: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>), DataError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| DataError::Encryption {
            message: e.to_string(),
        })?;

    Ok((nonce.into(), ciphertext))
}

/// Decrypt and authenticate `ciphertext` (with appended tag).
///
/// A wrong key and tampered input both surface as
/// [`DataError::AuthenticationFailed`].
pub fn open(key: &DerivedKey, iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, DataError> {
    if iv.len() != IV_LEN {
        return Err(DataError::InvalidPackage {
            reason: format!("iv must be {} bytes, got {}", IV_LEN, iv.len()),
        });
    }
    if ciphertext.len() < TAG_LEN {
        return Err(DataError::InvalidPackage {
            reason: "ciphertext shorter than authentication tag".to_string(),
        });
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| DataError::AuthenticationFailed)
}
