//! Crypto module: key derivation, authenticated encryption of snapshots,
//! integrity checksums and master password verification.
//!
//! # Package layout
//!
//! | Field | Content |
//! |-------|---------|
//! | `encryptedData` | base64 AES-256-GCM ciphertext with appended tag |
//! | `iv` | base64 96-bit IV |
//! | `salt` | base64 256-bit PBKDF2 salt |
//! | `checksum` | hex SHA-256 of the plaintext serialization |
//! | `version` | format version, `>= 1` |
//! | `timestamp` | RFC 3339 creation time |
//! | `deviceId` | originating device |
//!
//! A wrong password and a tampered ciphertext both fail with
//! [`DataError::AuthenticationFailed`]. A checksum mismatch after a
//! successful decryption fails with [`DataError::IntegrityCheckFailed`].

pub mod cipher;
pub mod kdf;
pub mod password;
pub mod strength;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::DataError;
use crate::models::{ConfigSnapshot, EncryptedPackage, PACKAGE_VERSION};

pub use kdf::{derive_key, generate_salt, DerivedKey, KDF_ITERATIONS, KEY_LEN, SALT_LEN};
pub use password::{hash_password, verify_password, PasswordHash};
pub use strength::{password_strength, PasswordStrength, MIN_PASSWORD_LEN};

/// Lowercase hex SHA-256 of `data`.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Checksum of a snapshot's canonical serialization.
pub fn snapshot_checksum(snapshot: &ConfigSnapshot) -> Result<String, DataError> {
    Ok(checksum(&serde_json::to_vec(snapshot)?))
}

/// Encrypt a snapshot under `password`.
///
/// Every call derives a fresh key from a fresh salt and uses a fresh IV,
/// so two encryptions of the same input never share ciphertext.
pub fn encrypt(
    snapshot: &ConfigSnapshot,
    password: &str,
    device_id: &str,
) -> Result<EncryptedPackage, DataError> {
    let plaintext = serde_json::to_vec(snapshot)?;
    let (key, salt) = derive_key(password, None);
    let (iv, ciphertext) = cipher::seal(&key, &plaintext)?;

    Ok(EncryptedPackage {
        encrypted_data: STANDARD.encode(ciphertext),
        iv: STANDARD.encode(iv),
        salt: STANDARD.encode(salt),
        checksum: checksum(&plaintext),
        version: PACKAGE_VERSION,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        device_id: device_id.to_string(),
    })
}

/// Decrypt a package and verify its plaintext checksum.
pub fn decrypt(package: &EncryptedPackage, password: &str) -> Result<ConfigSnapshot, DataError> {
    let ciphertext = decode_field("encryptedData", &package.encrypted_data)?;
    let iv = decode_field("iv", &package.iv)?;
    let salt = decode_field("salt", &package.salt)?;

    let (key, _) = derive_key(password, Some(&salt));
    let plaintext = cipher::open(&key, &iv, &ciphertext)?;

    if checksum(&plaintext) != package.checksum {
        return Err(DataError::IntegrityCheckFailed);
    }

    Ok(serde_json::from_slice(&plaintext)?)
}

/// Structural check run before any decryption attempt.
pub fn validate_package(package: &EncryptedPackage) -> bool {
    check_package(package).is_ok()
}

/// Like [`validate_package`], reporting the first problem found.
pub fn check_package(package: &EncryptedPackage) -> Result<(), DataError> {
    let invalid = |reason: &str| DataError::InvalidPackage {
        reason: reason.to_string(),
    };

    if package.version < 1 {
        return Err(invalid("version must be at least 1"));
    }
    if package.checksum.is_empty() {
        return Err(invalid("missing checksum"));
    }
    if package.device_id.is_empty() {
        return Err(invalid("missing deviceId"));
    }

    let ciphertext = decode_field("encryptedData", &package.encrypted_data)?;
    if ciphertext.len() < cipher::TAG_LEN {
        return Err(invalid("encryptedData is too short"));
    }
    if decode_field("iv", &package.iv)?.len() != cipher::IV_LEN {
        return Err(invalid("iv has the wrong length"));
    }
    if decode_field("salt", &package.salt)?.is_empty() {
        return Err(invalid("salt is empty"));
    }
    if package.created_at().is_none() {
        return Err(invalid("timestamp is not RFC 3339"));
    }

    Ok(())
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, DataError> {
    if value.is_empty() {
        return Err(DataError::InvalidPackage {
            reason: format!("missing {}", name),
        });
    }
    STANDARD.decode(value).map_err(|_| DataError::InvalidPackage {
        reason: format!("{} is not valid base64", name),
    })
}
