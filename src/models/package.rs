//! Encrypted at-rest / on-wire representation of a snapshot.

use serde::{Deserialize, Serialize};

/// Current encrypted package format version.
pub const PACKAGE_VERSION: u32 = 1;

/// Ciphertext plus everything needed to decrypt and verify it.
///
/// Binary fields are base64 (standard alphabet). `checksum` is the hex
/// SHA-256 of the plaintext serialization. Produced by
/// [`crate::crypto::encrypt`] and consumed by [`crate::crypto::decrypt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPackage {
    /// Ciphertext with the 16-byte authentication tag appended.
    pub encrypted_data: String,
    pub iv: String,
    pub salt: String,
    pub checksum: String,
    pub version: u32,
    /// RFC 3339 creation time.
    pub timestamp: String,
    pub device_id: String,
}

impl EncryptedPackage {
    /// Parse the creation timestamp.
    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc))
    }
}
