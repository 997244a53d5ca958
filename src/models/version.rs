//! Snapshot fingerprints used for conflict display.

use serde::{Deserialize, Serialize};

/// Lightweight fingerprint of a snapshot. Never used for merge content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigVersion {
    pub timestamp: String,
    pub device_id: String,
    pub checksum: String,
    pub key_count: usize,
}

/// A pending divergence between this device and the remote copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictData {
    pub local_version: ConfigVersion,
    pub remote_version: ConfigVersion,
}
