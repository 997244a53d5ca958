//! Plaintext configuration payload.
//!
//! A [`ConfigSnapshot`] is what the caller owns and what travels (after
//! encryption) between devices. Providers and auxiliary fields are ordered
//! maps so the JSON serialization of a snapshot is canonical and its
//! checksum is stable across devices.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// A versioned mapping from provider identifier to its credential records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    pub version: String,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            providers: BTreeMap::new(),
        }
    }
}

impl ConfigSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of credential records across all providers.
    pub fn key_count(&self) -> usize {
        self.providers.values().map(|p| p.keys.len()).sum()
    }

    /// Get a provider, if present.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Get a provider, inserting an empty one if absent.
    pub fn provider_mut(&mut self, name: &str) -> &mut ProviderConfig {
        self.providers.entry(name.to_string()).or_default()
    }

    /// Find the first provider whose aliases are not unique.
    ///
    /// Returns `(provider, alias)` for the first duplicate found.
    pub fn find_duplicate_alias(&self) -> Option<(String, String)> {
        for (name, provider) in &self.providers {
            if let Some(alias) = provider.duplicate_alias() {
                return Some((name.clone(), alias.to_string()));
            }
        }
        None
    }
}

/// Credential records for one provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub keys: Vec<ApiKeyRecord>,
    /// Alias of the record currently selected for this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_key: Option<String>,
}

impl ProviderConfig {
    /// Look up a record by alias.
    pub fn key(&self, alias: &str) -> Option<&ApiKeyRecord> {
        self.keys.iter().find(|k| k.alias == alias)
    }

    /// Insert a record, replacing any existing record with the same alias.
    pub fn upsert(&mut self, record: ApiKeyRecord) {
        match self.keys.iter_mut().find(|k| k.alias == record.alias) {
            Some(existing) => *existing = record,
            None => self.keys.push(record),
        }
    }

    fn duplicate_alias(&self) -> Option<&str> {
        let mut seen = std::collections::HashSet::new();
        self.keys
            .iter()
            .map(|k| k.alias.as_str())
            .find(|alias| !seen.insert(*alias))
    }
}

/// A single named credential.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub alias: String,
    pub key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Provider-specific auxiliary values (base URL, organization, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl ApiKeyRecord {
    /// Create an enabled record created now.
    pub fn new(alias: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            key: key.into(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: None,
            extra: BTreeMap::new(),
            expires_at: None,
        }
    }

    /// Last modification time: `updated_at`, falling back to `created_at`.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Whether the record has an expiry in the past.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

// The secret never shows up in debug output or logs.
impl std::fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("alias", &self.alias)
            .field("key", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(alias: &str) -> ApiKeyRecord {
        ApiKeyRecord {
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ..ApiKeyRecord::new(alias, "sk-secret-value")
        }
    }

    #[test]
    fn test_key_count_spans_providers() {
        let mut snapshot = ConfigSnapshot::new();
        snapshot.provider_mut("claude").upsert(record("keyA"));
        snapshot.provider_mut("claude").upsert(record("keyB"));
        snapshot.provider_mut("openai").upsert(record("main"));

        assert_eq!(snapshot.key_count(), 3);
    }

    #[test]
    fn test_upsert_replaces_same_alias() {
        let mut provider = ProviderConfig::default();
        provider.upsert(record("keyA"));

        let mut replacement = record("keyA");
        replacement.key = "sk-rotated".to_string();
        provider.upsert(replacement);

        assert_eq!(provider.keys.len(), 1);
        assert_eq!(provider.key("keyA").unwrap().key, "sk-rotated");
    }

    #[test]
    fn test_find_duplicate_alias() {
        let mut snapshot = ConfigSnapshot::new();
        snapshot.provider_mut("claude").keys = vec![record("keyA"), record("keyA")];

        assert_eq!(
            snapshot.find_duplicate_alias(),
            Some(("claude".to_string(), "keyA".to_string()))
        );
    }

    #[test]
    fn test_last_modified_falls_back_to_created() {
        let mut rec = record("keyA");
        assert_eq!(rec.last_modified(), rec.created_at);

        let later = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        rec.updated_at = Some(later);
        assert_eq!(rec.last_modified(), later);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let mut snapshot = ConfigSnapshot::new();
        let provider = snapshot.provider_mut("claude");
        provider.upsert(record("keyA"));
        provider.current_key = Some("keyA".to_string());

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"currentKey\":\"keyA\""));
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("updatedAt"));
    }

    #[test]
    fn test_enabled_defaults_to_true() {
        let json = r#"{"alias":"a","key":"k","createdAt":"2024-01-01T00:00:00Z"}"#;
        let rec: ApiKeyRecord = serde_json::from_str(json).unwrap();
        assert!(rec.enabled);
        assert!(!rec.is_expired());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", record("keyA"));
        assert!(debug.contains("keyA"));
        assert!(!debug.contains("sk-secret-value"));
    }
}
