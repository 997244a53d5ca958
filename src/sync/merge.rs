//! Pairwise snapshot merge.
//!
//! For every provider in either snapshot the credential lists are unioned
//! by alias. Local records keep their order, remote-only records follow in
//! remote order. When both sides carry an alias, the record with the later
//! modification time wins and ties keep the local record. The selected key
//! prefers the local choice.

use crate::models::{ConfigSnapshot, ProviderConfig};

/// Merge `remote` into `local`.
pub fn merge_snapshots(local: &ConfigSnapshot, remote: &ConfigSnapshot) -> ConfigSnapshot {
    let mut merged = ConfigSnapshot {
        version: local.version.clone(),
        providers: Default::default(),
    };

    let names = local.providers.keys().chain(remote.providers.keys());
    for name in names {
        if merged.providers.contains_key(name) {
            continue;
        }
        let provider = match (local.providers.get(name), remote.providers.get(name)) {
            (Some(l), Some(r)) => merge_provider(l, r),
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (None, None) => continue,
        };
        merged.providers.insert(name.clone(), provider);
    }

    merged
}

fn merge_provider(local: &ProviderConfig, remote: &ProviderConfig) -> ProviderConfig {
    let mut keys = Vec::with_capacity(local.keys.len().max(remote.keys.len()));

    for record in &local.keys {
        let chosen = match remote.key(&record.alias) {
            Some(theirs) if theirs.last_modified() > record.last_modified() => theirs,
            _ => record,
        };
        keys.push(chosen.clone());
    }
    for record in &remote.keys {
        if local.key(&record.alias).is_none() {
            keys.push(record.clone());
        }
    }

    ProviderConfig {
        keys,
        current_key: local
            .current_key
            .clone()
            .or_else(|| remote.current_key.clone()),
    }
}
