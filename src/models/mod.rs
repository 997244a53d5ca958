//! Data types shared by the crypto layer, the backends and the sync manager.

pub mod package;
pub mod snapshot;
pub mod version;

pub use package::{EncryptedPackage, PACKAGE_VERSION};
pub use snapshot::{ApiKeyRecord, ConfigSnapshot, ProviderConfig, SNAPSHOT_VERSION};
pub use version::{ConfigVersion, ConflictData};
