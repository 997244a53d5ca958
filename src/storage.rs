//! Local data directory and JSON document helpers.
//!
//! Everything keysync persists lives in one directory: `$KEYSYNC_HOME`
//! when set, otherwise `~/.keysync`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{classify_io_error, DataError, SyncResult, SystemError};

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "KEYSYNC_HOME";

/// Data directory name under the user's home.
pub const DATA_DIR: &str = ".keysync";

/// Resolve the data directory without creating it.
pub fn data_dir() -> SyncResult<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(SystemError::NoHomeDirectory)?;
    Ok(home.join(DATA_DIR))
}

/// Read a JSON document. A missing file is `Ok(None)`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> SyncResult<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(classify_io_error(e, Some(path.to_path_buf()), "read").into()),
    };

    let value = serde_json::from_str(&contents).map_err(|e| DataError::Serialization {
        message: format!("{}: {}", path.display(), e),
    })?;
    Ok(Some(value))
}

/// Write a JSON document, replacing the old one atomically.
///
/// Creates the parent directory if needed. The file is readable by the
/// owner only on Unix.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| SystemError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| classify_io_error(e, Some(tmp.clone()), "write"))?;
    restrict_permissions(&tmp);
    fs::rename(&tmp, path).map_err(|e| classify_io_error(e, Some(path.to_path_buf()), "rename"))?;
    Ok(())
}

/// Delete a file. A missing file is not an error.
pub fn remove_file(path: &Path) -> SyncResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(classify_io_error(e, Some(path.to_path_buf()), "delete").into()),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
