//! Shared store plumbing: atomic document writes and YAML round-trips.

use crate::{CoreError, CoreResult};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Writes `bytes` to `path` atomically.
///
/// The bytes land in a uniquely named temp file in the same directory and
/// are then renamed over the target, so a concurrent reader sees either the
/// old document or the new one, never a mix. Concurrent writers serialise
/// as last-committed-write-wins.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CoreError::InvalidInput(format!("path has no parent: {}", path.display())))?;
    fs::create_dir_all(parent).map_err(CoreError::StorageDirCreation)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CoreError::InvalidInput(format!("path has no file name: {}", path.display())))?;
    let tmp = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    fs::write(&tmp, bytes).map_err(CoreError::FileWrite)?;
    if let Err(e) = fs::rename(&tmp, path) {
        // Leave no temp litter behind on failure.
        let _ = fs::remove_file(&tmp);
        return Err(CoreError::FileWrite(e));
    }
    Ok(())
}

/// Serialises `value` to YAML and writes it atomically to `path`.
pub(crate) fn write_yaml<T: Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let yaml = serde_yaml::to_string(value).map_err(CoreError::YamlSerialization)?;
    write_atomic(path, yaml.as_bytes())
}

/// Reads a YAML document from `path`; `None` if the file does not exist.
pub(crate) fn read_yaml<T: DeserializeOwned>(path: &Path) -> CoreResult<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoreError::FileRead(e)),
    };
    let value = serde_yaml::from_str(&contents).map_err(CoreError::YamlDeserialization)?;
    Ok(Some(value))
}
