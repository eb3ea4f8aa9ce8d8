//! Local-disk storage for uploaded files.
//!
//! Two areas live under `storage.root`: `avatars/` (flat, served back over
//! HTTP) and `knowledge/<agent_id>/` (originals of ingested documents).
//! Stored names are fresh UUIDs plus the original extension, so nothing
//! user-controlled ever becomes a path component.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::extract;

/// File extensions accepted for avatar uploads.
pub const AVATAR_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

pub fn avatars_dir(config: &StorageConfig) -> PathBuf {
    config.root.join("avatars")
}

pub fn knowledge_dir(config: &StorageConfig) -> PathBuf {
    config.root.join("knowledge")
}

/// Create the storage layout. Safe to call repeatedly.
pub fn ensure_dirs(config: &StorageConfig) -> Result<()> {
    fs::create_dir_all(avatars_dir(config))
        .with_context(|| format!("failed to create {}/avatars", config.root.display()))?;
    fs::create_dir_all(knowledge_dir(config))
        .with_context(|| format!("failed to create {}/knowledge", config.root.display()))?;
    Ok(())
}

/// True when `name` is a bare file name we could have generated: no path
/// separators, no parent references.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

/// Write avatar bytes under a fresh UUID name. Returns the stored file name.
pub fn store_avatar(config: &StorageConfig, bytes: &[u8], original_name: &str) -> Result<String> {
    let ext = match extract::file_extension(original_name) {
        Some(ext) if AVATAR_EXTENSIONS.contains(&ext.as_str()) => ext,
        Some(ext) => bail!("unsupported avatar format: {}", ext),
        None => bail!("avatar file name has no extension"),
    };
    let name = format!("{}.{}", Uuid::new_v4(), ext);
    let path = avatars_dir(config).join(&name);
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(name)
}

/// Read a stored avatar back. `Ok(None)` when no such file exists.
pub fn load_avatar(config: &StorageConfig, name: &str) -> Result<Option<Vec<u8>>> {
    let path = avatars_dir(config).join(name);
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Write an uploaded knowledge file under `knowledge/<agent_id>/`. Returns
/// the path relative to the storage root, which is what the database keeps.
pub fn store_knowledge_file(
    config: &StorageConfig,
    agent_id: &str,
    bytes: &[u8],
    original_name: &str,
) -> Result<String> {
    let ext = extract::file_extension(original_name)
        .ok_or_else(|| anyhow::anyhow!("knowledge file name has no extension"))?;
    let dir = knowledge_dir(config).join(agent_id);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let name = format!("{}.{}", Uuid::new_v4(), ext);
    let path = dir.join(&name);
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(format!("knowledge/{}/{}", agent_id, name))
}

/// Remove one stored file. Missing files are not an error; the row is the
/// source of truth and disk cleanup is best effort.
pub fn remove_stored_file(config: &StorageConfig, rel_path: &str) {
    let path = config.root.join(rel_path);
    if let Err(e) = fs::remove_file(&path) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove stored file");
        }
    }
}

/// Remove an agent's whole knowledge directory. Best effort, like
/// [`remove_stored_file`].
pub fn remove_agent_knowledge(config: &StorageConfig, agent_id: &str) {
    let dir = knowledge_dir(config).join(agent_id);
    if let Err(e) = fs::remove_dir_all(&dir) {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(path = %dir.display(), error = %e, "failed to remove knowledge dir");
        }
    }
}
