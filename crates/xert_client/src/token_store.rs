//! Credential persistence across process restarts.
//!
//! A single JSON record, overwritten in place. The write goes through a
//! temporary file followed by a rename so a crash mid-write leaves the
//! previous record intact.

use std::path::PathBuf;

use tokio::fs;

use crate::{Credential, StoreError};

#[derive(Clone, Debug)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the stored credential. A missing or unreadable file is `None`,
    /// not an error: the caller falls back to a fresh login.
    pub async fn load(&self) -> Result<Option<Credential>, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(credential) => {
                tracing::info!("loaded tokens from {}", self.path.display());
                Ok(Some(credential))
            }
            Err(e) => {
                tracing::warn!("ignoring unreadable token file {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    /// Overwrite the stored credential atomically.
    pub async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(credential)?).await?;
        fs::rename(&tmp, &self.path).await?;
        tracing::debug!("saved tokens to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn credential() -> Credential {
        Credential {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Utc::now() + chrono::Duration::seconds(3600),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("tokens.json"));
        assert!(store.load().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("tokens.json"));
        let cred = credential();
        store.save(&cred).await.expect("save");
        let loaded = store.load().await.expect("load").expect("present");
        assert_eq!(loaded, cred);
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("nested/state/tokens.json"));
        store.save(&credential()).await.expect("save");
        assert!(store.load().await.expect("load").is_some());
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, b"not json at all").await.expect("write");
        let store = TokenStore::new(path);
        assert!(store.load().await.expect("load").is_none());
    }

    #[tokio::test]
    async fn save_overwrites_previous_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store.save(&credential()).await.expect("save");
        let mut updated = credential();
        updated.access_token = "rotated".into();
        store.save(&updated).await.expect("save again");
        let loaded = store.load().await.expect("load").expect("present");
        assert_eq!(loaded.access_token, "rotated");
    }
}
