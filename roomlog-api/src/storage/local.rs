//! Local filesystem object store
//!
//! Objects live under `{base_path}/{key}` with the slash-separated key
//! segments mapped to directories. Writes are no-overwrite: a duplicate
//! key is rejected the way a bucket with an overwrite guard would.

use async_trait::async_trait;
use bytes::Bytes;
use roomlog_common::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::ObjectStore;

pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Map a key onto a path under the base directory, rejecting
    /// traversal segments so a crafted key cannot escape it.
    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::Storage("empty object key".to_string()));
        }
        let mut path = self.base_path.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(Error::Storage(format!("invalid object key: {}", key)));
            }
            path.push(segment);
        }
        Ok(path)
    }

    async fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.key_path(key)?;
        self.ensure_parent(&path).await?;

        // No-overwrite policy: create_new fails on an existing object
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut file = match options.open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::Storage(format!("object already exists: {}", key)));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.key_path(key)?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("object: {}", key))
            } else {
                Error::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.key_path(key)?;
        Ok(path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf());

        let data = Bytes::from_static(b"jpeg bytes");
        store.put("org1/proj1/abc_kitchen.jpg", data.clone()).await.unwrap();

        let loaded = store.get("org1/proj1/abc_kitchen.jpg").await.unwrap();
        assert_eq!(loaded, data);
        assert!(store.exists("org1/proj1/abc_kitchen.jpg").await.unwrap());

        store.delete("org1/proj1/abc_kitchen.jpg").await.unwrap();
        assert!(!store.exists("org1/proj1/abc_kitchen.jpg").await.unwrap());

        // Deleting again is not an error
        store.delete("org1/proj1/abc_kitchen.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf());

        store.put("o/p/photo.jpg", Bytes::from_static(b"a")).await.unwrap();
        let second = store.put("o/p/photo.jpg", Bytes::from_static(b"b")).await;
        assert!(matches!(second, Err(Error::Storage(_))));

        // Original bytes untouched
        let loaded = store.get("o/p/photo.jpg").await.unwrap();
        assert_eq!(loaded, Bytes::from_static(b"a"));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf());

        assert!(store.put("../escape", Bytes::from_static(b"x")).await.is_err());
        assert!(store.get("a//b").await.is_err());
        assert!(store.get("").await.is_err());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().to_path_buf());

        let err = store.get("o/p/missing.jpg").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
