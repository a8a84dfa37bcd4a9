//! Object storage for uploaded site photos
//!
//! Abstraction over the backing bucket so handlers and the upload
//! pipeline never touch the filesystem directly. Keys are slash-joined
//! (`{org_id}/{project_id}/{uuid}_{filename}`); the backend decides how
//! they map onto physical layout.

pub mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use roomlog_common::Result;

/// Pluggable object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under `key`, failing if the backend rejects the
    /// write (duplicate key under a no-overwrite policy included)
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Fetch an object's bytes
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Delete an object; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether an object exists
    async fn exists(&self, key: &str) -> Result<bool>;
}
