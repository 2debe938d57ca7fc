use std::time::Duration;

use async_trait::async_trait;

use crate::error::VaultResult;

mod s3;

pub use s3::S3ObjectStore;

/// Object store client: bytes addressed by string keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the path the store recorded.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> VaultResult<String>;

    async fn download(&self, key: &str) -> VaultResult<Vec<u8>>;

    /// Removes every key. Fails with `ObjectMissing` if one of them is absent.
    async fn remove(&self, keys: &[String]) -> VaultResult<()>;

    /// Time-limited link granting unauthenticated read access to `key`.
    async fn signed_url(&self, key: &str, expires_in: Duration) -> VaultResult<String>;
}
