use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use log::{error, info};

use super::ObjectStore;
use crate::error::{VaultError, VaultResult};

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Loads credentials from the environment. A custom endpoint switches to
    /// path-style addressing for S3-compatible servers.
    pub async fn from_env(bucket: impl Into<String>, endpoint: Option<&str>) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(Client::from_conf(builder.build()), bucket)
    }

    async fn ensure_exists(&self, key: &str) -> VaultResult<()> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                Err(VaultError::ObjectMissing(key.to_string()))
            }
            Err(e) => Err(storage_error("head", key, e)),
        }
    }
}

fn storage_error<E: std::error::Error>(op: &str, key: &str, e: E) -> VaultError {
    let message = format!("{} {}: {}", op, key, DisplayErrorContext(e));
    error!("S3 {}", message);
    VaultError::Storage(message)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> VaultResult<String> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| storage_error("put", key, e))?;

        info!("Stored s3://{}/{} ({} bytes)", self.bucket, key, size);
        Ok(key.to_string())
    }

    async fn download(&self, key: &str) -> VaultResult<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("get", key, e))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| storage_error("read", key, e))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn remove(&self, keys: &[String]) -> VaultResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        // S3 deletes of absent keys succeed silently.
        for key in keys {
            self.ensure_exists(key).await?;
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| VaultError::Storage(e.to_string()))?;

        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| storage_error("delete", &keys.join(","), e))?;

        if let Some(failed) = output.errors().first() {
            return Err(VaultError::Storage(format!(
                "delete {}: {}",
                failed.key().unwrap_or_default(),
                failed.message().unwrap_or("unknown error")
            )));
        }

        info!("Removed {} object(s) from s3://{}", keys.len(), self.bucket);
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> VaultResult<String> {
        let presigning =
            PresigningConfig::expires_in(expires_in).map_err(|e| VaultError::Storage(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| storage_error("presign", key, e))?;

        Ok(request.uri().to_string())
    }
}
