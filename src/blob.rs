//! Object storage for uploaded files.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use thiserror::Error;

use crate::config::S3Config;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error(transparent)]
    Store(#[from] object_store::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<(), BlobError>;

    /// Time-limited GET link for `key`.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, BlobError>;
}

fn object_path(key: &str) -> Result<Path, BlobError> {
    Path::parse(key).map_err(|_| BlobError::InvalidKey(key.to_string()))
}

fn put_options(content_type: Option<&str>) -> PutOptions {
    let mut attributes = Attributes::new();
    if let Some(content_type) = content_type {
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
    }
    PutOptions {
        attributes,
        ..PutOptions::default()
    }
}

pub struct S3BlobStore {
    store: Arc<AmazonS3>,
}

impl S3BlobStore {
    pub fn new(config: &S3Config) -> Result<Self, BlobError> {
        let mut builder = AmazonS3Builder::new()
            .with_region(&config.region)
            .with_bucket_name(&config.bucket);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        // Without static keys the default AWS credential chain applies.
        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            builder = builder
                .with_access_key_id(access_key)
                .with_secret_access_key(secret_key);
        }

        Ok(Self {
            store: Arc::new(builder.build()?),
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<(), BlobError> {
        let path = object_path(key)?;
        self.store
            .put_opts(&path, PutPayload::from(bytes), put_options(content_type))
            .await?;
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        let path = object_path(key)?;
        let url = self.store.signed_url(Method::GET, &path, ttl).await?;
        Ok(url.to_string())
    }
}

/// Keeps blobs in process memory. Links point nowhere but carry the key and
/// lifetime, which is all local runs and tests look at.
#[derive(Default)]
pub struct MemoryBlobStore {
    store: InMemory,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = object_path(key)?;
        let bytes = self.store.get(&path).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<(), BlobError> {
        let path = object_path(key)?;
        self.store
            .put_opts(&path, PutPayload::from(bytes), put_options(content_type))
            .await?;
        Ok(())
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        let path = object_path(key)?;
        self.store.head(&path).await?;
        Ok(format!("memory:///{}?expires_in={}", path, ttl.as_secs()))
    }
}
