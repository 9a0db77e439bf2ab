// dbkeep/src/store/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use s3::types::ObjectCannedAcl;
use std::path::{Path, PathBuf};
use tempfile::{Builder as TempFileBuilder, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{ObjectContent, RemoteStore};
use crate::config::S3Config;
use crate::errors::{AppError, Result};

/// An S3-compatible bucket (AWS, DigitalOcean Spaces, MinIO, ...).
#[derive(Debug, Clone)]
pub struct S3Store {
    client: s3::Client,
    bucket: String,
    folder_prefix: Option<String>,
    local_dir: PathBuf,
}

impl S3Store {
    pub async fn connect(config: &S3Config, local_dir: &Path) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(s3::config::Credentials::new(
                key_id,
                secret,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ));
        }
        let sdk_config = loader.load().await;

        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        debug!(bucket = %config.bucket_name, endpoint = ?config.endpoint_url, "S3 client configured");
        Self {
            client: s3::Client::from_conf(s3_config),
            bucket: config.bucket_name.clone(),
            folder_prefix: config.folder_prefix.clone(),
            local_dir: local_dir.to_path_buf(),
        }
    }

    fn key_for(&self, name: &str) -> String {
        match &self.folder_prefix {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name.to_string(),
        }
    }

    fn name_for<'k>(&self, key: &'k str) -> Option<&'k str> {
        match &self.folder_prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str())?.strip_prefix('/'),
            None => Some(key),
        }
    }
}

#[async_trait]
impl RemoteStore for S3Store {
    async fn store(&self, name: &str, content: ObjectContent<'_>) -> Result<()> {
        let key = self.key_for(name);
        let body = match content {
            ObjectContent::File(path) => ByteStream::from_path(path).await.map_err(|e| {
                AppError::Storage(format!("Failed to create ByteStream from file {}: {}", path.display(), e))
            })?,
            ObjectContent::Bytes(bytes) => ByteStream::from(bytes.to_vec()),
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .acl(ObjectCannedAcl::Private)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::storage("Failed to upload", &key, s3::error::DisplayErrorContext(e)))?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn fetch(&self, name: &str) -> Result<TempPath> {
        let key = self.key_for(name);
        let mut object = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(object) => object,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Err(AppError::ObjectNotFound(name.to_string()));
                }
                return Err(AppError::storage("Failed to get object", &key, s3::error::DisplayErrorContext(e)));
            }
        };

        tokio::fs::create_dir_all(&self.local_dir).await?;
        let destination = TempFileBuilder::new()
            .prefix("fetch-")
            .tempfile_in(&self.local_dir)?
            .into_temp_path();
        let mut output_file = tokio::fs::File::create(&destination).await?;

        let mut total_bytes_downloaded = 0;
        while let Some(bytes_chunk) = object
            .body
            .try_next()
            .await
            .map_err(|e| AppError::storage("Failed to read object body", &key, e))?
        {
            output_file.write_all(&bytes_chunk).await?;
            total_bytes_downloaded += bytes_chunk.len();
        }
        output_file.flush().await?;

        debug!(
            "Downloaded {} bytes from s3://{}/{} to {}",
            total_bytes_downloaded,
            self.bucket,
            key,
            destination.display()
        );
        Ok(destination)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(self.folder_prefix.as_ref().map(|p| format!("{}/", p)))
            .into_paginator()
            .send();

        let mut names = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                AppError::storage("Failed to list bucket", &self.bucket, s3::error::DisplayErrorContext(e))
            })?;
            for object in page.contents() {
                if let Some(name) = object.key().and_then(|key| self.name_for(key)) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let key = self.key_for(name);
        // S3 answers 204 for keys that do not exist.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| AppError::storage("Failed to delete", &key, s3::error::DisplayErrorContext(e)))?;
        info!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}
